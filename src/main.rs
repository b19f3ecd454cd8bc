use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod commands;
mod config;
mod identity;
mod prompt;
mod session;

use app::App;
use commands::{ColumnCommand, ConfigCommand, EntryCommand, LoginArgs};
use config::Config;

#[derive(Parser)]
#[command(name = "ondoku")]
#[command(version)]
#[command(about = "A reading-practice log for the classroom", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(long, short, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter the class passcode for this session
    Unlock {
        /// The class passcode
        passcode: String,
    },

    /// Forget the passcode for this session
    Lock,

    /// Sign in with an email address
    Login(LoginArgs),

    /// Sign out
    Logout,

    /// Show access and sign-in status
    Whoami,

    /// Manage practice-log entries
    Entry(EntryCommand),

    /// Manage evaluation columns
    Column(ColumnCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr, filtered by `ONDOKU_LOG` (default `warn`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("ONDOKU_LOG").unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        cmd.run(&config)?;
        return Ok(());
    }

    let mut app = App::open(config, cli.yes);
    match command {
        Commands::Unlock { passcode } => commands::unlock(&app, &passcode)?,
        Commands::Lock => commands::lock(&app),
        Commands::Login(args) => commands::login(&mut app, &args).await?,
        Commands::Logout => commands::logout(&mut app).await?,
        Commands::Whoami => commands::whoami(&app),
        Commands::Entry(cmd) => cmd.run(&mut app).await?,
        Commands::Column(cmd) => cmd.run(&mut app).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}
