use clap::ValueEnum;

mod auth;
mod column;
mod config_cmd;
mod entry;

pub use auth::{lock, login, logout, unlock, whoami, LoginArgs};
pub use column::ColumnCommand;
pub use config_cmd::ConfigCommand;
pub use entry::EntryCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
