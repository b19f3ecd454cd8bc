use ondoku_core::{Confirmation, Notice, Prompt};
use std::io::{self, BufRead, Write};

/// Asks on the terminal. With `assume_yes` every confirmation passes.
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, request: &Confirmation) -> bool {
        if self.assume_yes {
            return true;
        }

        print!("{} [y/N] ", request);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::warn!("Could not read answer: {}", e);
                false
            }
        }
    }

    fn notify(&self, notice: &Notice) {
        eprintln!("Warning: {}", notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ondoku_core::EntryId;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_assume_yes_skips_terminal() {
        let prompt = TerminalPrompt::new(true);
        assert!(prompt.confirm(&Confirmation::DeleteEntry(EntryId::from("1"))));
    }
}
