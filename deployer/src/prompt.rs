use std::io::{self, BufRead, Write};

use mockall::automock;
use tracing::warn;

/// Asks the operator to confirm a step before it is taken.
#[automock]
pub trait Prompt: Send + Sync {
    /// Returns true if the operator agreed to proceed.
    fn confirm(&self, question: &str) -> bool;
}

/// Reads the answer from stdin. With `yes` set every question is confirmed without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt {
    yes: bool,
}

impl StdinPrompt {
    pub fn new(yes: bool) -> Self {
        StdinPrompt { yes }
    }
}

impl Prompt for StdinPrompt {
    fn confirm(&self, question: &str) -> bool {
        if self.yes {
            return true;
        }

        print!("{question} (y/n) ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(err) => {
                warn!(err = %err, "failed to read the answer, assuming no");
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::{is_affirmative, Prompt, StdinPrompt};

    #[test]
    fn only_yes_should_confirm() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn yes_flag_should_skip_the_question() {
        assert!(StdinPrompt::new(true).confirm("Proceed with deployment on ethereum?"));
    }
}
