//! Yes/no confirmation

use std::io::{BufRead, Write};

use shipyard_core::{CoreError, Result};

/// Answers read before giving up
pub const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Ask `question` until a yes or no answer arrives
///
/// Fails with [`CoreError::Input`] after [`MAX_PROMPT_ATTEMPTS`] unusable
/// answers or when input ends.
pub fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> Result<bool> {
    for attempt in 1..=MAX_PROMPT_ATTEMPTS {
        write!(output, "{} [y/n]: ", question)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            answer => {
                tracing::debug!(
                    "Unrecognized answer '{}' ({}/{})",
                    answer,
                    attempt,
                    MAX_PROMPT_ATTEMPTS
                );
                writeln!(output, "Please answer 'y' or 'n'.")?;
            }
        }
    }

    Err(CoreError::input(format!(
        "no confirmation received after {} attempts",
        MAX_PROMPT_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answers: &str) -> (Result<bool>, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = confirm("Delete?", &mut input, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_yes_and_no() {
        assert!(ask("y\n").0.unwrap());
        assert!(ask("YES\n").0.unwrap());
        assert!(!ask("n\n").0.unwrap());
        assert!(!ask("  No \n").0.unwrap());
    }

    #[test]
    fn test_retry_then_answer() {
        let (result, output) = ask("maybe\n\ny\n");
        assert!(result.unwrap());
        assert_eq!(output.matches("Delete? [y/n]: ").count(), 3);
    }

    #[test]
    fn test_attempts_exhausted() {
        let (result, output) = ask("a\nb\nc\ny\n");
        assert!(matches!(result, Err(CoreError::Input { .. })));
        assert_eq!(output.matches("Delete?").count(), MAX_PROMPT_ATTEMPTS);
    }

    #[test]
    fn test_end_of_input() {
        let (result, _) = ask("");
        assert!(matches!(result, Err(CoreError::Input { .. })));
    }
}
