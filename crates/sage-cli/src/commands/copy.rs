//! /copy command - put a turn on the terminal clipboard

use super::CommandResult;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub struct CopyCommand;

impl CopyCommand {
    /// Execute /copy command
    /// - No args: copy the last turn
    /// - With index: copy the turn at that index
    pub fn execute(args: &str, turn_count: usize) -> CommandResult {
        if turn_count == 0 {
            return CommandResult::Message(
                "Nothing to copy. Start a conversation first.".to_string(),
            );
        }

        if args.is_empty() {
            return CommandResult::Copy(turn_count - 1);
        }

        match args.parse::<usize>() {
            Ok(index) if index < turn_count => CommandResult::Copy(index),
            Ok(index) => CommandResult::Message(format!(
                "Invalid index {}. Valid range: 0-{}",
                index,
                turn_count - 1
            )),
            Err(_) => CommandResult::Message(format!(
                "Invalid index '{}'. Use a number (0-{}).",
                args,
                turn_count - 1
            )),
        }
    }
}

/// OSC 52 escape sequence that sets the terminal clipboard to `text`
pub fn osc52(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_empty_conversation() {
        assert!(matches!(
            CopyCommand::execute("", 0),
            CommandResult::Message(_)
        ));
    }

    #[test]
    fn test_copy_index_bounds() {
        assert_eq!(CopyCommand::execute("0", 2), CommandResult::Copy(0));
        assert_eq!(
            CopyCommand::execute("2", 2),
            CommandResult::Message("Invalid index 2. Valid range: 0-1".into())
        );
        assert!(matches!(
            CopyCommand::execute("last", 2),
            CommandResult::Message(_)
        ));
    }

    #[test]
    fn test_osc52_payload() {
        assert_eq!(osc52("hi"), "\x1b]52;c;aGk=\x07");
        assert_eq!(osc52(""), "\x1b]52;c;\x07");
    }
}
