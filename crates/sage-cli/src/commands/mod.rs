//! Slash commands for interactive mode

mod copy;

pub use copy::{CopyCommand, osc52};

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Resubmit the last unanswered user turn
    Retry,
    /// Put the content of the turn at this index on the clipboard
    Copy(usize),
    /// Forget the last error message
    Dismiss,
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, turn_count: usize) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "retry" | "r" => CommandResult::Retry,

        "copy" | "y" => CopyCommand::execute(args, turn_count),

        "dismiss" | "d" => CommandResult::Dismiss,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /clear, /c           Clear conversation history
  /retry, /r           Resend the last message after a failure
  /copy, /y [index]    Copy a turn to the clipboard (default: last turn)
  /dismiss, /d         Dismiss the last error
  /quit, /exit, /q     Exit sage

Ctrl-C aborts a request in flight."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_command() {
        assert_eq!(execute_command("hello", 0), None);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(execute_command("/clear", 0), Some(CommandResult::Clear));
        assert_eq!(execute_command("/C", 0), Some(CommandResult::Clear));
        assert_eq!(execute_command("/retry", 0), Some(CommandResult::Retry));
        assert_eq!(execute_command("/dismiss", 0), Some(CommandResult::Dismiss));
        assert_eq!(execute_command("  /q ", 0), Some(CommandResult::Exit));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            execute_command("/frobnicate now", 0),
            Some(CommandResult::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn test_copy_dispatch() {
        assert_eq!(execute_command("/copy 1", 3), Some(CommandResult::Copy(1)));
        assert_eq!(execute_command("/copy", 3), Some(CommandResult::Copy(2)));
    }

    #[test]
    fn test_help_lists_commands() {
        match execute_command("/help", 0) {
            Some(CommandResult::Message(text)) => {
                for name in ["/clear", "/retry", "/copy", "/dismiss", "/quit"] {
                    assert!(text.contains(name), "missing {name}");
                }
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
