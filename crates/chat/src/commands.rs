/// Slash commands understood by the chat prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `/model` alone shows the current model.
    Model(Option<String>),
    /// `/stream` alone toggles.
    Stream(Option<bool>),
    New,
    History,
    /// Switch to a stored conversation by id.
    Open(String),
    Delete(String),
    Clear,
    Quit,
    Help,
    Unknown(String),
}

/// Parses a prompt line; `None` means it is a message, not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let s = text.trim();
    let rest = s.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().unwrap_or("").trim();
    let cmd = match cmd.as_str() {
        "model" => Command::Model((!arg.is_empty()).then(|| arg.to_string())),
        "stream" => match arg.to_lowercase().as_str() {
            "" => Command::Stream(None),
            "on" | "true" | "1" => Command::Stream(Some(true)),
            "off" | "false" | "0" => Command::Stream(Some(false)),
            _ => Command::Unknown(s.to_string()),
        },
        "new" => Command::New,
        "history" => Command::History,
        "open" | "delete" if arg.is_empty() => Command::Unknown(s.to_string()),
        "open" => Command::Open(arg.to_string()),
        "delete" => Command::Delete(arg.to_string()),
        "clear" => Command::Clear,
        "quit" | "exit" | "q" => Command::Quit,
        "help" | "?" => Command::Help,
        _ => Command::Unknown(s.to_string()),
    };
    Some(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("  what about a/b?"), None);
    }

    #[test]
    fn model_with_and_without_argument() {
        assert_eq!(parse_command("/model"), Some(Command::Model(None)));
        assert_eq!(
            parse_command("/MODEL  codellama:7b "),
            Some(Command::Model(Some("codellama:7b".into())))
        );
    }

    #[test]
    fn stream_switch() {
        assert_eq!(parse_command("/stream on"), Some(Command::Stream(Some(true))));
        assert_eq!(parse_command("/stream OFF"), Some(Command::Stream(Some(false))));
        assert_eq!(parse_command("/stream"), Some(Command::Stream(None)));
        assert_eq!(
            parse_command("/stream maybe"),
            Some(Command::Unknown("/stream maybe".into()))
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_command("/new"), Some(Command::New));
        assert_eq!(parse_command("/history"), Some(Command::History));
        assert_eq!(parse_command("/exit"), Some(Command::Quit));
        assert_eq!(parse_command("/?"), Some(Command::Help));
        assert_eq!(parse_command("/clear"), Some(Command::Clear));
        assert_eq!(parse_command("/wat"), Some(Command::Unknown("/wat".into())));
    }

    #[test]
    fn open_and_delete_take_an_id() {
        assert_eq!(
            parse_command("/open 2026-10-16T09:30:00.123Z"),
            Some(Command::Open("2026-10-16T09:30:00.123Z".into()))
        );
        assert_eq!(
            parse_command("/delete  abc "),
            Some(Command::Delete("abc".into()))
        );
        assert_eq!(parse_command("/open"), Some(Command::Unknown("/open".into())));
        assert_eq!(parse_command("/delete "), Some(Command::Unknown("/delete".into())));
    }
}
