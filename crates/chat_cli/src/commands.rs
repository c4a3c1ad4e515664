#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    New,
    Open(String),
    Sessions,
    Models,
    Model(String),
    /// `None` toggles.
    Think(Option<bool>),
    Stop,
    Upload(String),
    Quit,
    Usage(&'static str),
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
/help              show this help
/new               start a new chat
/open <id>         open an existing chat
/sessions          list recent chats
/models            list models
/model <id>        switch model for this chat
/think [on|off]    toggle thinking for this chat
/stop              stop the current response
/upload <path>     upload an image
/quit              exit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/new" => SlashCommand::New,
        "/open" if argument.is_empty() => SlashCommand::Usage("/open <id>"),
        "/open" => SlashCommand::Open(argument.to_owned()),
        "/sessions" => SlashCommand::Sessions,
        "/models" => SlashCommand::Models,
        "/model" if argument.is_empty() => SlashCommand::Usage("/model <id>"),
        "/model" => SlashCommand::Model(argument.to_owned()),
        "/think" => match argument {
            "" => SlashCommand::Think(None),
            "on" => SlashCommand::Think(Some(true)),
            "off" => SlashCommand::Think(Some(false)),
            _ => SlashCommand::Usage("/think [on|off]"),
        },
        "/stop" => SlashCommand::Stop,
        "/upload" if argument.is_empty() => SlashCommand::Usage("/upload <path>"),
        "/upload" => SlashCommand::Upload(argument.to_owned()),
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_owned()),
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::{parse_slash_command, SlashCommand};

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello /help"), None);
    }

    #[test]
    fn arguments_are_trimmed() {
        assert_eq!(
            parse_slash_command("  /open   abc-123  "),
            Some(SlashCommand::Open("abc-123".to_owned()))
        );
        assert_eq!(
            parse_slash_command("/upload /tmp/cat photo.png"),
            Some(SlashCommand::Upload("/tmp/cat photo.png".to_owned()))
        );
    }

    #[test]
    fn think_accepts_on_off_or_nothing() {
        assert_eq!(parse_slash_command("/think"), Some(SlashCommand::Think(None)));
        assert_eq!(
            parse_slash_command("/think on"),
            Some(SlashCommand::Think(Some(true)))
        );
        assert_eq!(
            parse_slash_command("/think maybe"),
            Some(SlashCommand::Usage("/think [on|off]"))
        );
    }

    #[test]
    fn missing_arguments_report_usage() {
        assert_eq!(
            parse_slash_command("/model"),
            Some(SlashCommand::Usage("/model <id>"))
        );
        assert_eq!(
            parse_slash_command("/bogus x"),
            Some(SlashCommand::Unknown("/bogus".to_owned()))
        );
    }
}
