#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Tokens,
    History,
    Quit,
    Unknown(String),
}

/// Commands understood by the interactive loop, with a one-line summary.
pub const SLASH_COMMAND_HELP: &[(&str, &str)] = &[
    ("/help", "show this help"),
    ("/clear", "forget the conversation, keeping the system prompt"),
    ("/tokens", "show token usage and the estimated context size"),
    ("/history", "show how many messages are in the conversation"),
    ("/quit", "leave the session (also: exit, quit)"),
];

/// Parses a chat line into a command. Plain `exit` and `quit` count as
/// `/quit`; any other line not starting with `/` is a prompt for the model.
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return Some(SlashCommand::Quit);
    }
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_string();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/tokens" => SlashCommand::Tokens,
        "/history" => SlashCommand::History,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands_ignoring_arguments() {
        assert_eq!(parse_slash_command("/help"), Some(SlashCommand::Help));
        assert_eq!(parse_slash_command("  /clear now "), Some(SlashCommand::Clear));
        assert_eq!(parse_slash_command("/tokens"), Some(SlashCommand::Tokens));
        assert_eq!(parse_slash_command("/history"), Some(SlashCommand::History));
        assert_eq!(parse_slash_command("/quit"), Some(SlashCommand::Quit));
    }

    #[test]
    fn bare_exit_words_quit() {
        assert_eq!(parse_slash_command("exit"), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("QUIT"), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("exit the loop early"), None);
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(
            parse_slash_command("/frobnicate x"),
            Some(SlashCommand::Unknown("/frobnicate".to_string()))
        );
    }

    #[test]
    fn prompts_are_not_commands() {
        assert_eq!(parse_slash_command("refactor src/main.rs"), None);
        assert_eq!(parse_slash_command(""), None);
    }
}
