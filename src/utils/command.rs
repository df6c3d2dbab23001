//! Command text parsing.
//!
//! Splits `/name@bot arg1 arg2` into its parts. Commands addressed to a
//! different bot (`/name@OtherBot`) are not ours and parse to `None`.

/// Prefixes accepted when `!` commands are allowed.
pub const PREFIXES_WITH_EXCL: &[char] = &['/', '!'];

/// Prefixes accepted by default.
pub const PREFIXES: &[char] = &['/'];

/// A parsed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lower-cased command name without prefix or bot suffix.
    pub name: String,
    /// Whitespace separated arguments.
    pub args: Vec<String>,
}

/// Parse a command from message text.
///
/// `bot_username` is compared case-insensitively against an `@suffix`.
pub fn parse_command(text: &str, allow_excl: bool, bot_username: &str) -> Option<ParsedCommand> {
    let prefixes = if allow_excl { PREFIXES_WITH_EXCL } else { PREFIXES };

    let mut words = text.split_whitespace();
    let first = words.next()?;
    let body = first.strip_prefix(|c: char| prefixes.contains(&c))?;
    if body.is_empty() {
        return None;
    }

    let (name, target) = match body.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (body, None),
    };

    if let Some(target) = target
        && !target.eq_ignore_ascii_case(bot_username.trim_start_matches('@'))
    {
        return None;
    }

    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_lowercase(),
        args: words.map(str::to_string).collect(),
    })
}

/// Normalize a user-supplied command name (`/Notes` -> `notes`).
pub fn normalize_command(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| PREFIXES_WITH_EXCL.contains(&c))
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_command_with_args() {
        let cmd = parse_command("/Disable notes now", false, "warden_bot").unwrap();
        assert_eq!(cmd.name, "disable");
        assert_eq!(cmd.args, vec!["notes", "now"]);
    }

    #[test]
    fn accepts_own_username_suffix() {
        let cmd = parse_command("/flood@Warden_Bot", false, "warden_bot").unwrap();
        assert_eq!(cmd.name, "flood");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn ignores_commands_for_other_bots() {
        assert!(parse_command("/flood@other_bot", false, "warden_bot").is_none());
    }

    #[test]
    fn exclamation_prefix_depends_on_setting() {
        assert!(parse_command("!cmds", false, "warden_bot").is_none());
        assert_eq!(parse_command("!cmds", true, "warden_bot").unwrap().name, "cmds");
    }

    #[test]
    fn rejects_bare_prefix_and_plain_text() {
        assert!(parse_command("/", false, "warden_bot").is_none());
        assert!(parse_command("hello there", true, "warden_bot").is_none());
        assert!(parse_command("", true, "warden_bot").is_none());
    }

    #[test]
    fn normalize_strips_prefix_and_case() {
        assert_eq!(normalize_command("/Notes"), "notes");
        assert_eq!(normalize_command("!GET "), "get");
        assert_eq!(normalize_command("rules"), "rules");
    }
}
