//! Command-line parsing for chat messages.

/// Split `text` into a lowercase command name and its trimmed argument string.
///
/// Returns `None` unless the text starts with `prefix` immediately followed
/// by a command word.
pub fn parse_command(text: &str, prefix: &str) -> Option<(String, String)> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().filter(|name| !name.is_empty())?;
    let args = parts.next().unwrap_or("").trim();
    Some((name.to_lowercase(), args.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_args() {
        assert_eq!(
            parse_command(".search hello world", "."),
            Some(("search".to_string(), "hello world".to_string()))
        );
        assert_eq!(
            parse_command(".ping", "."),
            Some(("ping".to_string(), String::new()))
        );
    }

    #[test]
    fn test_name_is_case_insensitive() {
        assert_eq!(parse_command(".PING", ".").unwrap().0, "ping");
    }

    #[test]
    fn test_args_keep_inner_lines() {
        let (_, args) = parse_command("!search  line one\nline two ", "!").unwrap();
        assert_eq!(args, "line one\nline two");
    }

    #[test]
    fn test_non_commands() {
        assert!(parse_command("hello", ".").is_none());
        assert!(parse_command(".", ".").is_none());
        assert!(parse_command(". ping", ".").is_none());
        assert!(parse_command("", ".").is_none());
    }
}
