//! Shell-style tokenizer for user-editable command lines

use crate::error::BuildError;

/// A parsed command line: the program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Full argv, program first
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Split command text into argv tokens.
///
/// Line continuations (`\` followed by `\n` or `\r\n`) become a single space.
/// Text inside matching `'` or `"` forms one token with the quotes stripped,
/// whitespace inside quotes is kept verbatim, and an unterminated quote runs to
/// the end of input. An empty result is valid here; [`parse_command`] is the
/// entry point that rejects it.
pub fn tokenize(input: &str) -> Vec<String> {
    let cleaned = input.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in cleaned.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Tokenize and split into program + args, rejecting empty commands
pub fn parse_command(input: &str) -> Result<CommandLine, BuildError> {
    let mut tokens = tokenize(input).into_iter();
    let program = tokens.next().ok_or(BuildError::EmptyCommand)?;
    Ok(CommandLine {
        program,
        args: tokens.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn toks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[parameterized(
        collapses_spaces = { "a  b", &["a", "b"] },
        single_quotes = { "'a b' c", &["a b", "c"] },
        continuation = { "a\\\nb", &["a", "b"] },
        crlf_continuation = { "a \\\r\n  b", &["a", "b"] },
        double_quotes = { "lb config --iso-volume \"My Volume\"", &["lb", "config", "--iso-volume", "My Volume"] },
        mixed_quote_inside = { "echo \"it's\" 'say \"hi\"'", &["echo", "it's", "say \"hi\""] },
        preserves_inner_spaces = { "'a    b'", &["a    b"] },
        trims_edges = { "   lb   build   ", &["lb", "build"] },
        unterminated = { "echo 'never closed here", &["echo", "never closed here"] },
        glued_quotes = { "--name=\"x y\"z", &["--name=x yz"] },
        tabs_and_newlines = { "a\tb\nc", &["a", "b", "c"] },
    )]
    fn test_tokenize(input: &str, expected: &[&str]) {
        assert_eq!(tokenize(input), toks(expected));
    }

    #[test]
    fn test_tokenize_whitespace_only_is_empty() {
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("").is_empty());
        assert!(tokenize("\\\n").is_empty());
    }

    #[test]
    fn test_tokenize_drops_empty_quotes() {
        assert_eq!(tokenize("cmd '' x"), toks(&["cmd", "x"]));
    }

    #[test]
    fn test_parse_command_rejects_empty() {
        assert!(matches!(parse_command("   "), Err(BuildError::EmptyCommand)));
        assert!(matches!(parse_command(""), Err(BuildError::EmptyCommand)));
        assert!(matches!(parse_command("''"), Err(BuildError::EmptyCommand)));
    }

    #[test]
    fn test_parse_command_splits_program() {
        let cmd = parse_command("lb config \\\n  --distribution bookworm").unwrap();
        assert_eq!(cmd.program, "lb");
        assert_eq!(cmd.args, toks(&["config", "--distribution", "bookworm"]));
        assert_eq!(cmd.argv(), toks(&["lb", "config", "--distribution", "bookworm"]));
    }
}
