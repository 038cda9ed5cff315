//! Tokenization of shell input lines.
//!
//! The shell does not build a syntax tree. A line is split into plain string
//! tokens, where a double quote groups spaces into one token, and pipelines are
//! split on the `|` character.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    Quoted,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input.
    ///
    /// An unterminated quote is not an error: everything after it is taken
    /// literally until the end of the line.
    fn make_tokens(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch, &mut out),
                LexingState::Quoted => self.handle_quoted(ch),
            }
        }

        self.flush(&mut out);
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            '"' => self.state = LexingState::Quoted,
            ' ' => self.flush(out),
            c => self.buffer.push(c),
        }
    }

    fn handle_quoted(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn flush(&mut self, out: &mut Vec<String>) {
        if !self.buffer.is_empty() {
            out.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// Splits a line into whitespace-separated tokens, honoring double quotes.
///
/// Only the space character separates tokens and only `"` quotes; single
/// quotes are ordinary characters. Quote characters are dropped from the
/// resulting tokens.
///
/// ```
/// assert_eq!(trex::lexer::tokenize(r#"a "b c" d"#), vec!["a", "b c", "d"]);
/// ```
pub fn tokenize(line: &str) -> Vec<String> {
    LexingFSM::new(line).make_tokens()
}

/// Returns `true` if the line contains a `|` that is not escaped with `\`.
pub fn has_pipe(line: &str) -> bool {
    let mut prev = None;
    for ch in line.chars() {
        if ch == '|' && prev != Some('\\') {
            return true;
        }
        prev = Some(ch);
    }
    false
}

/// Splits a line into pipeline segments on unescaped `|`.
///
/// An escaped `\|` becomes a literal `|` inside its segment. Segments are
/// returned untrimmed, empty segments included.
pub fn split_pipeline(line: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                chars.next();
                current.push('|');
            }
            '|' => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_groups_double_quotes() {
        assert_eq!(tokenize(r#"a "b c" d"#), vec!["a", "b c", "d"]);
    }

    #[test]
    fn test_tokenize_empty_line() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_tokenize_collapses_spaces() {
        assert_eq!(tokenize("  a   b  "), vec!["a", "b"]);
    }

    #[test]
    fn test_tokenize_single_quotes_are_literal() {
        assert_eq!(tokenize("'a b'"), vec!["'a", "b'"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote_runs_to_end() {
        assert_eq!(tokenize(r#"echo "hello   world"#), vec!["echo", "hello   world"]);
    }

    #[test]
    fn test_tokenize_quote_inside_word_joins() {
        assert_eq!(tokenize(r#"ab"c d"e f"#), vec!["abc de", "f"]);
    }

    #[test]
    fn test_tokenize_empty_quotes_produce_nothing() {
        assert_eq!(tokenize(r#"a "" b"#), vec!["a", "b"]);
    }

    #[test]
    fn test_tokenize_tab_is_not_a_delimiter() {
        assert_eq!(tokenize("a\tb"), vec!["a\tb"]);
    }

    #[test]
    fn test_has_pipe() {
        assert!(has_pipe("ls | pp"));
        assert!(!has_pipe("echo a\\|b"));
        assert!(!has_pipe("echo plain"));
    }

    #[test]
    fn test_split_pipeline_keeps_empty_segments() {
        assert_eq!(split_pipeline("a || b |"), vec!["a ", "", " b ", ""]);
    }

    #[test]
    fn test_split_pipeline_unescapes_pipe() {
        assert_eq!(split_pipeline(r"echo a\|b | pp"), vec!["echo a|b ", " pp"]);
    }
}
