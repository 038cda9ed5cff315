//! Shell variables: storage, assignment syntax and `$name` expansion.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

static EXPORT_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").unwrap()
});

/// Process-wide variable store.
///
/// There is no scoping: every variable is global to the session, including
/// loop variables, which are removed once their loop finishes.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    vars: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// All variables, sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<_> = self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        all.sort();
        all
    }

    /// Replaces `$name` and `${name}` references with their values.
    ///
    /// Unbound names expand to the empty string. Expansion is a single pass:
    /// substituted text is not scanned again.
    pub fn expand(&self, input: &str) -> String {
        REFERENCE
            .replace_all(input, |caps: &regex::Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                self.get(name).unwrap_or("").to_string()
            })
            .into_owned()
    }
}

/// A recognized variable assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

impl Assignment {
    /// Recognizes an assignment in `line`, whose tokens are `tokens`.
    ///
    /// Forms are tried in order: `set`/`let NAME [=] VALUE...`, then
    /// `[export] NAME=VALUE`, then `$NAME VALUE...`.
    pub fn parse(line: &str, tokens: &[String]) -> Option<Self> {
        let first = tokens.first()?;

        if (first == "set" || first == "let") && tokens.len() >= 3 {
            let name = tokens[1].strip_prefix('$').unwrap_or(&tokens[1]);
            let mut value = &tokens[2..];
            if value[0] == "=" && value.len() > 1 {
                value = &value[1..];
            }
            return Some(Self {
                name: name.to_string(),
                value: value.join(" "),
            });
        }

        if let Some(caps) = EXPORT_ASSIGNMENT.captures(line) {
            return Some(Self {
                name: caps[1].to_string(),
                value: caps[2].trim().to_string(),
            });
        }

        if let Some(name) = first.strip_prefix('$') {
            if tokens.len() >= 2 {
                return Some(Self {
                    name: name.to_string(),
                    value: tokens[1..].join(" "),
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(line: &str) -> Option<Assignment> {
        Assignment::parse(line, &tokenize(line))
    }

    fn assign(name: &str, value: &str) -> Option<Assignment> {
        Some(Assignment {
            name: name.into(),
            value: value.into(),
        })
    }

    #[test]
    fn test_expand_simple_and_braced() {
        let mut vars = Variables::new();
        vars.set("x", "5");
        assert_eq!(vars.expand("ip.$x.net"), "ip.5.net");
        assert_eq!(vars.expand("${x}0"), "50");
    }

    #[test]
    fn test_expand_undefined_is_empty() {
        let vars = Variables::new();
        assert_eq!(vars.expand("$undefined"), "");
        assert_eq!(vars.expand("a${nope}b"), "ab");
    }

    #[test]
    fn test_expand_is_single_pass() {
        let mut vars = Variables::new();
        vars.set("a", "$b");
        vars.set("b", "deep");
        assert_eq!(vars.expand("$a"), "$b");
    }

    #[test]
    fn test_expand_leaves_non_names_alone() {
        let vars = Variables::new();
        assert_eq!(vars.expand("cost $5 and $"), "cost $5 and $");
    }

    #[test]
    fn test_set_and_let_forms() {
        assert_eq!(parse("set host example.com"), assign("host", "example.com"));
        assert_eq!(parse("let $n = 1 2"), assign("n", "1 2"));
        assert_eq!(parse("let n ="), assign("n", "="));
        assert_eq!(parse("set greeting \"hi there\""), assign("greeting", "hi there"));
    }

    #[test]
    fn test_set_needs_a_value() {
        assert_eq!(parse("set only"), None);
    }

    #[test]
    fn test_export_form_is_not_expanded() {
        assert_eq!(parse("ip=10.0.0.$x"), assign("ip", "10.0.0.$x"));
        assert_eq!(parse("export  PATHS = a:b  "), assign("PATHS", "a:b"));
    }

    #[test]
    fn test_dollar_shorthand() {
        assert_eq!(parse("$target 192.168.1.1"), assign("target", "192.168.1.1"));
        assert_eq!(parse("$target"), None);
    }

    #[test]
    fn test_plain_command_is_not_assignment() {
        assert_eq!(parse("echo a=b"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_sorted_listing() {
        let mut vars = Variables::new();
        vars.set("b", "2");
        vars.set("a", "1");
        assert_eq!(vars.sorted(), vec![("a", "1"), ("b", "2")]);
        assert_eq!(vars.remove("a").as_deref(), Some("1"));
        assert_eq!(vars.get("a"), None);
    }
}
