//! Parsing of the `forloop` and `foreach` constructs.
//!
//! ```text
//! forloop 0..5 as $i do { scan 10.0.0.$i }
//! foreach [a b "c d"] as $x do { echo $x; sha256 $x }
//! ```
//!
//! Execution lives in [`crate::shell`]; this module turns a line into the list
//! of values to bind and the body commands to run for each of them.

use crate::error::ShellError;
use crate::lexer::tokenize;
use regex::Regex;
use std::sync::LazyLock;

static FORLOOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*forloop\s+(\S+)\s+as\s+\$([A-Za-z_][A-Za-z0-9_]*)\s+do\s*\{").unwrap()
});

static FOREACH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*foreach\s+(.+?)\s+as\s+\$([A-Za-z_][A-Za-z0-9_]*)\s+do\s*\{").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    Each,
}

/// A recognized loop whose source has not been evaluated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub kind: LoopKind,
    /// The range (`forloop`) or list (`foreach`) expression.
    pub source: String,
    pub var: String,
    pub body: Vec<String>,
}

impl Loop {
    /// Recognizes a `forloop` or `foreach` line.
    ///
    /// Returns `None` if the line is not a loop, including when the `do { }`
    /// braces are unbalanced or followed by anything but whitespace.
    pub fn parse(line: &str) -> Option<Self> {
        let (kind, caps) = if let Some(caps) = FORLOOP.captures(line) {
            (LoopKind::For, caps)
        } else {
            (LoopKind::Each, FOREACH.captures(line)?)
        };

        let open = caps.get(0)?.end() - 1;
        let close = matching_brace(line, open)?;
        if !line[close + 1..].trim().is_empty() {
            return None;
        }

        Some(Self {
            kind,
            source: caps[1].trim().to_string(),
            var: caps[2].to_string(),
            body: split_body(&line[open + 1..close]),
        })
    }

    /// Expands the loop source into the values bound on each iteration.
    pub fn values(&self) -> Result<Vec<String>, ShellError> {
        match self.kind {
            LoopKind::For => range_values(&self.source),
            LoopKind::Each => Ok(list_items(&self.source)),
        }
    }
}

/// Byte index of the `}` closing the `{` at `open`.
///
/// Braces inside double quotes do not count.
fn matching_brace(line: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, ch) in line[open..].char_indices() {
        match ch {
            '"' => quoted = !quoted,
            _ if quoted => {}
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits a loop body on `;` outside nested braces and double quotes,
/// dropping blank commands.
fn split_body(body: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for ch in body.chars() {
        match ch {
            '"' => quoted = !quoted,
            _ if quoted => {}
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                commands.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    commands.push(current);

    commands
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Values of a `forloop` range: `A..B`, `a,b,c` or `N`.
pub fn range_values(expr: &str) -> Result<Vec<String>, ShellError> {
    if let Some((start, end)) = expr.split_once("..") {
        let (Ok(start), Ok(end)) = (start.parse::<i64>(), end.parse::<i64>()) else {
            return Err(ShellError::InvalidRange(format!("invalid range: {expr}")));
        };
        let values: Vec<String> = if start <= end {
            (start..=end).map(|i| i.to_string()).collect()
        } else {
            (end..=start).rev().map(|i| i.to_string()).collect()
        };
        return Ok(values);
    }

    if expr.contains(',') {
        return Ok(expr.split(',').map(|s| s.trim().to_string()).collect());
    }

    match expr.parse::<i64>() {
        Ok(n) => Ok((0..n).map(|i| i.to_string()).collect()),
        Err(_) => Err(ShellError::InvalidRange(format!(
            "invalid range expression: {expr}"
        ))),
    }
}

/// Items of a `foreach` list: `[a "b c"]`, `"a"|'b'|c` or a single item.
pub fn list_items(expr: &str) -> Vec<String> {
    let expr = expr.trim();

    if expr.len() >= 2 && expr.starts_with('[') && expr.ends_with(']') {
        return tokenize(expr[1..expr.len() - 1].trim());
    }

    if expr.contains('|') {
        return expr.split('|').map(|p| unquote(p.trim()).to_string()).collect();
    }

    vec![
        expr.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '"' | '\''))
            .to_string(),
    ]
}

/// Strips one matching pair of surrounding `"` or `'`.
pub(crate) fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
