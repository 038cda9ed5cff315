//! Pipeline heads, stages and the data moved between them.
//!
//! A pipeline is `head | stage | stage ...`. The head is either a literal
//! (`[a b]`, `"text"`, `42`) or a module call. Every later stage either
//! adjusts the current [`ModuleResult`] in place (`select`, `pp`, `tt`) or
//! calls another module with the current output appended to its arguments.
//! The session in [`crate::shell`] drives the evaluation.

use crate::lexer::tokenize;
use crate::loops::unquote;
use crate::value::{DisplayMode, ModuleResult, Value};
use std::collections::BTreeMap;

/// The first segment of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Head {
    /// A result built from a literal, no module involved.
    Literal(ModuleResult),
    /// A module call; the tokens are not yet expanded.
    Command { name: String, args: Vec<String> },
    Empty,
}

impl Head {
    pub fn parse(segment: &str) -> Self {
        let text = segment.trim();
        if text.is_empty() {
            return Head::Empty;
        }

        if text.len() >= 2 && text.starts_with('[') && text.ends_with(']') {
            let items = tokenize(text[1..text.len() - 1].trim())
                .into_iter()
                .map(Value::String)
                .collect();
            return Head::Literal(ModuleResult::success(Value::List(items)));
        }

        let unquoted = unquote(text);
        if unquoted.len() != text.len() {
            return Head::Literal(ModuleResult::success(unquoted));
        }

        if let Some(number) = parse_number(text) {
            return Head::Literal(ModuleResult::success(number));
        }

        let mut tokens = tokenize(text);
        if tokens.is_empty() {
            return Head::Empty;
        }
        let name = tokens.remove(0);
        Head::Command { name, args: tokens }
    }
}

/// Float first, then integer, as number literals are read.
fn parse_number(text: &str) -> Option<Value> {
    if let Ok(f) = text.parse::<f64>() {
        // "inf" and "NaN" parse as floats but are not numbers in JSON.
        if let Some(v) = Value::from_f64(f) {
            return Some(v);
        }
    }
    text.parse::<i64>().ok().map(Value::from)
}

/// One stage after the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Select(Vec<String>),
    Pretty,
    Table,
    Module { name: String, args: Vec<String> },
}

impl Stage {
    /// Parses a stage segment; `None` for an empty segment.
    pub fn parse(segment: &str) -> Option<Self> {
        let mut tokens = tokenize(segment.trim());
        if tokens.is_empty() {
            return None;
        }
        let op = tokens.remove(0);
        Some(match op.as_str() {
            "select" => Stage::Select(select_fields(&tokens)),
            "pp" => Stage::Pretty,
            "tt" => Stage::Table,
            _ => Stage::Module {
                name: op,
                args: tokens,
            },
        })
    }

    /// Applies a directive stage to `result`. Module stages are left to the caller.
    pub fn apply(&self, result: &mut ModuleResult) {
        match self {
            Stage::Select(fields) => select(result, fields),
            Stage::Pretty => result.display = DisplayMode::Pretty,
            Stage::Table => result.display = DisplayMode::Table,
            Stage::Module { .. } => {}
        }
    }
}

/// Field names of `select a,b c`: tokens joined, then split on commas.
fn select_fields(args: &[String]) -> Vec<String> {
    let joined = args.join(" ");
    let joined = joined.trim();
    if joined == "*" {
        return Vec::new();
    }
    joined
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Narrows a map output to `fields`; missing fields are skipped silently.
///
/// Outputs that are not maps are left alone, as is everything when no field
/// was named.
pub fn select(result: &mut ModuleResult, fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    let Some(Value::Map(map)) = &result.output else {
        return;
    };
    let selected: BTreeMap<String, Value> = fields
        .iter()
        .filter_map(|f| map.get(f).map(|v| (f.clone(), v.clone())))
        .collect();
    result.output = Some(Value::Map(selected));
}

/// Turns the current output into trailing arguments for the next module.
///
/// Strings pass through, numbers and booleans are stringified, a list becomes
/// one argument per element and a map becomes a single JSON argument. A null
/// or absent output adds nothing.
pub fn project(output: Option<&Value>) -> Vec<String> {
    match output {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::List(items)) => items.iter().map(Value::to_string).collect(),
        Some(v @ Value::Map(_)) => vec![v.to_json_string()],
        Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => vec![v.to_string()],
    }
}
