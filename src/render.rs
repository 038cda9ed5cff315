//! Text rendering of command results.

use crate::style::{self, BLUE, CYAN, DIM, GREEN, MAGENTA, YELLOW};
use crate::value::{DisplayMode, ModuleResult, Value};
use std::collections::{BTreeMap, BTreeSet};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const VALUE_WIDTH: usize = 40;

/// Renders a [`ModuleResult`] according to its display mode.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub colors: bool,
}

impl Renderer {
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    /// The full text printed for a result, including the surrounding blank lines.
    pub fn render(&self, result: &ModuleResult) -> String {
        let body = match result.display {
            DisplayMode::Table => result.output.as_ref().map(|o| self.table(o)).unwrap_or_default(),
            DisplayMode::Pretty => result.output.as_ref().map(|o| self.pretty(o)).unwrap_or_default(),
            DisplayMode::Raw => raw(result),
        };
        format!("\n{body}\n")
    }

    /// Indented key/value listing, one line per leaf.
    pub fn pretty(&self, value: &Value) -> String {
        match value {
            Value::Map(m) => self.pretty_map(m, 0),
            Value::List(items) => self.pretty_list(items, 0),
            scalar => format!("{scalar}\n"),
        }
    }

    fn pretty_map(&self, map: &BTreeMap<String, Value>, indent: usize) -> String {
        let mut out = String::new();
        for (key, val) in map {
            out.push_str(&"  ".repeat(indent));
            out.push_str(&style::paint(key, CYAN, self.colors));
            out.push(':');
            out.push_str(&self.pretty_entry(val, indent));
        }
        out
    }

    fn pretty_list(&self, items: &[Value], indent: usize) -> String {
        let mut out = String::new();
        for (i, val) in items.iter().enumerate() {
            out.push_str(&"  ".repeat(indent));
            out.push_str(&style::paint(&format!("[{i}]"), BLUE, self.colors));
            out.push(':');
            out.push_str(&self.pretty_entry(val, indent));
        }
        out
    }

    fn pretty_entry(&self, val: &Value, indent: usize) -> String {
        let leaf = |text: &str, color| format!(" {}\n", style::paint(text, color, self.colors));
        match val {
            Value::Map(m) => format!("\n{}", self.pretty_map(m, indent + 1)),
            Value::List(items) => format!("\n{}", self.pretty_list(items, indent + 1)),
            Value::String(s) => leaf(&format!("\"{s}\""), GREEN),
            Value::Number(n) => leaf(&n.to_string(), YELLOW),
            Value::Bool(b) => leaf(&b.to_string(), MAGENTA),
            Value::Null => leaf("null", DIM),
        }
    }

    /// Box-drawn table: vertical for a map, horizontal for a list of maps.
    pub fn table(&self, value: &Value) -> String {
        match value {
            Value::Map(m) => vertical_table(m),
            Value::List(items) => {
                if items.is_empty() {
                    return "(empty)\n".to_string();
                }
                let rows: Vec<_> = items.iter().filter_map(Value::as_map).collect();
                if rows.is_empty() {
                    self.pretty(value)
                } else {
                    horizontal_table(&rows)
                }
            }
            other => self.pretty(other),
        }
    }
}

fn raw(result: &ModuleResult) -> String {
    match serde_json::to_string_pretty(&result.to_json()) {
        Ok(text) => format!("{text}\n"),
        Err(_) => String::new(),
    }
}

fn vertical_table(map: &BTreeMap<String, Value>) -> String {
    if map.is_empty() {
        return "(empty)\n".to_string();
    }
    let key_width = map.keys().map(|k| width(k)).max().unwrap_or(0).max("Field".len());
    let widths = [key_width, VALUE_WIDTH];

    let mut out = border('┌', '┬', '┐', &widths);
    out.push_str(&row(&["Field".to_string(), "Value".to_string()], &widths));
    out.push_str(&border('├', '┼', '┤', &widths));
    for (key, val) in map {
        out.push_str(&row(&[key.clone(), truncate(&val.to_string(), VALUE_WIDTH)], &widths));
    }
    out.push_str(&border('└', '┴', '┘', &widths));
    out
}

fn horizontal_table(rows: &[&BTreeMap<String, Value>]) -> String {
    let columns: Vec<&String> = rows
        .iter()
        .flat_map(|r| r.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .map(|col| {
            rows.iter()
                .filter_map(|r| r.get(*col))
                .map(|v| width(&v.to_string()))
                .max()
                .unwrap_or(0)
                .max(width(col))
        })
        .collect();

    let mut out = border('┌', '┬', '┐', &widths);
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    out.push_str(&row(&header, &widths));
    out.push_str(&border('├', '┼', '┤', &widths));
    for r in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| r.get(*c).map(Value::to_string).unwrap_or_default())
            .collect();
        out.push_str(&row(&cells, &widths));
    }
    out.push_str(&border('└', '┴', '┘', &widths));
    out
}

fn border(left: char, mid: char, right: char, widths: &[usize]) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{left}{}{right}\n", segments.join(&mid.to_string()))
}

fn row(cells: &[String], widths: &[usize]) -> String {
    let mut out = String::from("│");
    for (cell, w) in cells.iter().zip(widths) {
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(w.saturating_sub(width(cell))));
        out.push_str(" │");
    }
    out.push('\n');
    out
}

/// Terminal columns taken by `s`; wide characters count twice.
fn width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cuts `s` to at most `max` columns, ending in `...` when shortened.
fn truncate(s: &str, max: usize) -> String {
    if width(s) <= max {
        return s.to_string();
    }
    let budget = max.saturating_sub(3);
    let mut used = 0;
    let mut kept = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        kept.push(ch);
    }
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn value(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_raw_renders_whole_result() {
        let mut res = ModuleResult::success(value(json!(["1", "2", "3"])));
        res.extra.insert("count".into(), Value::from(3i64));
        let text = Renderer::new(false).render(&res);
        let expected = "\n{\n  \"count\": 3,\n  \"output\": [\n    \"1\",\n    \"2\",\n    \"3\"\n  ],\n  \"status\": \"success\"\n}\n\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_pretty_nested() {
        let v = value(json!({"name": "eth0", "up": true, "addrs": ["10.0.0.1"], "mtu": 1500, "gw": null}));
        let text = Renderer::new(false).pretty(&v);
        let expected = "\
addrs:
  [0]: \"10.0.0.1\"
gw: null
mtu: 1500
name: \"eth0\"
up: true
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_pretty_scalar_is_plain() {
        assert_eq!(Renderer::new(true).pretty(&Value::from("hi")), "hi\n");
    }

    #[test]
    fn test_pretty_colors_strings_green() {
        let text = Renderer::new(true).pretty(&value(json!({"k": "v"})));
        assert_eq!(text, "\x1b[36mk\x1b[0m: \x1b[32m\"v\"\x1b[0m\n");
    }

    #[test]
    fn test_vertical_table() {
        let text = Renderer::new(false).table(&value(json!({"host": "a", "port": 22})));
        let dash = "─".repeat(42);
        let expected = format!(
            "┌───────┬{dash}┐\n│ Field │ Value{pad} │\n├───────┼{dash}┤\n│ host  │ a{pad2} │\n│ port  │ 22{pad3} │\n└───────┴{dash}┘\n",
            pad = " ".repeat(35),
            pad2 = " ".repeat(39),
            pad3 = " ".repeat(38),
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_vertical_table_truncates_long_values() {
        let long = "x".repeat(50);
        let text = Renderer::new(false).table(&value(json!({ "k": long })));
        assert!(text.contains(&format!("{}...", "x".repeat(37))));
        assert!(!text.contains(&"x".repeat(38)));
    }

    #[test]
    fn test_wide_characters_pad_by_columns() {
        let text = Renderer::new(false).table(&value(json!([{"名前": "値"}])));
        let expected = "\
┌──────┐
│ 名前 │
├──────┤
│ 値   │
└──────┘
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_truncate_counts_wide_characters() {
        let cut = truncate(&"名".repeat(25), VALUE_WIDTH);
        assert_eq!(cut, format!("{}...", "名".repeat(18)));
        assert_eq!(width(&cut), 39);
        assert_eq!(truncate("short", VALUE_WIDTH), "short");
    }

    #[test]
    fn test_horizontal_table_unions_columns() {
        let v = value(json!([{"name": "a", "size": 10}, {"name": "bb", "mode": "rw"}]));
        let text = Renderer::new(false).table(&v);
        let expected = "\
┌──────┬──────┬──────┐
│ mode │ name │ size │
├──────┼──────┼──────┤
│      │ a    │ 10   │
│ rw   │ bb   │      │
└──────┴──────┴──────┘
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_table_falls_back_to_pretty() {
        let r = Renderer::new(false);
        assert_eq!(r.table(&value(json!(["a", "b"]))), "[0]: \"a\"\n[1]: \"b\"\n");
        assert_eq!(r.table(&Value::from(5i64)), "5\n");
        assert_eq!(r.table(&value(json!([]))), "(empty)\n");
        assert_eq!(r.table(&value(json!({}))), "(empty)\n");
    }

    #[test]
    fn test_render_modes_wrap_with_blank_lines() {
        let mut res = ModuleResult::success("Hello, 1!");
        res.display = DisplayMode::Pretty;
        assert_eq!(Renderer::new(false).render(&res), "\nHello, 1!\n\n");

        res.output = None;
        assert_eq!(Renderer::new(false).render(&res), "\n\n");
    }
}
