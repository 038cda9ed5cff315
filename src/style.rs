//! ANSI terminal styling.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";

/// Wraps `text` in `code` when colors are enabled.
pub fn paint(text: &str, code: &str, colors: bool) -> String {
    if colors {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}
