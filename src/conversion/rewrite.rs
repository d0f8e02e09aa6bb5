//! Mechanical fixes applied to a unit's text before translation.
//!
//! Cython rejects some single-line `from m import a, b` forms that CPython
//! accepts, so multi-symbol imports are split into one statement per symbol.
//! Anything this cannot rewrite safely is left exactly as written.

use once_cell::sync::Lazy;
use regex::Regex;

static FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)from[ \t]+(?P<module>\S+)[ \t]+import[ \t]+(?P<names>.+?)[ \t]*$")
        .expect("valid import pattern")
});

static IMPORTED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+(?:[ \t]+as[ \t]+\w+)?$").expect("valid name pattern"));

/// Characters that mark a line as too complex for a line-local rewrite.
const UNTOUCHABLE: &[char] = &['(', ')', '\\', '#', ';'];

/// Split every multi-symbol `from ... import` line, keeping line endings.
pub fn rewrite_imports(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        match split_import(body) {
            Some(lines) => {
                for rewritten in lines {
                    out.push_str(&rewritten);
                    out.push_str(if ending.is_empty() { "\n" } else { ending });
                }
                // Keep a missing final newline missing.
                if ending.is_empty() {
                    out.pop();
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// The replacement lines for `line`, or `None` when it must stay as is.
fn split_import(line: &str) -> Option<Vec<String>> {
    if !line.contains(',') || line.contains(UNTOUCHABLE) {
        return None;
    }
    let caps = FROM_IMPORT.captures(line)?;
    let indent = &caps["indent"];
    let module = &caps["module"];

    let names: Vec<&str> = caps["names"]
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() || !names.iter().all(|name| IMPORTED_NAME.is_match(name)) {
        return None;
    }

    Some(
        names
            .into_iter()
            .map(|name| format!("{}from {} import {}", indent, module, name))
            .collect(),
    )
}
