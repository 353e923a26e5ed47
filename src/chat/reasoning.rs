use std::sync::LazyLock;

use regex::Regex;

pub const REASONING_OPEN: &str = "<think>";
pub const REASONING_CLOSE: &str = "</think>";

// Non-greedy and dot-matches-newline so multi-line spans go as a unit
static REASONING_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "(?s){}.*?{}",
        regex::escape(REASONING_OPEN),
        regex::escape(REASONING_CLOSE)
    ))
    .unwrap_or_else(|e| unreachable!("reasoning pattern is static: {e}"))
});

/// Remove every reasoning span, markers included, then trim the result.
pub fn finalize_answer(raw: &str) -> String {
    REASONING_SPAN.replace_all(raw, "").trim().to_string()
}
