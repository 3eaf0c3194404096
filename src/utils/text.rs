use regex::Regex;
use std::sync::LazyLock;

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|h[1-6]|li|pre|ul|ol|tr|div)>").expect("block break pattern")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run pattern"));

/// Reduces a chapter body fragment to the text a reader sees.
pub fn html_to_text(html: &str) -> String {
    let with_breaks = BLOCK_BREAK.replace_all(html, "$0\n");
    let stripped = TAG.replace_all(&with_breaks, "");
    let decoded = html_escape::decode_html_entities(&stripped);

    let lines: Vec<&str> = decoded.lines().map(str::trim_end).collect();
    let joined = lines.join("\n");
    BLANK_RUN.replace_all(joined.trim(), "\n\n").into_owned()
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
