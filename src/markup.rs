use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strips tags such as `<highlighttext>` from API snippets and decodes entities.
///
/// Runs of whitespace, newlines included, collapse to one space so a snippet
/// always renders on a single report line.
pub fn strip_markup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(text);
    let plain = fragment.root_element().text().collect::<Vec<_>>().join("");
    WHITESPACE.replace_all(plain.trim(), " ").into_owned()
}

/// Cuts `text` to `max` characters, appending "..." when something was dropped.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
