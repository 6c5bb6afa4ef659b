//! Link stripping applied to transcript content before it is summarized.

use std::sync::LazyLock;

use regex::Regex;

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link regex"));

static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));

/// `[text](url)` becomes `text`; bare URLs are deleted. Surrounding
/// whitespace is left untouched.
pub fn strip_links(content: &str) -> String {
    let without_links = MARKDOWN_LINK.replace_all(content, "$1");
    BARE_URL.replace_all(&without_links, "").into_owned()
}
