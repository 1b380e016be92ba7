//! Plain-text extraction from HTML bodies.

use std::sync::LazyLock;

use regex::Regex;

static DROP_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head)\b[^>]*>.*?</(script|style|head)>")
        .expect("Invalid drop-block regex")
});

static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|table|ul|ol|blockquote)>")
        .expect("Invalid line-break regex")
});

static LIST_ITEMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("Invalid list-item regex"));

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid blank-run regex"));

/// Converts an HTML document to readable plain text.
///
/// Block elements become line breaks, list items get a `- ` prefix, the
/// common entities are decoded and runs of blank lines are collapsed.
pub fn html_to_text(html: &str) -> String {
    let text = DROP_BLOCKS.replace_all(html, "");
    let text = LIST_ITEMS.replace_all(&text, "- ");
    let text = LINE_BREAKS.replace_all(&text, "\n");
    let text = TAGS.replace_all(&text, "");
    let text = decode_entities(&text);

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_RUNS.replace_all(joined.trim(), "\n\n").into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Truncates to at most `max` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_onenote_page() {
        let html = r#"<html><head><title>Groceries</title></head>
            <body data-absolute-enabled="true">
            <div><p>Weekly list &amp; notes</p>
            <ul><li>Milk</li><li>Eggs</li></ul>
            <p>Call &quot;Bob&quot;<br/>tomorrow</p></div>
            </body></html>"#;

        assert_eq!(
            html_to_text(html),
            "Weekly list & notes\n\n- Milk\n- Eggs\n\nCall \"Bob\"\ntomorrow"
        );
    }

    #[test]
    fn strips_scripts_and_styles() {
        let html = "<style>p{color:red}</style><p>Hi</p><script>alert(1)</script>";
        assert_eq!(html_to_text(html), "Hi");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("héllo wörld", 6), "héllo…");
    }
}
