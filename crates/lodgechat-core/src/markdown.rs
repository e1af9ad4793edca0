//! Markdown-subset renderer for bot replies.
//!
//! Pure text transform covering the fixed subset the assistant emits: headings
//! 1–4, bold, italic, inline code, and line breaks. Heading patterns run first
//! (longest marker first so `####` is never half-eaten by `#`), inline styles
//! next, and newline-to-`<br>` last so it cannot break the line anchoring of
//! the heading regexes. Input is trusted assistant output — no sanitization.

use regex::Regex;
use std::sync::LazyLock;

static H4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^####\s+(.+)$").unwrap());
static H3_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^###\s+(.+)$").unwrap());
static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^##\s+(.+)$").unwrap());
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());

static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

/// Render the markdown subset to an HTML string.
pub fn render(text: &str) -> String {
    let out = H4_RE.replace_all(text, "<h4>$1</h4>");
    let out = H3_RE.replace_all(&out, "<h3>$1</h3>");
    let out = H2_RE.replace_all(&out, "<h2>$1</h2>");
    let out = H1_RE.replace_all(&out, "<h1>$1</h1>");

    let out = BOLD_RE.replace_all(&out, "<strong>$1</strong>");
    let out = ITALIC_RE.replace_all(&out, "<em>$1</em>");
    let out = CODE_RE.replace_all(&out, "<code>$1</code>");

    out.replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_styles_and_line_break() {
        let html = render("**bold** and *italic* and `code`\nline2");
        let bold = html.find("<strong>bold</strong>").expect("bold missing");
        let italic = html.find("<em>italic</em>").expect("italic missing");
        let code = html.find("<code>code</code>").expect("code missing");
        let br = html.find("<br>line2").expect("line break missing");
        assert!(bold < italic && italic < code && code < br);
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(render("# Title"), "<h1>Title</h1>");
        assert_eq!(render("## Title"), "<h2>Title</h2>");
        assert_eq!(render("### Title"), "<h3>Title</h3>");
        assert_eq!(render("#### Title"), "<h4>Title</h4>");
    }

    #[test]
    fn test_h4_not_eaten_by_h1() {
        // Longest marker first: "#### x" must never come out as <h1>### x</h1>.
        let html = render("#### Deposit rules");
        assert_eq!(html, "<h4>Deposit rules</h4>");
    }

    #[test]
    fn test_heading_only_at_line_start() {
        let html = render("rate is 5 # not a heading");
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn test_heading_on_second_line() {
        let html = render("intro\n## Repairs");
        assert!(html.contains("<h2>Repairs</h2>"));
        assert!(html.contains("intro<br>"));
    }

    #[test]
    fn test_bold_before_italic() {
        // ** must be consumed before * so bold never renders as nested <em>.
        let html = render("**strong**");
        assert_eq!(html, "<strong>strong</strong>");
    }

    #[test]
    fn test_multiple_newlines() {
        assert_eq!(render("a\n\nb"), "a<br><br>b");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("nothing special"), "nothing special");
    }
}
