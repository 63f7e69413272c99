//! Free-text sanitization for the public approval surface.
//!
//! Strips executable markup (script/style blocks, inline event handlers,
//! `javascript:` URLs, embed-style tags) from notes and change-request
//! descriptions before they are persisted. Plain text and harmless
//! formatting are left alone.

use std::sync::OnceLock;

use regex::Regex;

fn script_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<\s*(script|style)\b[^>]*>.*?<\s*/\s*(script|style)\s*>").unwrap()
    })
}

fn dangling_script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unclosed <script> swallows the rest of the input in a browser, so an
    // unterminated opening tag and everything after it has to go too.
    RE.get_or_init(|| Regex::new(r"(?is)<\s*(script|style)\b.*").unwrap())
}

fn embed_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*/?\s*(iframe|object|embed|form)\b[^>]*>").unwrap()
    })
}

fn event_handler_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\bon[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap())
}

fn javascript_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)javascript\s*:").unwrap())
}

/// Strip executable markup from free text. Idempotent.
pub fn strip_markup(input: &str) -> String {
    let text = script_block_re().replace_all(input, "");
    let text = dangling_script_re().replace_all(&text, "");
    let text = embed_tag_re().replace_all(&text, "");
    let text = event_handler_re().replace_all(&text, "");
    let text = javascript_url_re().replace_all(&text, "");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(
            strip_markup("Please move the Dec 16 email to the morning"),
            "Please move the Dec 16 email to the morning"
        );
    }

    #[test]
    fn test_script_block_removed() {
        let out = strip_markup("before <script>alert(1)</script> after");
        assert_eq!(out, "before  after");
    }

    #[test]
    fn test_unclosed_script_removed() {
        let out = strip_markup("note <script src=x>payload");
        assert_eq!(out, "note");
    }

    #[test]
    fn test_mixed_case_script_removed() {
        let out = strip_markup("<ScRiPt>alert(1)</sCrIpT>ok");
        assert_eq!(out, "ok");
    }

    #[test]
    fn test_event_handler_stripped() {
        let out = strip_markup(r#"<img src=x onerror="alert(1)">"#);
        assert!(!out.to_lowercase().contains("onerror"));
    }

    #[test]
    fn test_javascript_url_stripped() {
        let out = strip_markup(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.to_lowercase().contains("javascript:"));
    }

    #[test]
    fn test_iframe_removed() {
        let out = strip_markup(r#"hello <iframe src="https://evil.example"></iframe>"#);
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_idempotent() {
        let once = strip_markup("a <script>b</script> c");
        assert_eq!(strip_markup(&once), once);
    }
}
