//! Article summary normalization
//!
//! Summaries arrive from many sources: pasted HTML, Markdown produced by
//! summarization tools, or plain text typed into the extension popup. This
//! module detects which of the three a summary is and turns it into safe
//! HTML plus a plain-text projection.
//!
//! # Example
//!
//! ```
//! use research_locker::services::summary::{normalize, SummaryFormat};
//!
//! let summary = normalize("## Findings\n\n- **Faster** training");
//! assert_eq!(summary.format, SummaryFormat::Markdown);
//! assert!(summary.html.contains("<h2>"));
//! ```

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use serde::Serialize;

static HTML_CLOSING_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</\s*(p|ul|ol|li|strong|em|b|i|u|h[1-6]|div|span|a|blockquote|table|tr|td|th|pre|code)\s*>")
        .expect("closing tag pattern is valid")
});

static HTML_BREAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("break tag pattern is valid"));

static MARKDOWN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?m)^\s{0,3}#{1,6}\s+\S",
        r"(?m)^\s*[-*•]\s+\S",
        r"(?m)^\s*\d+[.)]\s+\S",
        r"\*\*[^*\n]+\*\*",
        r"\[[^\]\n]+\]\([^)\s]+\)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("markdown pattern is valid"))
    .collect()
});

static DANGEROUS_ELEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "iframe"]
        .iter()
        .map(|name| {
            Regex::new(&format!(r"(?is)<\s*{0}\b[^>]*>.*?<\s*/\s*{0}\s*>", name))
                .expect("element pattern is valid")
        })
        .collect()
});

static DANGEROUS_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(script|style|iframe)\b[^>]*>").expect("tag pattern is valid")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

// `/` and a closing quote separate attributes as well as whitespace
static EVENT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(["']|[\s/]+)on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("event attribute pattern is valid")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)([a-z][a-z0-9_:-]*)\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+)"#)
        .expect("attribute pattern is valid")
});

static CHARACTER_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)&(#x[0-9a-f]+|#[0-9]+|[a-z]+);?").expect("character reference pattern is valid")
});

static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank line pattern is valid"));

static BULLET_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)•[ \t]*").expect("bullet pattern is valid"));

/// Detected summary format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFormat {
    Html,
    Markdown,
    PlainText,
}

/// A summary ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedSummary {
    pub format: SummaryFormat,
    /// Sanitized HTML
    pub html: String,
    /// Plain-text projection with whitespace collapsed
    pub text: String,
}

/// Guess the format of a summary
pub fn classify(text: &str) -> SummaryFormat {
    if text.trim().is_empty() {
        return SummaryFormat::PlainText;
    }
    if HTML_CLOSING_TAG.is_match(text) || HTML_BREAK_TAG.is_match(text) {
        return SummaryFormat::Html;
    }
    if MARKDOWN_PATTERNS.iter().any(|re| re.is_match(text)) {
        return SummaryFormat::Markdown;
    }
    SummaryFormat::PlainText
}

/// Classify and convert a summary to safe HTML
pub fn normalize(text: &str) -> NormalizedSummary {
    let text = text.replace("\r\n", "\n");
    let format = classify(&text);

    let html = match format {
        SummaryFormat::Html => sanitize_html(text.trim()),
        SummaryFormat::Markdown => sanitize_html(&render_markdown(&text)),
        SummaryFormat::PlainText => plain_text_to_html(&text),
    };
    let text = html_to_text(&html);

    NormalizedSummary { format, html, text }
}

/// Remove active content from HTML
pub fn sanitize_html(input: &str) -> String {
    let mut html = input.to_string();

    // Removal can splice a new tag together, so repeat until stable
    loop {
        let mut next = html.clone();
        for element in DANGEROUS_ELEMENTS.iter() {
            next = element.replace_all(&next, "").into_owned();
        }
        next = DANGEROUS_TAGS.replace_all(&next, "").into_owned();
        if next == html {
            break;
        }
        html = next;
    }

    ANY_TAG
        .replace_all(&html, |caps: &regex::Captures| {
            let tag = strip_event_attributes(&caps[0]);
            ATTRIBUTE
                .replace_all(&tag, |attr: &regex::Captures| {
                    if is_script_url(&attr[2]) {
                        format!("{}=\"#\"", &attr[1])
                    } else {
                        attr[0].to_string()
                    }
                })
                .into_owned()
        })
        .into_owned()
}

fn strip_event_attributes(tag: &str) -> String {
    let mut tag = tag.to_string();
    loop {
        let next = EVENT_ATTRIBUTE
            .replace_all(&tag, |caps: &regex::Captures| match &caps[1] {
                quote @ ("\"" | "'") => quote.to_string(),
                _ => String::new(),
            })
            .into_owned();
        if next == tag {
            return tag;
        }
        tag = next;
    }
}

/// Whether an attribute value resolves to a script URL once the browser
/// decodes it
fn is_script_url(raw: &str) -> bool {
    let value = raw.trim_matches(|c: char| c == '"' || c == '\'');
    let decoded: String = decode_character_references(value)
        .chars()
        .filter(|c| !c.is_ascii_control() && !c.is_ascii_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    decoded.starts_with("javascript:") || decoded.starts_with("vbscript:")
}

fn decode_character_references(value: &str) -> String {
    CHARACTER_REFERENCE
        .replace_all(value, |caps: &regex::Captures| {
            let reference = &caps[1];
            let lower = reference.to_ascii_lowercase();
            let decoded = if let Some(hex) = lower.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = lower.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match lower.as_str() {
                    "colon" => Some(':'),
                    "tab" => Some('\t'),
                    "newline" => Some('\n'),
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn render_markdown(text: &str) -> String {
    let text = BULLET_DOT.replace_all(text, "${1}- ");

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    // Raw HTML inside Markdown is shown as text, never rendered
    let events = Parser::new_ext(&text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut output = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut output, events);
    output.trim_end().to_string()
}

fn plain_text_to_html(text: &str) -> String {
    BLANK_LINES
        .split(text.trim())
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<String> = block.lines().map(|line| html_escape(line.trim())).collect();
            format!("<p>{}</p>", lines.join("<br />"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn html_to_text(html: &str) -> String {
    let stripped = ANY_TAG.replace_all(html, " ");
    let decoded = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text for inclusion in HTML
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_html() {
        assert_eq!(classify("<p>Results</p>"), SummaryFormat::Html);
        assert_eq!(classify("line one<br>line two"), SummaryFormat::Html);
        assert_eq!(classify("<ul><li>a</li></ul>"), SummaryFormat::Html);
    }

    #[test]
    fn test_classify_markdown() {
        assert_eq!(classify("# Title\n\nBody"), SummaryFormat::Markdown);
        assert_eq!(classify("- first\n- second"), SummaryFormat::Markdown);
        assert_eq!(classify("• first\n• second"), SummaryFormat::Markdown);
        assert_eq!(classify("1. step\n2. step"), SummaryFormat::Markdown);
        assert_eq!(classify("This is **important**."), SummaryFormat::Markdown);
        assert_eq!(classify("See [paper](https://arxiv.org)"), SummaryFormat::Markdown);
    }

    #[test]
    fn test_classify_plain_text() {
        assert_eq!(classify("Just a sentence about results."), SummaryFormat::PlainText);
        assert_eq!(classify("a < b and c > d"), SummaryFormat::PlainText);
        assert_eq!(classify("   "), SummaryFormat::PlainText);
        assert_eq!(classify(""), SummaryFormat::PlainText);
    }

    #[test]
    fn test_normalize_empty() {
        let summary = normalize("  \n ");
        assert_eq!(summary.format, SummaryFormat::PlainText);
        assert_eq!(summary.html, "");
        assert_eq!(summary.text, "");
    }

    #[test]
    fn test_normalize_plain_text_paragraphs() {
        let summary = normalize("First line\nsecond line\n\nNext <block> & more");
        assert_eq!(
            summary.html,
            "<p>First line<br />second line</p>\n<p>Next &lt;block&gt; &amp; more</p>"
        );
        assert_eq!(summary.text, "First line second line Next <block> & more");
    }

    #[test]
    fn test_normalize_markdown_bullets() {
        let summary = normalize("• alpha\n• beta");
        assert_eq!(summary.format, SummaryFormat::Markdown);
        assert!(summary.html.contains("<li>alpha</li>"));
        assert!(summary.html.contains("<li>beta</li>"));
        assert_eq!(summary.text, "alpha beta");
    }

    #[test]
    fn test_markdown_raw_html_is_escaped() {
        let summary = normalize("# Title\n\n<script>alert(1)</script>");
        assert!(!summary.html.to_lowercase().contains("<script"));
    }

    #[test]
    fn test_markdown_javascript_link_neutralized() {
        let summary = normalize("[click](javascript:alert(1))");
        assert!(!summary.html.to_lowercase().contains("javascript:"));
    }

    #[test]
    fn test_sanitize_html() {
        let summary = normalize(
            r#"<p onclick="steal()">Hi</p><script>alert(1)</script><style>p{}</style><a href="javascript:alert(1)">x</a><iframe src="x"></iframe>"#,
        );
        assert_eq!(summary.format, SummaryFormat::Html);
        assert_eq!(summary.html, r##"<p>Hi</p><a href="#">x</a>"##);
        assert_eq!(summary.text, "Hi x");
    }

    #[test]
    fn test_sanitize_slash_separated_event_attribute() {
        let summary = normalize("<p>Intro</p><img/onerror=alert(1) src=x>");
        assert_eq!(summary.format, SummaryFormat::Html);
        assert!(!summary.html.to_lowercase().contains("onerror"), "{}", summary.html);
        assert!(summary.html.contains("src=x"));

        let html = sanitize_html(r#"<p title="a"onclick="b()">x</p>"#);
        assert_eq!(html, r#"<p title="a">x</p>"#);
    }

    #[test]
    fn test_sanitize_encoded_javascript_url() {
        let summary = normalize(r#"<p><a href="jav&#x61;script:alert(1)">x</a></p>"#);
        assert_eq!(summary.html, r##"<p><a href="#">x</a></p>"##);

        for href in [
            "&#106;avascript:alert(1)",
            "&#x6A&#x61vascript:alert(1)",
            "java&Tab;script&colon;alert(1)",
            " JaVaScRiPt:alert(1)",
        ] {
            let html = sanitize_html(&format!(r#"<a href="{}">x</a>"#, href));
            assert_eq!(html, r##"<a href="#">x</a>"##, "{}", href);
        }

        let safe = sanitize_html(r#"<a href="https://doi.org/10.1/x?a=1&amp;b=2">x</a>"#);
        assert_eq!(safe, r#"<a href="https://doi.org/10.1/x?a=1&amp;b=2">x</a>"#);
    }

    #[test]
    fn test_sanitize_spliced_tags() {
        let html = sanitize_html("<scr<script></script>ipt>alert(1)</p>");
        assert!(!html.to_lowercase().contains("<script"));
    }

    #[test]
    fn test_crlf_input() {
        let summary = normalize("one\r\ntwo");
        assert_eq!(summary.html, "<p>one<br />two</p>");
    }

    proptest! {
        #[test]
        fn prop_no_script_survives(
            before in "[a-zA-Z0-9 .,#*\\n-]{0,40}",
            inside in "[a-zA-Z0-9 ().;]{0,20}",
            after in "[a-zA-Z0-9 .,#*\\n-]{0,40}",
        ) {
            let input = format!("{}<p><script>{}</script></p>{}", before, inside, after);
            let summary = normalize(&input);
            prop_assert!(!summary.html.to_lowercase().contains("<script"));
        }

        #[test]
        fn prop_plain_text_never_emits_raw_angle_brackets(text in "[a-z <>&\\n]{0,60}") {
            if classify(&text) == SummaryFormat::PlainText {
                let html = normalize(&text).html;
                let without_markup = html.replace("<p>", "").replace("</p>", "").replace("<br />", "");
                prop_assert!(!without_markup.contains('<'));
                prop_assert!(!without_markup.contains('>'));
            }
        }
    }
}
