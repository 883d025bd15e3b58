use scraper::{ElementRef, Html};

/// Lowercase phrases that only appear on bot-challenge pages.
pub const BLOCK_PHRASES: [&str; 5] = [
    "captcha",
    "unusual traffic",
    "our systems have detected",
    "not a robot",
    "automated queries",
];

const EXCERPT_CHARS: usize = 200;

/// First challenge phrase found in `text`, case-insensitive.
pub fn find_block_phrase(text: &str) -> Option<&'static str> {
    let lower = text.to_ascii_lowercase();
    BLOCK_PHRASES
        .iter()
        .copied()
        .find(|phrase| lower.contains(phrase))
}

/// Text a reader would see: no script/style bodies, whitespace collapsed.
pub fn visible_text(doc: &Html) -> String {
    let mut parts = Vec::new();
    collect_text(doc.root_element(), &mut parts);
    parts.join(" ")
}

fn collect_text<'a>(el: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    if matches!(el.value().name(), "script" | "style" | "noscript" | "template") {
        return;
    }
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            parts.extend(text.split_whitespace());
        } else if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, parts);
        }
    }
}

/// Short leading slice of `text` for error messages.
pub fn excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_phrase_case_insensitive() {
        assert_eq!(
            find_block_phrase("Our systems have detected UNUSUAL TRAFFIC"),
            Some("unusual traffic")
        );
        assert_eq!(find_block_phrase("Please solve the CAPTCHA"), Some("captcha"));
        assert_eq!(find_block_phrase("Citations 42"), None);
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let doc = Html::parse_document(
            r#"<html><head><style>.captcha { color: red }</style>
            <script>var captcha = true;</script></head>
            <body><p>Hello
               world</p><noscript>enable js</noscript></body></html>"#,
        );
        let text = visible_text(&doc);
        assert_eq!(text, "Hello world");
        assert_eq!(find_block_phrase(&text), None);
    }

    #[test]
    fn excerpt_truncates_long_text() {
        let long = "word ".repeat(100);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(excerpt("  short \n text "), "short text");
    }
}
