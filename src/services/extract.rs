//! Metrics extraction from a profile page.
//!
//! Strategies run in order and the first one that yields all three numbers
//! wins. The visible page text is checked for challenge phrases after the
//! DOM strategies and before the freeform label search.

use crate::error::{Result, ScholarError};
use crate::selectors::*;
use crate::services::block::{excerpt, find_block_phrase, visible_text};
use crate::types::Metrics;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::fmt;
use tracing::debug;

/// Number with optional comma separators, e.g. `1,234` or `56`.
const NUMBER: &str = r"(\d{1,3}(?:,\d{3})+|\d+)";

/// Label, then up to 80 non-digit characters on the same line, then a number.
///
/// The label must be followed by whitespace, `:` or a tag bracket, so URL
/// paths such as `/citations?user=ab7...` never count as a label.
fn label_regex(labels: &str) -> Regex {
    Regex::new(&format!(
        r"(?i)\b(?:{labels})\b[\s:<>][^\d\n]{{0,80}}?{NUMBER}"
    ))
    .expect("valid label regex")
}

static CITATIONS_REGEX: Lazy<Regex> = Lazy::new(|| label_regex(r"citations|cited\s+by"));
static H_INDEX_REGEX: Lazy<Regex> = Lazy::new(|| label_regex(r"h[- ]index"));
static I10_INDEX_REGEX: Lazy<Regex> = Lazy::new(|| label_regex(r"i10[- ]index|i10"));

/// Why a strategy did not produce all three numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    TableAbsent,
    TableMalformed(String),
    MarkersAbsent { found: usize },
    MarkerUnparsable(String),
    LabelsMissing(Vec<&'static str>),
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::TableAbsent => write!(f, "structured table absent"),
            Miss::TableMalformed(why) => write!(f, "structured table malformed: {why}"),
            Miss::MarkersAbsent { found } => {
                write!(f, "fallback markers absent (found {found}, need 3)")
            }
            Miss::MarkerUnparsable(text) => write!(f, "fallback marker not numeric: {text:?}"),
            Miss::LabelsMissing(names) => {
                write!(f, "no labelled value for {}", names.join(", "))
            }
        }
    }
}

/// Raw page plus its parsed DOM, shared by every strategy.
pub struct Page<'a> {
    pub raw: &'a str,
    pub doc: Html,
}

impl<'a> Page<'a> {
    pub fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            doc: Html::parse_document(raw),
        }
    }
}

pub type Strategy = fn(&Page) -> std::result::Result<Metrics, Miss>;

/// DOM strategies, most specific first.
pub const DOM_STRATEGIES: [(&str, Strategy); 2] = [
    ("structured-table", from_structured_table),
    ("class-marker", from_class_markers),
];

/// Extract the three metrics from a profile page.
///
/// Pure: the same input always gives the same answer.
pub fn extract(html: &str) -> Result<Metrics> {
    let page = Page::parse(html);
    let mut misses = Vec::new();

    if let Some(metrics) = first_success(&page, &DOM_STRATEGIES, &mut misses) {
        return Ok(metrics);
    }

    let text = visible_text(&page.doc);
    if let Some(phrase) = find_block_phrase(&text) {
        return Err(ScholarError::Blocked {
            reason: format!("challenge phrase \"{phrase}\" in page text"),
            url: None,
            excerpt: excerpt(&text),
            page: None,
        });
    }

    match from_labels(&page) {
        Ok(metrics) => {
            debug!(strategy = "label-proximity", "metrics extracted");
            Ok(metrics)
        }
        Err(miss) => {
            misses.push(("label-proximity", miss));
            let details = misses
                .iter()
                .map(|(name, miss)| format!("{name}: {miss}"))
                .collect::<Vec<_>>()
                .join("; ");
            Err(ScholarError::Parse { details, url: None })
        }
    }
}

/// Run strategies in order; return the first full result, recording misses.
fn first_success(
    page: &Page,
    strategies: &[(&'static str, Strategy)],
    misses: &mut Vec<(&'static str, Miss)>,
) -> Option<Metrics> {
    for (name, strategy) in strategies {
        match strategy(page) {
            Ok(metrics) => {
                debug!(strategy = *name, "metrics extracted");
                return Some(metrics);
            }
            Err(miss) => {
                debug!(strategy = *name, reason = %miss, "strategy missed");
                misses.push((*name, miss));
            }
        }
    }
    None
}

/// Strip comma separators and parse. Anything else left over is a failure.
pub fn parse_count(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>()
}

/// `table#gsc_rsb_st`: rows 0..3 are citations, h-index, i10-index by
/// position; the value is the second `<td>` of each row.
pub fn from_structured_table(page: &Page) -> std::result::Result<Metrics, Miss> {
    let table = page
        .doc
        .select(&METRICS_TABLE_SELECTOR)
        .next()
        .ok_or(Miss::TableAbsent)?;

    // header rows only carry <th>
    let rows: Vec<ElementRef> = table
        .select(&ROW_SELECTOR)
        .filter(|row| row.select(&CELL_SELECTOR).next().is_some())
        .collect();
    if rows.len() < 3 {
        return Err(Miss::TableMalformed(format!(
            "expected 3 data rows, found {}",
            rows.len()
        )));
    }

    let mut values = [0u64; 3];
    for (i, row) in rows.iter().take(3).enumerate() {
        let cell = row
            .select(&CELL_SELECTOR)
            .nth(1)
            .ok_or_else(|| Miss::TableMalformed(format!("row {i} has no value cell")))?;
        let text = element_text(cell);
        values[i] = parse_count(&text).ok_or_else(|| {
            Miss::TableMalformed(format!("row {i} value {:?} is not numeric", text.trim()))
        })?;
    }

    Ok(Metrics::new(values[0], values[1], values[2]))
}

/// First three `.gsc_rsb_std` elements in document order.
pub fn from_class_markers(page: &Page) -> std::result::Result<Metrics, Miss> {
    let markers: Vec<ElementRef> = page.doc.select(&METRIC_VALUE_SELECTOR).collect();
    if markers.len() < 3 {
        return Err(Miss::MarkersAbsent {
            found: markers.len(),
        });
    }

    let mut values = [0u64; 3];
    for (i, el) in markers.iter().take(3).enumerate() {
        let text = element_text(*el);
        values[i] = parse_count(&text)
            .ok_or_else(|| Miss::MarkerUnparsable(text.trim().to_string()))?;
    }

    Ok(Metrics::new(values[0], values[1], values[2]))
}

/// Freeform search over the raw content; each metric is found on its own.
pub fn from_labels(page: &Page) -> std::result::Result<Metrics, Miss> {
    let citations = labelled_value(&CITATIONS_REGEX, page.raw);
    let h_index = labelled_value(&H_INDEX_REGEX, page.raw);
    let i10_index = labelled_value(&I10_INDEX_REGEX, page.raw);

    match (citations, h_index, i10_index) {
        (Some(c), Some(h), Some(i)) => Ok(Metrics::new(c, h, i)),
        (c, h, i) => {
            let missing = [("citations", c), ("h-index", h), ("i10-index", i)]
                .into_iter()
                .filter(|(_, v)| v.is_none())
                .map(|(name, _)| name)
                .collect();
            Err(Miss::LabelsMissing(missing))
        }
    }
}

fn labelled_value(regex: &Regex, raw: &str) -> Option<u64> {
    regex
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_count(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_page(values: [&str; 3]) -> String {
        format!(
            r##"<html><body><div id="gsc_rsb_cit">
            <table id="gsc_rsb_st">
              <thead><tr><th></th><th class="gsc_rsb_sth">All</th><th class="gsc_rsb_sth">Since 2019</th></tr></thead>
              <tbody>
                <tr><td class="gsc_rsb_sc1"><a href="#">Citations</a></td><td class="gsc_rsb_std">{}</td><td class="gsc_rsb_std">900</td></tr>
                <tr><td class="gsc_rsb_sc1"><a href="#">h-index</a></td><td class="gsc_rsb_std">{}</td><td class="gsc_rsb_std">40</td></tr>
                <tr><td class="gsc_rsb_sc1"><a href="#">i10-index</a></td><td class="gsc_rsb_std">{}</td><td class="gsc_rsb_std">5</td></tr>
              </tbody>
            </table></div></body></html>"##,
            values[0], values[1], values[2]
        )
    }

    #[test]
    fn reads_structured_table() {
        let html = table_page(["1,234", "56", "7"]);
        assert_eq!(extract(&html).unwrap(), Metrics::new(1234, 56, 7));
    }

    #[test]
    fn reads_table_without_header_row() {
        let html = r#"<table id="gsc_rsb_st">
            <tr><td>Citations</td><td>1,234</td></tr>
            <tr><td>h-index</td><td>56</td></tr>
            <tr><td>i10-index</td><td>7</td></tr>
        </table>"#;
        let page = Page::parse(html);
        assert_eq!(from_structured_table(&page), Ok(Metrics::new(1234, 56, 7)));
    }

    #[test]
    fn table_order_is_positional_not_label_based() {
        let html = r#"<table id="gsc_rsb_st">
            <tr><td>i10-index</td><td>1</td></tr>
            <tr><td>Citations</td><td>2</td></tr>
            <tr><td>h-index</td><td>3</td></tr>
        </table>"#;
        assert_eq!(extract(html).unwrap(), Metrics::new(1, 2, 3));
    }

    #[test]
    fn malformed_table_falls_through_to_markers() {
        let html = r#"<html><body>
            <table id="gsc_rsb_st"><tr><td>Citations</td><td>n/a</td></tr>
            <tr><td>h</td><td>1</td></tr><tr><td>i10</td><td>2</td></tr></table>
            <span class="gsc_rsb_std">500</span><span class="gsc_rsb_std">10</span><span class="gsc_rsb_std">3</span>
        </body></html>"#;
        let page = Page::parse(html);
        assert!(matches!(
            from_structured_table(&page),
            Err(Miss::TableMalformed(_))
        ));
        // table cells are not marked, so markers come from the spans
        assert_eq!(extract(html).unwrap(), Metrics::new(500, 10, 3));
    }

    #[test]
    fn reads_class_markers_when_table_missing() {
        let html = r#"<html><body><div>
            <div class="gsc_rsb_std">500</div>
            <div class="gsc_rsb_std">10</div>
            <div class="gsc_rsb_std">3</div>
        </div></body></html>"#;
        let page = Page::parse(html);
        assert_eq!(from_structured_table(&page), Err(Miss::TableAbsent));
        assert_eq!(extract(html).unwrap(), Metrics::new(500, 10, 3));
    }

    #[test]
    fn too_few_markers_is_a_miss() {
        let page = Page::parse(r#"<span class="gsc_rsb_std">1</span>"#);
        assert_eq!(
            from_class_markers(&page),
            Err(Miss::MarkersAbsent { found: 1 })
        );
    }

    #[test]
    fn unparsable_marker_falls_through_to_labels() {
        let html = r#"<html><body>
            <span class="gsc_rsb_std">—</span><span class="gsc_rsb_std">10</span><span class="gsc_rsb_std">3</span>
            <p>Cited by 99</p><p>h-index: 8</p><p>i10-index: 4</p>
        </body></html>"#;
        assert_eq!(extract(html).unwrap(), Metrics::new(99, 8, 4));
    }

    #[test]
    fn challenge_page_is_blocked() {
        let html = r#"<html><body>
            <p>Our systems have detected unusual traffic from your computer network.</p>
            <p>Citations 42 h-index 5 i10-index 2</p>
        </body></html>"#;
        let err = extract(html).unwrap_err();
        assert!(err.is_blocked());
        match err {
            ScholarError::Blocked { excerpt, .. } => {
                assert!(excerpt.contains("unusual traffic from your computer"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn challenge_phrase_inside_script_is_ignored() {
        let html = r#"<html><head><script>window.captchaReady = false;</script></head>
            <body>Citations 42 h-index 5 i10-index 2</body></html>"#;
        assert_eq!(extract(html).unwrap(), Metrics::new(42, 5, 2));
    }

    #[test]
    fn reads_freeform_labels() {
        let html = "Citations 42 h-index 5 i10-index 2";
        assert_eq!(extract(html).unwrap(), Metrics::new(42, 5, 2));
    }

    #[test]
    fn profile_urls_are_not_labels() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://scholar.google.com/citations?user=ab7CDEF&hl=en">
            </head><body>
            <a href="/citations?user=ab7CDEF&view_op=list_works">Profile</a>
            <p>Citations 42 h-index 5 i10-index 2</p>
            </body></html>"#;
        assert_eq!(extract(html).unwrap(), Metrics::new(42, 5, 2));

        let page = Page::parse(r#"<a href="/citations/ab7?x=1">x</a> h-index 5 i10 3"#);
        assert_eq!(
            from_labels(&page),
            Err(Miss::LabelsMissing(vec!["citations"]))
        );
    }

    #[test]
    fn label_synonyms_and_separators() {
        let page = Page::parse("Cited by 12,345\nh index 30\ni10 index 41");
        assert_eq!(from_labels(&page), Ok(Metrics::new(12345, 30, 41)));

        let page = Page::parse("CITATIONS: 7 / H-INDEX: 2 / i10: 1");
        assert_eq!(from_labels(&page), Ok(Metrics::new(7, 2, 1)));
    }

    #[test]
    fn labels_in_raw_markup() {
        let html = r##"<td class="gsc_rsb_sc1"><a href="#">Citations</a></td><td class="gsc_rsb_std">1,500</td>
<td><a>h-index</a></td><td class="x">20</td>
<td><a>i10-index</a></td><td class="x">25</td>"##;
        let page = Page::parse(html);
        assert_eq!(from_labels(&page), Ok(Metrics::new(1500, 20, 25)));
    }

    #[test]
    fn partial_labels_report_what_is_missing() {
        let err = extract("<p>Citations 42</p><p>h-index 5</p>").unwrap_err();
        match err {
            ScholarError::Parse { details, .. } => {
                assert!(details.contains("structured table absent"));
                assert!(details.contains("fallback markers absent"));
                assert!(details.contains("i10-index"));
                assert!(!details.contains("citations,"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_page_is_parse_error() {
        let err = extract("").unwrap_err();
        assert!(matches!(err, ScholarError::Parse { .. }));
        assert!(!err.is_blocked());
    }

    #[test]
    fn extraction_is_deterministic() {
        let html = table_page(["3,210", "12", "15"]);
        let first = extract(&html).unwrap();
        let second = extract(&html).unwrap();
        assert_eq!(first, second);

        let bad = "<p>nothing here</p>";
        assert_eq!(
            extract(bad).unwrap_err().to_string(),
            extract(bad).unwrap_err().to_string()
        );
    }

    #[test]
    fn parse_count_rules() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count(" 56 "), Some(56));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("12a"), None);
        assert_eq!(parse_count("-5"), None);
        assert_eq!(parse_count("1.5"), None);
    }
}
