//! Html section editing and derived-field extraction.
//!
//! A section is a heading element carrying an `id` plus everything up to the
//! next heading of the same or higher rank.

use std::sync::LazyLock;

use regex::Regex;
use scribe_store::{DerivedField, FieldExtractor};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])(\s[^>]*)?>(.*?)</h[1-6]\s*>").unwrap());

static ID_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bid\s*=\s*"([^"]*)""#).unwrap());

static SEO_SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span[^>]*class="[^"]*\bseoSummary\b[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});

static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p\s*>").unwrap());

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static QUICK_LINKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div[^>]*(?:id="Quick_Links"|class="[^"]*\bquick-links\b[^"]*")[^>]*>"#)
        .unwrap()
});

static DIV_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<(/?)div\b[^>]*>").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A heading found in html.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heading {
    /// Rank, 1 through 6.
    pub level: u8,
    /// Value of the `id` attribute, if any.
    pub id: Option<String>,
    /// Heading text with tags removed.
    pub text: String,
    /// Byte offset of the opening tag.
    pub start: usize,
    /// Byte offset just past the closing tag.
    pub end: usize,
}

/// All headings in document order.
#[must_use]
pub fn headings(html: &str) -> Vec<Heading> {
    HEADING_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let level = caps.get(1)?.as_str().parse().ok()?;
            let id = caps
                .get(2)
                .and_then(|attrs| ID_ATTR_RE.captures(attrs.as_str()))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_owned());
            let text = strip_tags(caps.get(3).map_or("", |m| m.as_str()));
            Some(Heading {
                level,
                id,
                text,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn section_bounds(html: &str, section_id: &str) -> Option<(usize, usize)> {
    let all = headings(html);
    let index = all
        .iter()
        .position(|h| h.id.as_deref() == Some(section_id))?;
    let heading = &all[index];
    let end = all[index + 1..]
        .iter()
        .find(|h| h.level <= heading.level)
        .map_or(html.len(), |h| h.start);
    Some((heading.start, end))
}

/// Html of the section whose heading has `id == section_id`, heading included.
#[must_use]
pub fn extract_section<'a>(html: &'a str, section_id: &str) -> Option<&'a str> {
    let (start, end) = section_bounds(html, section_id)?;
    Some(&html[start..end])
}

/// Replace one section, heading included, with `replacement`.
///
/// Returns `None` if no heading carries `section_id`.
#[must_use]
pub fn replace_section(html: &str, section_id: &str, replacement: &str) -> Option<String> {
    let (start, end) = section_bounds(html, section_id)?;
    let mut out = String::with_capacity(html.len() + replacement.len());
    out.push_str(&html[..start]);
    out.push_str(replacement);
    out.push_str(&html[end..]);
    Some(out)
}

/// Remove tags and collapse whitespace.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Anchor for a heading without an `id`.
fn anchor_for(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Summary html: the `seoSummary` span, else the first non-empty paragraph.
#[must_use]
pub fn summary_html(html: &str) -> String {
    if let Some(m) = SEO_SUMMARY_RE.captures(html).and_then(|c| c.get(1)) {
        return m.as_str().trim().to_owned();
    }
    PARAGRAPH_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|inner| !strip_tags(inner).is_empty())
        .unwrap_or_default()
        .to_owned()
}

/// Table of contents over h2 through `h{toc_depth}`.
///
/// Depth 0 (or 1) disables the table.
#[must_use]
pub fn toc_html(html: &str, toc_depth: u8) -> String {
    let items: Vec<String> = headings(html)
        .into_iter()
        .filter(|h| h.level >= 2 && h.level <= toc_depth)
        .map(|h| {
            let anchor = h.id.unwrap_or_else(|| anchor_for(&h.text));
            format!(
                r##"<li class="toc-h{}"><a href="#{anchor}">{}</a></li>"##,
                h.level, h.text
            )
        })
        .collect();
    if items.is_empty() {
        return String::new();
    }
    format!("<ol>{}</ol>", items.concat())
}

/// Byte range of the quick-links block, matching nested `div`s.
fn quick_links_bounds(html: &str) -> Option<(usize, usize)> {
    let open = QUICK_LINKS_RE.find(html)?;
    let mut depth = 1usize;
    for tag in DIV_TAG_RE.captures_iter(&html[open.end()..]) {
        let closing = tag.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                let end = open.end() + tag.get(0)?.end();
                return Some((open.start(), end));
            }
        } else {
            depth += 1;
        }
    }
    Some((open.start(), html.len()))
}

/// The quick-links sidebar block, if present.
#[must_use]
pub fn quick_links_html(html: &str) -> String {
    quick_links_bounds(html)
        .map(|(start, end)| html[start..end].to_owned())
        .unwrap_or_default()
}

/// Document body with the quick-links block removed.
#[must_use]
pub fn body_html(html: &str) -> String {
    match quick_links_bounds(html) {
        Some((start, end)) => format!("{}{}", &html[..start], &html[end..]).trim().to_owned(),
        None => html.trim().to_owned(),
    }
}

/// [`FieldExtractor`] over one html source.
pub struct ContentExtractor<'a> {
    source: &'a str,
    toc_depth: u8,
}

impl<'a> ContentExtractor<'a> {
    /// Extractor for `source` with the given TOC depth.
    #[must_use]
    pub fn new(source: &'a str, toc_depth: u8) -> Self {
        Self { source, toc_depth }
    }
}

impl FieldExtractor for ContentExtractor<'_> {
    fn extract(&self, field: DerivedField) -> String {
        match field {
            DerivedField::SummaryHtml => summary_html(self.source),
            DerivedField::Excerpt => strip_tags(&summary_html(self.source)),
            DerivedField::TocHtml => toc_html(self.source, self.toc_depth),
            DerivedField::BodyHtml => body_html(self.source),
            DerivedField::QuickLinksHtml => quick_links_html(self.source),
        }
    }
}
