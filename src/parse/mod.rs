// src/parse/mod.rs
// =============================================================================
// Turns a fetched body into the fields we keep for a page.
//
// HTML and XML follow different rules on purpose:
// - HTML: title, visible text, meta description and same-site links
// - XML: text only. There is no title, no meta tag and no anchor semantics,
//   so nothing is followed from an XML document.
//
// Parsing never fails. Broken markup yields whatever could be recovered.
// =============================================================================

mod html;
mod xml;

use crate::fetch::ContentKind;
use crate::site::Site;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    pub text: String,
    pub meta_description: String,
    /// Normalized, same-site, in document order, no duplicates
    pub links: Vec<Url>,
}

pub fn parse(body: &str, kind: ContentKind, page_url: &Url, site: &Site) -> ParsedPage {
    match kind {
        ContentKind::Html => html::parse_html(body, page_url, site),
        ContentKind::Xml => ParsedPage {
            text: xml::extract_text(body),
            ..ParsedPage::default()
        },
        ContentKind::Other => ParsedPage::default(),
    }
}

// Collapses every run of whitespace to one space and trims the ends
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
