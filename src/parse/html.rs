// src/parse/html.rs
// =============================================================================
// Extracts page content and links from HTML.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM with html5ever (the same algorithm browsers use,
//   so unclosed tags and other broken markup are recovered, never rejected)
// - Supports CSS selectors for finding elements
//
// Rust concepts:
// - LazyLock: selectors are parsed once, on first use, then shared by all
//   workers
// - let-else: skip nodes we don't care about without nesting
// - Iterator adapters: select / find / map instead of manual loops
// =============================================================================

use super::{collapse_whitespace, ParsedPage};
use crate::site::{self, Site};
use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

// Our selectors are constants, so failing to parse them is a programmer error
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static META_NAMED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta[name]").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

// Elements whose text never shows up on screen
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template", "head"];

// Parses one HTML document into the fields we report
//
// Parameters:
//   body: the raw HTML (borrowed, we never modify it)
//   page_url: the final URL of the page, used to resolve relative links
//   site: the crawl boundary; links outside it are dropped
//
// Returns: ParsedPage (missing title or description become empty strings)
pub fn parse_html(body: &str, page_url: &Url, site: &Site) -> ParsedPage {
    let document = Html::parse_document(body);

    ParsedPage {
        title: extract_title(&document),
        text: extract_visible_text(&document),
        meta_description: extract_meta_description(&document),
        links: extract_same_site_links(&document, page_url, site),
    }
}

// First <title> wins; empty string when there is none
fn extract_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        .unwrap_or_default()
}

// Concatenates every text node that is not inside an invisible element
//
// Walks the whole tree once; each text node checks its ancestors, so text
// nested anywhere under <script> or <head> is skipped.
fn extract_visible_text(document: &Html) -> String {
    let root = document.root_element();
    let mut pieces = Vec::new();

    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |element| INVISIBLE.contains(&element.name()))
        });

        if !hidden {
            pieces.push(&**text);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

// <meta name="description" content="...">, matched case-insensitively
fn extract_meta_description(document: &Html) -> String {
    document
        .select(&META_NAMED)
        .find(|meta| {
            meta.value()
                .attr("name")
                .map_or(false, |name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| collapse_whitespace(content))
        .unwrap_or_default()
}

// Resolves every anchor against the page and keeps the same-site ones
//
// Cross-site links are dropped here, so the frontier never needs to know
// where the site boundary is.
fn extract_same_site_links(document: &Html, page_url: &Url, site: &Site) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = site::resolve_link(page_url, href) else {
            continue;
        };
        if !site.contains(&absolute) {
            continue;
        }

        let normalized = site::normalize(&absolute);
        if seen.insert(normalized.as_str().to_string()) {
            links.push(normalized);
        }
    }

    links
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Html::parse_document and not parse_fragment?
//    - parse_document builds the implicit <html>/<head>/<body>, so <title>
//      and <meta> end up in <head> even when the page omits those tags
//
// 2. Why dedup here when the frontier dedups too?
//    - Links keep document order and each page reports a link once; the
//      frontier still decides what was seen across the whole crawl
// -----------------------------------------------------------------------------
