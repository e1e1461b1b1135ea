// src/fetch/detect.rs
// =============================================================================
// Decides how a fetched document should be parsed.
//
// Two tiers:
// 1. The declared Content-Type header, when it names a type we recognize
// 2. Sniffing the first bytes of the body (<?xml, <!doctype html, <html)
//
// Anything we still can't place is treated as HTML, because servers that
// omit or mislabel Content-Type are almost always serving web pages.
// =============================================================================

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Xml,
    /// Binary or otherwise unparseable content (images, PDFs, archives...)
    Other,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Xml => "xml",
            ContentKind::Other => "other",
        }
    }
}

// How many leading bytes sniffing looks at
const SNIFF_LEN: usize = 512;

// Classifies a response from its declared Content-Type alone
//
// Returns None when the header is missing or not decisive, meaning the body
// has to be sniffed.
pub fn declared_kind(content_type: Option<&str>) -> Option<ContentKind> {
    let essence = mime_essence(content_type?)?;

    match essence.as_str() {
        "text/html" | "application/xhtml+xml" => Some(ContentKind::Html),
        "application/xml" | "text/xml" => Some(ContentKind::Xml),
        e if e.ends_with("+xml") => Some(ContentKind::Xml),
        e if is_binary(e) => Some(ContentKind::Other),
        _ => None,
    }
}

// Full detection: header first, body sniffing second, HTML last
pub fn detect(content_type: Option<&str>, body: &str) -> ContentKind {
    declared_kind(content_type).unwrap_or_else(|| sniff(body))
}

// Looks at the start of the body for an XML declaration or an HTML doctype
pub fn sniff(body: &str) -> ContentKind {
    let head: String = body
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(SNIFF_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return ContentKind::Html;
    }
    if head.starts_with("<?xml") {
        // XHTML documents carry an XML declaration too
        if head.contains("<!doctype html") || head.contains("<html") {
            return ContentKind::Html;
        }
        return ContentKind::Xml;
    }

    ContentKind::Html
}

// "Text/HTML; charset=UTF-8" -> "text/html"
fn mime_essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if essence.is_empty() {
        None
    } else {
        Some(essence)
    }
}

fn is_binary(essence: &str) -> bool {
    ["image/", "audio/", "video/", "font/"]
        .iter()
        .any(|prefix| essence.starts_with(prefix))
        || matches!(
            essence,
            "application/pdf" | "application/zip" | "application/gzip" | "application/x-gzip"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_wins_over_body() {
        let body = "<!DOCTYPE html><html><title>x</title></html>";
        assert_eq!(detect(Some("application/xml"), body), ContentKind::Xml);
        assert_eq!(detect(Some("text/xml; charset=utf-8"), body), ContentKind::Xml);
    }

    #[test]
    fn test_declared_html_with_params() {
        assert_eq!(
            declared_kind(Some("Text/HTML; charset=UTF-8")),
            Some(ContentKind::Html)
        );
    }

    #[test]
    fn test_suffix_xml_types() {
        assert_eq!(declared_kind(Some("application/rss+xml")), Some(ContentKind::Xml));
        assert_eq!(declared_kind(Some("application/xhtml+xml")), Some(ContentKind::Html));
    }

    #[test]
    fn test_binary_types_are_other() {
        assert_eq!(declared_kind(Some("image/png")), Some(ContentKind::Other));
        assert_eq!(declared_kind(Some("application/pdf")), Some(ContentKind::Other));
    }

    #[test]
    fn test_sniffs_when_header_missing_or_unknown() {
        let xml = "\u{feff}  <?xml version=\"1.0\"?><urlset></urlset>";
        assert_eq!(detect(None, xml), ContentKind::Xml);
        assert_eq!(detect(Some("text/plain"), xml), ContentKind::Xml);
        assert_eq!(detect(Some(""), "<html><body>hi</body></html>"), ContentKind::Html);
    }

    #[test]
    fn test_xhtml_declaration_sniffs_as_html() {
        let body = "<?xml version=\"1.0\"?>\n<!DOCTYPE html>\n<html></html>";
        assert_eq!(sniff(body), ContentKind::Html);
    }

    #[test]
    fn test_falls_back_to_html() {
        assert_eq!(detect(None, "just some text"), ContentKind::Html);
    }
}
