// src/parse/xml.rs
// Text extraction for XML documents (sitemaps, feeds, data files).

use super::collapse_whitespace;
use quick_xml::events::Event;
use quick_xml::Reader;

// Joins all element text and CDATA sections with single spaces
//
// quick-xml is a streaming reader: on the first syntax error we stop and keep
// whatever was collected up to that point.
pub fn extract_text(body: &str) -> String {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut pieces: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(text)) => match text.unescape() {
                Ok(unescaped) => pieces.push(unescaped.into_owned()),
                Err(_) => pieces.push(String::from_utf8_lossy(&text).into_owned()),
            },
            Ok(Event::CData(data)) => {
                pieces.push(String::from_utf8_lossy(&data.into_inner()).into_owned())
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(phase = "parse", position = reader.error_position(), "XML error: {}", e);
                break;
            }
        }
    }

    collapse_whitespace(&pieces.join(" "))
}
