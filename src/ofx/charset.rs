use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::{Reader, events::Event};
use tracing::warn;

/// How much of the file is scanned for a BOM, an XML declaration or OFX headers
const SNIFF_LEN: usize = 1024;

/// Picks the encoding a statement was written in.
///
/// A byte order mark wins, then the `encoding` of an `<?xml ...?>` declaration,
/// then the OFX 1.x `ENCODING`/`CHARSET` headers. Falls back to UTF-8.
pub fn detect(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_LEN)]);
    xml_declaration_label(&head)
        .or_else(|| ofx_header_label(&head))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}

/// Decodes file bytes, keeping any BOM as a leading `U+FEFF`.
pub fn decode(bytes: &[u8]) -> (String, &'static Encoding) {
    let encoding = detect(bytes);
    let (text, malformed) = encoding.decode_without_bom_handling(bytes);
    if malformed {
        warn!(encoding = encoding.name(), "input has malformed sequences, replaced with U+FFFD");
    }
    (text.into_owned(), encoding)
}

/// Encodes text back into the statement's encoding.
pub fn encode<'a>(text: &'a str, encoding: &'static Encoding) -> Cow<'a, [u8]> {
    let (bytes, used, unmappable) = encoding.encode(text);
    if unmappable {
        warn!(encoding = used.name(), "characters not representable, written as numeric references");
    }
    bytes
}

fn xml_declaration_label(head: &str) -> Option<String> {
    let mut reader = Reader::from_str(head);
    loop {
        match reader.read_event() {
            Ok(Event::Decl(decl)) => {
                return decl
                    .encoding()?
                    .ok()
                    .map(|value| String::from_utf8_lossy(&value).into_owned());
            }
            Ok(Event::Start(_) | Event::Empty(_) | Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn ofx_header_label(head: &str) -> Option<String> {
    let mut charset = None;
    for line in head.lines().take_while(|line| !line.contains('<')) {
        match line.trim().split_once(':') {
            Some(("ENCODING", value)) if value.trim().eq_ignore_ascii_case("UTF-8") => {
                return Some("utf-8".to_string());
            }
            Some(("CHARSET", value)) => charset = Some(value.trim().to_string()),
            _ => {}
        }
    }

    match charset {
        Some(value) if value.eq_ignore_ascii_case("NONE") => None,
        // code page numbers, e.g. CHARSET:1252
        Some(value) if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) => {
            Some(format!("windows-{value}"))
        }
        other => other,
    }
}
