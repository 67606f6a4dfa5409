use std::{fs, path::Path};

use encoding_rs::Encoding;
use tracing::debug;

use super::{charset, document::BOM};
use crate::errors::{ConvertError, ConvertResult};

/// An OFX file separated into its header lines and its XML body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfxParts {
    /// Lines without markup (`OFXHEADER:100`, blank lines, ...), kept verbatim
    pub header: String,
    /// Lines carrying both `<` and `>`, joined back together
    pub xml: String,
}

impl OfxParts {
    /// Header followed by the given XML body, in output order
    pub fn assemble(&self, xml: &str) -> String {
        let mut out = String::with_capacity(self.header.len() + xml.len());
        out.push_str(&self.header);
        out.push_str(xml);
        out
    }
}

fn is_markup(line: &str) -> bool {
    line.contains('<') && line.contains('>')
}

/// A statement read from disk, with the encoding it was written in
#[derive(Debug, Clone)]
pub struct OfxSource {
    pub parts: OfxParts,
    pub encoding: &'static Encoding,
}

/// Splits file contents line by line into header and XML blocks.
///
/// Each block keeps the newline after every line except its last one. A
/// leading byte order mark stays at the front of the header.
pub fn split(content: &str) -> OfxParts {
    let mut parts = OfxParts::default();
    let (bom, content) = match content.strip_prefix(BOM) {
        Some(rest) => (true, rest),
        None => (false, content),
    };

    for line in content.split('\n') {
        let block = if is_markup(line) {
            &mut parts.xml
        } else {
            &mut parts.header
        };
        block.push_str(line);
        block.push('\n');
    }

    parts.header.pop();
    parts.xml.pop();
    if bom {
        parts.header.insert(0, BOM);
    }
    parts
}

/// Reads an OFX file from disk, decodes it and splits it.
pub fn read_ofx_file(path: &Path) -> ConvertResult<OfxSource> {
    let bytes = fs::read(path).map_err(|e| ConvertError::read(path, e))?;
    let (content, encoding) = charset::decode(&bytes);

    let parts = split(&content.replace("\r\n", "\n"));
    debug!(
        path = %path.display(),
        encoding = encoding.name(),
        header_bytes = parts.header.len(),
        xml_bytes = parts.xml.len(),
        "split OFX file"
    );
    Ok(OfxSource { parts, encoding })
}
