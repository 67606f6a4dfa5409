use serde::Serialize;

use super::{
    document::{Document, Element},
    transformer::{FI, FID, INTU_BID, ORG, SIGNON, SONRS},
};

/// Sign-on details of a statement, for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignOnSummary {
    pub org: Option<String>,
    pub fid: Option<String>,
    /// Raw `DTSERVER` value
    pub server_time: Option<String>,
    pub language: Option<String>,
    /// Number of `INTU.BID` nodes under `SONRS`; above one means the input was
    /// already converted once
    pub intu_bids: usize,
}

fn text_of(parent: Option<&Element>, name: &str) -> Option<String> {
    parent.and_then(|p| p.child(name)).and_then(Element::text)
}

impl SignOnSummary {
    pub fn from_document(document: &Document) -> Self {
        let sonrs = document.root().child(SIGNON).and_then(|s| s.child(SONRS));
        let fi = sonrs.and_then(|s| s.child(FI));

        Self {
            org: text_of(fi, ORG),
            fid: text_of(fi, FID),
            server_time: text_of(sonrs, "DTSERVER"),
            language: text_of(sonrs, "LANGUAGE"),
            intu_bids: sonrs.map_or(0, |s| s.children_named(INTU_BID).count()),
        }
    }
}
