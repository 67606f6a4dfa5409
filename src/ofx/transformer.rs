use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::document::{Document, Element};
use crate::errors::{ConvertError, ConvertResult};

pub(crate) const SIGNON: &str = "SIGNONMSGSRSV1";
pub(crate) const SONRS: &str = "SONRS";
pub(crate) const FI: &str = "FI";
pub(crate) const ORG: &str = "ORG";
pub(crate) const FID: &str = "FID";
pub const INTU_BID: &str = "INTU.BID";
pub const INTU_USERID: &str = "INTU.USERID";

/// Institution identity written into the sign-on block of a QFX file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Institution {
    pub org: &'static str,
    pub fid: &'static str,
    /// Value for both `INTU.BID` and `INTU.USERID`
    pub intu_id: &'static str,
}

impl Institution {
    pub const PENTAGON_FEDERAL: Institution = Institution {
        org: "PENTAGON FEDERAL CREDIT UNION",
        fid: "10360",
        intu_id: "10360",
    };
}

impl Default for Institution {
    fn default() -> Self {
        Self::PENTAGON_FEDERAL
    }
}

fn require<'a>(parent: &'a mut Element, name: &str) -> ConvertResult<&'a mut Element> {
    parent
        .child_mut(name)
        .ok_or_else(|| ConvertError::NodeNotFound(name.to_string()))
}

/// Rewrites the sign-on block of a parsed OFX body for Quicken.
///
/// `ORG` and `FID` receive the institution's values and `INTU.BID` and
/// `INTU.USERID` are appended to `SONRS`. Running it again on its own output
/// appends a second pair of `INTU.*` nodes.
pub fn patch(document: &mut Document, institution: &Institution) -> ConvertResult<()> {
    let sonrs = require(require(document.root_mut(), SIGNON)?, SONRS)?;
    let fi = require(&mut *sonrs, FI)?;
    // both fields must exist before either is touched
    if let Some(missing) = [ORG, FID].into_iter().find(|name| fi.child(name).is_none()) {
        return Err(ConvertError::NodeNotFound(missing.to_string()));
    }
    require(fi, ORG)?.set_text(institution.org);
    require(fi, FID)?.set_text(institution.fid);

    sonrs.append_text_element(INTU_BID, institution.intu_id);
    sonrs.append_text_element(INTU_USERID, institution.intu_id);
    debug!(org = institution.org, fid = institution.fid, "patched sign-on block");

    Ok(())
}

/// Parses an OFX XML body, [`patch`]es it and serializes it again.
pub fn transform(xml: &str, institution: &Institution) -> ConvertResult<String> {
    let mut document = Document::parse(xml)?;
    patch(&mut document, institution)?;
    Ok(document.to_string())
}

/// Output path for a converted file: same directory and stem, `.QFX` extension.
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension("QFX")
}
