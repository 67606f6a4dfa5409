pub mod charset;
pub mod document;
pub mod splitter;
pub mod summary;
pub mod transformer;

pub mod prelude {
    pub use super::document::{Document, Element, Node};
    pub use super::splitter::{OfxParts, OfxSource, read_ofx_file, split};
    pub use super::summary::SignOnSummary;
    pub use super::transformer::{Institution, output_path, patch, transform};
}
