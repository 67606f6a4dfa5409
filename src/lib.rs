//! Convert bank-exported OFX statements into Quicken-flavored QFX files.
//!
//! ```rust,ignore
//! use ofx2qfx::ConverterBuilder;
//!
//! let conversion = ConverterBuilder::new()
//!     .input("statement.OFX")
//!     .write()?;
//! ```

mod builder;

pub mod app;
pub mod errors;
pub mod ofx;
pub mod traits;

pub use app::{RunOptions, run};
pub use builder::{Conversion, ConverterBuilder};
pub use ofx::prelude::*;
