//! Content Module
//!
//! Section content types, the origin content client and the tiered resolver
//! that sits in front of it.

mod resolver;
mod source;

pub use resolver::ContentResolver;
pub use source::{ContentEnvelope, ContentSource, HttpContentSource, SectionContent};
