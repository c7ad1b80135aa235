//! Application layer: parsing, line selection, rendering, and document processing.

pub mod document;
pub mod language;
pub mod lines;
pub mod reference;
pub mod render;
pub mod snippet;
