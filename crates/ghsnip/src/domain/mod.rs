//! Core types shared by the parsing, fetching, and rendering layers.

pub mod errors;
pub mod model;
