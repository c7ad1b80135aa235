//! Infrastructure adapters for settings, the content API, highlighting, and the clipboard.

pub mod clipboard;
pub mod config;
pub mod github;
pub mod highlight;
