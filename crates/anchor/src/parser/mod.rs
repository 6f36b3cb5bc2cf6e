//! PDF structure access and content-stream interpretation.

pub mod backend;
pub mod walker;
