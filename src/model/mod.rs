//! Core data model types: MIME parts, attachments and header templates.

pub mod attachment;
pub mod header;
