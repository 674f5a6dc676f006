//! `emlexport` — export a mailbox folder tree to standalone `.eml` files.
//!
//! Each message becomes one RFC 5322/MIME file named after its subject,
//! with its attachments embedded and copied next to it. Attachments with
//! opaque or missing names are identified from their content and renamed.

pub mod config;
pub mod error;
pub mod export;
pub mod mime;
pub mod model;
pub mod naming;
pub mod source;
