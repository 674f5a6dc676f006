//! Core data model: source messages, mailboxes, and normalized attachments.

pub mod address;
pub mod attachment;
pub mod message;
