//! MIME output: content sniffing, header encoding, message assembly, and rendering.

pub mod assemble;
pub mod header;
pub mod render;
pub mod sniff;
