//! Signature attestation stamping for PDF documents
//!
//! Overlays a visible "Digitally signed by ..." note on the first page
//! of a document and returns a new byte buffer. The input is never
//! mutated; callers keep the original for fallback.

pub mod error;
pub mod stamp;

pub use error::StampError;
pub use stamp::{stamp_attestation, Attestation};
