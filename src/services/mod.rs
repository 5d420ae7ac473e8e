//! Coordination logic for multipart uploads.

pub mod coordinator;
pub mod rfc2047;
