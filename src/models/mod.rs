//! Wire-level request and response shapes of the multipart upload API.
//!
//! Request bodies are kept as loose JSON so the coordinator can report
//! precise validation errors instead of a generic deserialization failure.

pub mod multipart;
