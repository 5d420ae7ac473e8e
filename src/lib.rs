//! Companion service for client-driven S3 multipart uploads.
//!
//! Clients ask this service to open a multipart session, to presign each
//! part upload, to list what the store has received, and finally to
//! complete or abort the session. Part bytes go straight from the client to
//! the object store.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
