//! RFC 2047 "encoded-word" helpers for object metadata.
//!
//! S3 carries user metadata as `x-amz-meta-*` headers, which only accept
//! ASCII. Anything else is wrapped as `=?UTF-8?B?<base64>?=`.

use base64::{Engine as _, engine::general_purpose};
use std::borrow::Cow;

const PREFIX: &str = "=?UTF-8?B?";
const SUFFIX: &str = "?=";

/// Encode a metadata value for a header-like channel. ASCII passes through.
pub fn encode_header_value(value: &str) -> Cow<'_, str> {
    if value.is_ascii() {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!(
            "{PREFIX}{}{SUFFIX}",
            general_purpose::STANDARD.encode(value.as_bytes())
        ))
    }
}

/// Decode a single UTF-8/base64 encoded-word. Returns `None` for anything else.
pub fn decode_header_value(value: &str) -> Option<String> {
    let payload = value
        .get(..PREFIX.len())
        .filter(|p| p.eq_ignore_ascii_case(PREFIX))
        .and_then(|_| value[PREFIX.len()..].strip_suffix(SUFFIX))?;
    let bytes = general_purpose::STANDARD.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
}
