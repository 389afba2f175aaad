//! Share Links - specification text carried in a URL
//!
//! The text travels verbatim in the `spec` query parameter. Whatever comes
//! back out is used as editor input as-is, parseable or not.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::example::example_spec_text;

/// Query parameter holding the specification text
pub const SPEC_PARAM: &str = "spec";

/// Everything outside the RFC 3986 unreserved set gets encoded
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum ShareLinkError {
    #[error("Invalid origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Origin {0:?} cannot carry a query string")]
    CannotBeABase(String),
}

/// Build `origin?spec=<text>` with the text percent-encoded
pub fn encode_to_shareable_url(origin: &str, text: &str) -> Result<String, ShareLinkError> {
    let mut url = Url::parse(origin).map_err(|source| ShareLinkError::InvalidOrigin {
        origin: origin.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ShareLinkError::CannotBeABase(origin.to_string()));
    }

    let query = format!("{}={}", SPEC_PARAM, utf8_percent_encode(text, QUERY_VALUE));
    url.set_query(Some(&query));
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Read the `spec` parameter from a full URL or a query string.
///
/// Returns `None` only when the parameter is absent; an empty value is
/// returned as an empty string.
pub fn decode_from_location(location: &str) -> Option<String> {
    let query = query_of(location);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == SPEC_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Startup text: the shared specification, or the bundled example
pub fn initial_input_text(location: Option<&str>) -> String {
    location
        .and_then(decode_from_location)
        .unwrap_or_else(example_spec_text)
}

fn query_of(location: &str) -> String {
    if let Some(query) = location.strip_prefix('?') {
        return query.to_string();
    }
    match Url::parse(location) {
        Ok(url) if !url.cannot_be_a_base() => url.query().unwrap_or_default().to_string(),
        _ => location.to_string(),
    }
}
