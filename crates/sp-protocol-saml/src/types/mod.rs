//! SAML 2.0 types and data structures.
//!
//! Core types shared across the SP toolkit: protocol constants, the
//! outbound authentication request, and the parsed assertion record.

mod authn_request;
mod constants;
mod record;

pub use authn_request::*;
pub use constants::*;
pub use record::*;

/// Escapes text for use in XML attribute values and element content.
pub(crate) fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
