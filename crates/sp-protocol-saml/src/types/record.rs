//! Parsed assertion record.

use serde::{Deserialize, Serialize};

/// The identity data extracted from a SAML Response.
///
/// Immutable once constructed. Carries no trust by itself: every field is
/// attacker-controlled text until the enclosing response passes signature
/// verification, which is tracked separately by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    /// Identity of the asserting party, if an Issuer element was present.
    pub issuer: Option<String>,

    /// The subject NameID value, if present.
    pub subject: Option<String>,

    /// SessionIndex from the first AuthnStatement, if present.
    pub session_index: Option<String>,

    /// AuthnInstant from the first AuthnStatement, if present.
    ///
    /// Kept as the raw ISO-8601 string; this SP does not reparse or
    /// validate it.
    pub authn_instant: Option<String>,

    /// Attribute name/value pairs in document order.
    ///
    /// Names may repeat; each pair carries the first AttributeValue of its
    /// Attribute element.
    pub attributes: Vec<(String, String)>,
}

impl AssertionRecord {
    /// Returns the first value for the named attribute, if any.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
