//! SAML AuthnRequest type.
//!
//! Authentication request message sent by the service provider to the
//! identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{xml_escape, SAMLP_NS, SAML_NS};

/// SAML Authentication Request.
///
/// Transient document: built, serialized, encoded, and discarded. Nothing
/// here is persisted; retrying a login means building a fresh request with
/// a fresh ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    ///
    /// XML IDs may not start with a digit, so the UUID is prefixed. The
    /// UUID makes collisions between concurrent requests a non-concern.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    pub issuer: String,

    /// The IdP single sign-on URL this request is addressed to.
    pub destination: String,

    /// The SP endpoint where the response should be posted.
    pub assertion_consumer_service_url: String,
}

impl AuthnRequest {
    /// Creates a new authentication request with a fresh unique ID.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        destination: impl Into<String>,
        acs_url: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            version: "2.0".to_string(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: destination.into(),
            assertion_consumer_service_url: acs_url.into(),
        }
    }

    /// Serializes this request as a SAML protocol XML document.
    ///
    /// `IssueInstant` is rendered in UTC with microsecond precision and a
    /// `Z` suffix.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let instant = self.issue_instant.format("%Y-%m-%dT%H:%M:%S%.6fZ");

        format!(
            concat!(
                r#"<samlp:AuthnRequest xmlns:samlp="{samlp}" xmlns:saml="{saml}" "#,
                r#"ID="{id}" Version="{version}" IssueInstant="{instant}" "#,
                r#"Destination="{destination}" "#,
                r#"AssertionConsumerServiceURL="{acs}">"#,
                "<saml:Issuer>{issuer}</saml:Issuer>",
                "</samlp:AuthnRequest>"
            ),
            samlp = SAMLP_NS,
            saml = SAML_NS,
            id = xml_escape(&self.id),
            version = xml_escape(&self.version),
            instant = instant,
            destination = xml_escape(&self.destination),
            acs = xml_escape(&self.assertion_consumer_service_url),
            issuer = xml_escape(&self.issuer),
        )
    }
}
