//! AuthnRequest building and HTTP-POST binding.
//!
//! Builds the SP-initiated leg of web SSO: a fresh AuthnRequest document
//! per call, optionally signed, plus the self-submitting HTML form that
//! carries its base64 encoding to the IdP (POST binding, no compression).

use chrono::{DateTime, Utc};

use crate::codec::encode_base64;
use crate::config::SpIdentity;
use crate::error::SpResult;
use crate::signature::XmlSigner;
use crate::types::AuthnRequest;

/// A built authentication request, ready for encoding.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    /// The serialized AuthnRequest document.
    pub xml: String,

    /// The generated request ID, unique per call.
    pub id: String,

    /// When the request was issued.
    pub issue_instant: DateTime<Utc>,
}

/// Builds SAML authentication requests for this SP.
pub struct RequestBuilder {
    entity_id: String,
    acs_url: String,
    signer: Option<XmlSigner>,
}

impl RequestBuilder {
    /// Creates a builder for the given SP identity.
    #[must_use]
    pub fn new(identity: &SpIdentity) -> Self {
        Self {
            entity_id: identity.entity_id.clone(),
            acs_url: identity.acs_url.clone(),
            signer: None,
        }
    }

    /// Attaches a signer; subsequent requests carry an enveloped
    /// signature, matching the metadata's `AuthnRequestsSigned` claim.
    #[must_use]
    pub fn with_signer(mut self, signer: XmlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Builds a fresh AuthnRequest addressed to `destination`.
    ///
    /// Every call generates a new UUID-backed ID; nothing is persisted, so
    /// a retried login must come back through here.
    ///
    /// # Errors
    ///
    /// Returns `Signature` only when a signer is attached and signing
    /// fails; the unsigned path cannot fail.
    pub fn build(&self, destination: &str) -> SpResult<BuiltRequest> {
        let request = AuthnRequest::new(&self.entity_id, destination, &self.acs_url);
        let mut xml = request.to_xml();

        if let Some(signer) = &self.signer {
            xml = signer.sign(&xml, &request.id)?;
        }

        Ok(BuiltRequest {
            xml,
            id: request.id,
            issue_instant: request.issue_instant,
        })
    }

    /// Builds a request and wraps it in its POST form in one step.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_post_form(&self, destination: &str) -> SpResult<(String, BuiltRequest)> {
        let built = self.build(destination)?;
        let form = to_post_form(destination, &encode_base64(built.xml.as_bytes()));
        Ok((form, built))
    }
}

/// Renders the self-submitting POST form for an encoded request.
///
/// Presentation-layer output, kept here because request building is its
/// only producer. All substituted values are HTML-escaped.
#[must_use]
pub fn to_post_form(idp_url: &str, base64_request: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>SAML POST Binding</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">
        <input type="hidden" name="SAMLRequest" value="{}"/>
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
        html_escape(idp_url),
        html_escape(base64_request),
    )
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_base64;

    fn identity() -> SpIdentity {
        SpIdentity {
            entity_id: "https://sp.example.com".to_string(),
            acs_url: "https://sp.example.com/acs".to_string(),
            slo_url: None,
            certificate_der: Vec::new(),
        }
    }

    #[test]
    fn built_request_carries_identity() {
        let built = RequestBuilder::new(&identity())
            .build("https://idp.example.com/sso")
            .unwrap();

        assert!(built.xml.contains(&format!(r#"ID="{}""#, built.id)));
        assert!(built.xml.contains("<saml:Issuer>https://sp.example.com</saml:Issuer>"));
        assert!(built.xml.contains(r#"Destination="https://idp.example.com/sso""#));
    }

    #[test]
    fn post_form_round_trips_request_xml() {
        let (form, built) = RequestBuilder::new(&identity())
            .build_post_form("https://idp.example.com/sso")
            .unwrap();

        let marker = "name=\"SAMLRequest\" value=\"";
        let start = form.find(marker).unwrap() + marker.len();
        let end = form[start..].find('"').unwrap() + start;

        let decoded = decode_base64(&form[start..end]).unwrap();
        assert_eq!(decoded, built.xml.as_bytes());
    }

    #[test]
    fn post_form_escapes_action_url() {
        let form = to_post_form("https://idp.example.com/sso?a=1&b=2", "AAAA");
        assert!(form.contains("action=\"https://idp.example.com/sso?a=1&amp;b=2\""));
    }

    #[test]
    fn form_auto_submits() {
        let form = to_post_form("https://idp.example.com/sso", "AAAA");
        assert!(form.contains("document.forms[0].submit()"));
        assert!(form.contains("method=\"post\""));
    }
}
