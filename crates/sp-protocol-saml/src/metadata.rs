//! SP metadata document generation.
//!
//! Renders the EntityDescriptor this SP publishes to IdPs: entity ID,
//! signing certificate, one AssertionConsumerService (index 0, HTTP-POST)
//! and, when configured, a SingleLogoutService (HTTP-Redirect). Pure
//! template substitution over startup configuration; serve with
//! `application/xml`.

use crate::codec::encode_base64;
use crate::config::SpIdentity;
use crate::types::{xml_escape, SamlBinding, MD_NS, XMLDSIG_NS};

/// Builds the SP metadata document.
pub struct MetadataBuilder {
    identity: SpIdentity,
}

impl MetadataBuilder {
    /// Creates a builder over the SP identity.
    #[must_use]
    pub fn new(identity: SpIdentity) -> Self {
        Self { identity }
    }

    /// Renders the metadata XML.
    ///
    /// The SingleLogoutService element is omitted entirely when no SLO URL
    /// is configured; an empty Location is never emitted.
    #[must_use]
    pub fn build(&self) -> String {
        let certificate_b64 = encode_base64(&self.identity.certificate_der);

        let slo_service = self
            .identity
            .slo_url
            .as_deref()
            .map(|url| {
                format!(
                    "\n        <md:SingleLogoutService Binding=\"{}\" Location=\"{}\"/>",
                    SamlBinding::HttpRedirect.uri(),
                    xml_escape(url),
                )
            })
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="{md}" entityID="{entity_id}">
    <md:SPSSODescriptor AuthnRequestsSigned="true" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="{ds}">
                <ds:X509Data>
                    <ds:X509Certificate>{certificate}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>{slo}
        <md:AssertionConsumerService Binding="{acs_binding}" Location="{acs}" index="0" isDefault="true"/>
    </md:SPSSODescriptor>
</md:EntityDescriptor>"#,
            md = MD_NS,
            ds = XMLDSIG_NS,
            entity_id = xml_escape(&self.identity.entity_id),
            certificate = certificate_b64,
            slo = slo_service,
            acs_binding = SamlBinding::HttpPost.uri(),
            acs = xml_escape(&self.identity.acs_url),
        )
    }
}
