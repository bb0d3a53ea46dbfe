//! Enveloped XML signature creation.
//!
//! Signs a SAML document by inserting a `<ds:Signature>` element into the
//! referenced element, after its Issuer child when one is present. Used
//! for outbound AuthnRequests (SP metadata declares
//! `AuthnRequestsSigned="true"`) and for building signed documents in
//! tests.

use base64::Engine;

use crate::config::pem_to_der;
use crate::error::{SamlSpError, SpResult};
use crate::types::{canonicalization_algorithms, transforms, XMLDSIG_NS};

use super::c14n::canonicalize;
use super::{find_element_range, find_local_close_end, SignatureConfig};

/// XML document signer.
pub struct XmlSigner {
    /// RSA private key, DER (PKCS#1 or PKCS#8).
    private_key_der: Vec<u8>,
    /// Signer certificate, DER, embedded in KeyInfo when configured.
    certificate_der: Option<Vec<u8>>,
    config: SignatureConfig,
}

impl XmlSigner {
    /// Creates a signer from DER key material.
    #[must_use]
    pub fn new(private_key_der: Vec<u8>, certificate_der: Option<Vec<u8>>) -> Self {
        Self {
            private_key_der,
            certificate_der,
            config: SignatureConfig::default(),
        }
    }

    /// Creates a signer from PEM-encoded key and certificate.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if either PEM body cannot be decoded.
    pub fn from_pem(private_key_pem: &str, certificate_pem: Option<&str>) -> SpResult<Self> {
        let private_key_der = pem_to_der(private_key_pem)?;
        let certificate_der = certificate_pem.map(pem_to_der).transpose()?;
        Ok(Self::new(private_key_der, certificate_der))
    }

    /// Sets the signature configuration.
    #[must_use]
    pub fn with_config(mut self, config: SignatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Signs the element carrying `ID="{reference_id}"` and returns the
    /// document with the signature inserted.
    ///
    /// The digest is computed over the canonicalized element as it stands,
    /// so the element must not already contain a signature.
    ///
    /// # Errors
    ///
    /// Returns `Signature` if the referenced element is missing or the key
    /// cannot sign.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SpResult<String> {
        let (start, end) = find_element_range(xml, reference_id).ok_or_else(|| {
            SamlSpError::Signature(format!("element with ID '{reference_id}' not found"))
        })?;
        let element = &xml[start..end];

        let canonical = canonicalize(element)?;
        let digest = sp_crypto::hash(
            self.config.algorithm.hash_algorithm(),
            canonical.as_bytes(),
        );
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(&digest);

        let signed_info = build_signed_info(reference_id, &digest_b64, &self.config);
        let canonical_signed_info = canonicalize(&signed_info)?;

        let signature = sp_crypto::rsa_sign(
            &self.private_key_der,
            canonical_signed_info.as_bytes(),
            self.config.algorithm,
        )
        .map_err(|e| SamlSpError::Signature(e.to_string()))?;
        let signature_b64 = base64::engine::general_purpose::STANDARD.encode(&signature);

        let signature_element = self.build_signature_element(&signed_info, &signature_b64);

        let insert_at = insert_position(xml, start, end)?;
        Ok(format!(
            "{}{}{}",
            &xml[..insert_at],
            signature_element,
            &xml[insert_at..]
        ))
    }

    fn build_signature_element(&self, signed_info: &str, signature_b64: &str) -> String {
        let key_info = match (&self.certificate_der, self.config.include_certificate) {
            (Some(cert), true) => {
                let cert_b64 = base64::engine::general_purpose::STANDARD.encode(cert);
                format!(
                    "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert_b64}\
                     </ds:X509Certificate></ds:X509Data></ds:KeyInfo>"
                )
            }
            _ => String::new(),
        };

        format!(
            "<ds:Signature xmlns:ds=\"{XMLDSIG_NS}\">{signed_info}\
             <ds:SignatureValue>{signature_b64}</ds:SignatureValue>{key_info}</ds:Signature>"
        )
    }
}

/// Builds the SignedInfo element text that is both inserted into the
/// document and (canonicalized) signed. Verification extracts this exact
/// text back out, so the two sides hash identical octets.
fn build_signed_info(reference_id: &str, digest_b64: &str, config: &SignatureConfig) -> String {
    let c14n = canonicalization_algorithms::EXCLUSIVE_C14N;
    format!(
        "<ds:SignedInfo xmlns:ds=\"{XMLDSIG_NS}\">\
         <ds:CanonicalizationMethod Algorithm=\"{c14n}\"/>\
         <ds:SignatureMethod Algorithm=\"{sig_alg}\"/>\
         <ds:Reference URI=\"#{reference_id}\">\
         <ds:Transforms>\
         <ds:Transform Algorithm=\"{enveloped}\"/>\
         <ds:Transform Algorithm=\"{c14n}\"/>\
         </ds:Transforms>\
         <ds:DigestMethod Algorithm=\"{digest_alg}\"/>\
         <ds:DigestValue>{digest_b64}</ds:DigestValue>\
         </ds:Reference>\
         </ds:SignedInfo>",
        sig_alg = config.algorithm.xml_dsig_uri(),
        enveloped = transforms::ENVELOPED_SIGNATURE,
        digest_alg = config.algorithm.digest_uri(),
    )
}

/// Picks the insertion point for the signature: after the referenced
/// element's Issuer child if it has one, otherwise directly after its open
/// tag. SAML schema ordering puts ds:Signature after saml:Issuer.
fn insert_position(xml: &str, element_start: usize, element_end: usize) -> SpResult<usize> {
    let element = &xml[element_start..element_end];

    if let Some(offset) = find_local_close_end(element, "Issuer") {
        return Ok(element_start + offset);
    }

    element[..element.len().saturating_sub(1)]
        .find('>')
        .map(|i| element_start + i + 1)
        .ok_or_else(|| SamlSpError::Signature("referenced element has no open tag".to_string()))
}
