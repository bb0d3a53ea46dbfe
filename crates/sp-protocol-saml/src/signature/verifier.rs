//! Enveloped XML signature verification.
//!
//! Verifies that a SAML response carries a signature that (a) hashes the
//! element it claims to cover, signature removed, to the declared digest,
//! (b) signs the canonicalized SignedInfo with the configured IdP key, and
//! (c) names the expected issuer when one is configured.
//!
//! Trust comes only from [`SigningMaterial`]: certificates embedded in the
//! inbound document are ignored. A holding signature yields the byte range
//! of the covered element, and only that range is authenticated; `None`
//! means the signature was evaluated and does not hold; `Err(Signature)`
//! means it could not be evaluated at all. The pipeline rejects on both.

use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;
use sp_crypto::{HashAlgorithm, RsaAlgorithm};
use tracing::debug;

use crate::config::SigningMaterial;
use crate::error::{SamlSpError, SpResult};
use crate::parser::first_element_text;
use crate::types::digest_algorithms;

use super::c14n::canonicalize;
use super::{find_element_range, find_local_element_range};

/// Verifies enveloped XML signatures against configured IdP material.
#[derive(Debug)]
pub struct SignatureVerifier {
    /// IdP public key, DER SubjectPublicKeyInfo.
    public_key_spki: Vec<u8>,
    /// Expected response issuer; skipped when not configured.
    expected_issuer: Option<String>,
}

impl SignatureVerifier {
    /// Creates a verifier, extracting the public key from the configured
    /// certificate.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the certificate does not parse. Callers
    /// treat this as fatal at startup.
    pub fn new(material: &SigningMaterial) -> SpResult<Self> {
        use x509_parser::prelude::*;

        let (_, cert) = X509Certificate::from_der(&material.certificate_der).map_err(|e| {
            SamlSpError::Configuration(format!("cannot parse IdP certificate: {e}"))
        })?;

        Ok(Self {
            public_key_spki: cert.public_key().raw.to_vec(),
            expected_issuer: material.idp_entity_id.clone(),
        })
    }

    /// Verifies the enveloped signature in `xml`.
    ///
    /// # Errors
    ///
    /// Returns `Signature` when the signature cannot be evaluated: no
    /// Signature element, unsupported algorithm, missing structure, or
    /// undecodable base64 values.
    pub fn verify(&self, xml: &str) -> SpResult<bool> {
        Ok(self.verified_range(xml)?.is_some())
    }

    /// Verifies the enveloped signature and returns the byte range of the
    /// element it covers, or `None` when the signature does not hold.
    ///
    /// The signature authenticates only the bytes in this range. Callers
    /// that extract data from the document must extract from this range and
    /// nothing else; a document can carry arbitrary unsigned content next
    /// to the one signed element.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::verify`].
    pub fn verified_range(&self, xml: &str) -> SpResult<Option<(usize, usize)>> {
        let (sig_start, sig_end) = find_local_element_range(xml, "Signature")
            .ok_or_else(|| SamlSpError::Signature("no Signature element".to_string()))?;
        let sig = &xml[sig_start..sig_end];

        let algorithm = first_attribute(sig, "SignatureMethod", "Algorithm")?
            .and_then(|uri| RsaAlgorithm::from_xml_dsig_uri(&uri))
            .ok_or_else(|| {
                SamlSpError::Signature("missing or unsupported SignatureMethod".to_string())
            })?;

        let digest_algorithm = first_attribute(sig, "DigestMethod", "Algorithm")?
            .and_then(|uri| digest_hash(&uri))
            .ok_or_else(|| {
                SamlSpError::Signature("missing or unsupported DigestMethod".to_string())
            })?;

        let Some((ref_start, ref_end)) =
            self.digest_matches(xml, (sig_start, sig_end), digest_algorithm)?
        else {
            debug!("reference digest mismatch");
            return Ok(None);
        };

        if !self.signature_matches(sig, algorithm)? {
            debug!("SignedInfo signature mismatch");
            return Ok(None);
        }

        // The issuer cross-check reads the covered bytes only; an issuer
        // outside the signed element proves nothing.
        if !self.issuer_matches(&xml[ref_start..ref_end])? {
            debug!("issuer does not match configured IdP entity ID");
            return Ok(None);
        }

        Ok(Some((ref_start, ref_end)))
    }

    /// Checks the Reference digest: the referenced element, with the
    /// signature spliced out, must hash to the declared DigestValue.
    /// Returns the referenced element's byte range on a match.
    fn digest_matches(
        &self,
        xml: &str,
        (sig_start, sig_end): (usize, usize),
        digest_algorithm: HashAlgorithm,
    ) -> SpResult<Option<(usize, usize)>> {
        let sig = &xml[sig_start..sig_end];

        let reference_uri = first_attribute(sig, "Reference", "URI")?
            .ok_or_else(|| SamlSpError::Signature("no Reference URI".to_string()))?;
        let reference_id = reference_uri.strip_prefix('#').unwrap_or(&reference_uri);

        // An empty URI references the whole document.
        let (ref_start, ref_end) = if reference_id.is_empty() {
            (0, xml.len())
        } else {
            find_element_range(xml, reference_id).ok_or_else(|| {
                SamlSpError::Signature(format!("referenced element '{reference_id}' not found"))
            })?
        };

        // An enveloped signature must sit inside the element it covers;
        // anything else is signing the wrong bytes.
        if sig_start < ref_start || sig_end > ref_end {
            return Err(SamlSpError::Signature(
                "signature is not enveloped in the referenced element".to_string(),
            ));
        }

        let mut referenced = String::with_capacity(ref_end - ref_start);
        referenced.push_str(&xml[ref_start..sig_start]);
        referenced.push_str(&xml[sig_end..ref_end]);

        let canonical = canonicalize(&referenced)?;
        let digest = sp_crypto::hash(digest_algorithm, canonical.as_bytes());
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(&digest);

        let declared = element_text_compact(sig, "DigestValue")?
            .ok_or_else(|| SamlSpError::Signature("no DigestValue".to_string()))?;

        Ok((digest_b64 == declared).then_some((ref_start, ref_end)))
    }

    /// Checks the SignatureValue over the canonicalized SignedInfo.
    fn signature_matches(&self, sig: &str, algorithm: RsaAlgorithm) -> SpResult<bool> {
        let (si_start, si_end) = find_local_element_range(sig, "SignedInfo")
            .ok_or_else(|| SamlSpError::Signature("no SignedInfo element".to_string()))?;
        let canonical_signed_info = canonicalize(&sig[si_start..si_end])?;

        let signature_b64 = element_text_compact(sig, "SignatureValue")?
            .ok_or_else(|| SamlSpError::Signature("no SignatureValue".to_string()))?;
        let signature = base64::engine::general_purpose::STANDARD
            .decode(&signature_b64)
            .map_err(|e| SamlSpError::Signature(format!("invalid SignatureValue: {e}")))?;

        Ok(sp_crypto::rsa_verify(
            &self.public_key_spki,
            canonical_signed_info.as_bytes(),
            &signature,
            algorithm,
        ))
    }

    /// Cross-checks the issuer named inside the signed region against the
    /// configured IdP entity ID, when one is configured.
    fn issuer_matches(&self, signed_region: &str) -> SpResult<bool> {
        let Some(expected) = &self.expected_issuer else {
            debug!("no IdP entity ID configured, skipping issuer cross-check");
            return Ok(true);
        };

        Ok(first_element_text(signed_region, "Issuer")?.as_deref() == Some(expected.as_str()))
    }
}

/// Maps an XML-DSig DigestMethod URI to its hash. SHA-1 is deliberately
/// absent: inbound documents using it fail as unsupported.
fn digest_hash(uri: &str) -> Option<HashAlgorithm> {
    match uri {
        digest_algorithms::SHA256 => Some(HashAlgorithm::Sha256),
        digest_algorithms::SHA384 => Some(HashAlgorithm::Sha384),
        digest_algorithms::SHA512 => Some(HashAlgorithm::Sha512),
        _ => None,
    }
}

/// Returns the named attribute of the first element with the given local
/// name, prefix-agnostic.
fn first_attribute(xml: &str, element: &str, attribute: &str) -> SpResult<Option<String>> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                let local_name = e.local_name();
                if std::str::from_utf8(local_name.as_ref()).unwrap_or("") != element {
                    continue;
                }
                for attr in e.attributes().flatten() {
                    let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
                    if key == attribute {
                        return Ok(Some(attr.unescape_value()?.to_string()));
                    }
                }
                return Ok(None);
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }
}

/// First element text with all whitespace stripped; base64 values inside
/// signatures are commonly line-wrapped.
fn element_text_compact(xml: &str, element: &str) -> SpResult<Option<String>> {
    Ok(first_element_text(xml, element)?
        .map(|text| text.chars().filter(|c| !c.is_whitespace()).collect()))
}
