//! End-to-end SSO response processing.
//!
//! One call from the raw posted form field to an accepted assertion:
//! decode, inflate, parse, verify. Stages run strictly in order and the
//! first failure halts the pipeline; no partial result ever reaches the
//! caller. Everything here is synchronous and stateless, so one pipeline
//! can serve concurrent requests without locking.

use tracing::{debug, warn};

use crate::codec::{decode_base64, inflate_raw};
use crate::config::SigningMaterial;
use crate::error::{FailureCategory, SamlSpError, SpResult};
use crate::parser::AssertionParser;
use crate::signature::SignatureVerifier;
use crate::types::AssertionRecord;

/// Hard cap on the encoded form field, applied before base64 decoding.
/// Complements the decompression cap in [`crate::codec`].
pub const MAX_ENCODED_SIZE: usize = 512 * 1024;

/// The stage a response was in when it was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Input acceptance, before any decoding.
    Received,
    /// Base64 decoding.
    Decoded,
    /// Raw-DEFLATE decompression.
    Decompressed,
    /// XML parsing and assertion extraction.
    Parsed,
    /// Signature verification.
    SignatureChecked,
}

impl PipelineStage {
    /// Stage name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::Decompressed => "decompressed",
            Self::Parsed => "parsed",
            Self::SignatureChecked => "signature_checked",
        }
    }
}

/// Terminal outcome of processing one response.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The response decoded, parsed, and verified.
    Accepted {
        /// The assertion data, extracted from the signature-covered
        /// element only. Unsigned content elsewhere in the document never
        /// reaches this record.
        record: AssertionRecord,
        /// Whether the signature verified. Always true for `Accepted`;
        /// carried so callers need not re-derive it from the variant.
        signature_valid: bool,
    },

    /// The response failed; nothing extracted from it is exposed.
    /// A rejected login is terminal for this response, retry means a
    /// fresh AuthnRequest.
    Rejected {
        /// The stage that failed.
        stage: PipelineStage,
        /// What went wrong.
        error: SamlSpError,
    },
}

impl PipelineOutcome {
    /// Whether the response was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// The failure category to surface at the HTTP boundary, `None` when
    /// accepted.
    #[must_use]
    pub const fn failure_category(&self) -> Option<FailureCategory> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { error, .. } => Some(error.category()),
        }
    }
}

/// Processes inbound SAML responses.
pub struct SsoPipeline {
    parser: AssertionParser,
    verifier: SignatureVerifier,
}

impl SsoPipeline {
    /// Creates a pipeline verifying against the given IdP material.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the IdP certificate does not parse;
    /// fatal at startup.
    pub fn new(material: &SigningMaterial) -> SpResult<Self> {
        Ok(Self {
            parser: AssertionParser::new(),
            verifier: SignatureVerifier::new(material)?,
        })
    }

    /// Processes one posted `SAMLResponse` form field value.
    ///
    /// The input is the base64-encoded, raw-DEFLATE-compressed response
    /// document. Returns a terminal outcome; this never panics on
    /// attacker-controlled input.
    pub fn process(&self, encoded: &str) -> PipelineOutcome {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return self.reject(PipelineStage::Received, SamlSpError::MissingInput);
        }
        if encoded.len() > MAX_ENCODED_SIZE {
            return self.reject(
                PipelineStage::Received,
                SamlSpError::Decode(format!(
                    "encoded payload exceeds {MAX_ENCODED_SIZE} byte limit"
                )),
            );
        }

        let compressed = match decode_base64(encoded) {
            Ok(bytes) => bytes,
            Err(error) => return self.reject(PipelineStage::Decoded, error),
        };
        debug!(encoded_len = encoded.len(), decoded_len = compressed.len(), "response decoded");

        let inflated = match inflate_raw(&compressed) {
            Ok(bytes) => bytes,
            Err(error) => return self.reject(PipelineStage::Decompressed, error),
        };
        debug!(inflated_len = inflated.len(), "response decompressed");

        let xml = match String::from_utf8(inflated) {
            Ok(xml) => xml,
            Err(e) => {
                return self.reject(
                    PipelineStage::Parsed,
                    SamlSpError::MalformedXml(format!("response is not valid UTF-8: {e}")),
                );
            }
        };

        // Structural gate over the whole document. The record handed to
        // the caller is re-extracted below from the signature-covered
        // bytes; this one is discarded.
        let document_record = match self.parser.parse(&xml) {
            Ok(record) => record,
            Err(error) => return self.reject(PipelineStage::Parsed, error),
        };
        debug!(
            has_issuer = document_record.issuer.is_some(),
            has_subject = document_record.subject.is_some(),
            attributes = document_record.attributes.len(),
            "response parsed"
        );

        match self.verifier.verified_range(&xml) {
            Ok(Some((start, end))) => match self.parser.parse(&xml[start..end]) {
                Ok(record) => {
                    debug!("signature verified");
                    PipelineOutcome::Accepted {
                        record,
                        signature_valid: true,
                    }
                }
                Err(error) => self.reject(PipelineStage::SignatureChecked, error),
            },
            Ok(None) => self.reject(
                PipelineStage::SignatureChecked,
                SamlSpError::Signature("signature did not verify".to_string()),
            ),
            Err(error) => self.reject(PipelineStage::SignatureChecked, error),
        }
    }

    fn reject(&self, stage: PipelineStage, error: SamlSpError) -> PipelineOutcome {
        // Error kind and stage only; assertion contents stay out of logs
        // above debug level.
        warn!(stage = stage.name(), kind = error.kind(), "SAML response rejected");
        PipelineOutcome::Rejected { stage, error }
    }
}
