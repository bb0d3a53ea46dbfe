//! SAML SP error types.
//!
//! Provides the closed error taxonomy for the response pipeline plus the
//! coarse failure categories the HTTP boundary is allowed to see.

use thiserror::Error;

/// Result type for SAML SP operations.
pub type SpResult<T> = Result<T, SamlSpError>;

/// SAML SP processing errors.
///
/// This enum is deliberately closed: every failure the pipeline can produce
/// is one of these kinds, so callers can match exhaustively and the HTTP
/// boundary can map them without a catch-all string bucket.
#[derive(Debug, Error)]
pub enum SamlSpError {
    /// The response form field was missing or empty.
    #[error("missing SAML response input")]
    MissingInput,

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Decode(String),

    /// DEFLATE decompression failed or exceeded the output cap.
    #[error("deflate error: {0}")]
    Decompress(String),

    /// The payload is not well-formed XML.
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    /// Well-formed XML missing required SAML structure.
    #[error("malformed assertion: {0}")]
    MalformedAssertion(String),

    /// The signature could not be evaluated.
    ///
    /// A signature that evaluates cleanly but does not verify is not an
    /// error; the verifier reports that as `false`.
    #[error("signature error: {0}")]
    Signature(String),

    /// Invalid or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse failure category exposed to the HTTP caller.
///
/// The caller never sees the inner error text, only whether the request
/// itself was bad or the SP is misconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The peer sent something unprocessable; correctable client-side.
    BadRequest,
    /// The SP itself is broken; operator-investigable.
    Internal,
}

impl SamlSpError {
    /// Returns the failure category for this error.
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::MissingInput
            | Self::Decode(_)
            | Self::Decompress(_)
            | Self::MalformedXml(_)
            | Self::MalformedAssertion(_)
            | Self::Signature(_) => FailureCategory::BadRequest,
            Self::Configuration(_) => FailureCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.category() {
            FailureCategory::BadRequest => 400,
            FailureCategory::Internal => 500,
        }
    }

    /// Short machine-readable kind, safe to log and surface in metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingInput => "missing_input",
            Self::Decode(_) => "decode",
            Self::Decompress(_) => "decompress",
            Self::MalformedXml(_) => "malformed_xml",
            Self::MalformedAssertion(_) => "malformed_assertion",
            Self::Signature(_) => "signature",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<base64::DecodeError> for SamlSpError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlSpError {
    fn from(err: std::io::Error) -> Self {
        Self::Decompress(err.to_string())
    }
}

impl From<quick_xml::Error> for SamlSpError {
    fn from(err: quick_xml::Error) -> Self {
        Self::MalformedXml(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_are_bad_requests() {
        let err = SamlSpError::Decode("bad padding".to_string());
        assert_eq!(err.category(), FailureCategory::BadRequest);
        assert_eq!(err.http_status(), 400);

        let err = SamlSpError::Signature("no signature element".to_string());
        assert_eq!(err.category(), FailureCategory::BadRequest);
    }

    #[test]
    fn configuration_errors_are_internal() {
        let err = SamlSpError::Configuration("missing SP_ENTITY_ID".to_string());
        assert_eq!(err.category(), FailureCategory::Internal);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn base64_errors_convert_to_decode() {
        use base64::Engine;
        let err = base64::engine::general_purpose::STANDARD
            .decode("!!!not base64!!!")
            .unwrap_err();
        let err: SamlSpError = err.into();
        assert!(matches!(err, SamlSpError::Decode(_)));
        assert_eq!(err.kind(), "decode");
    }
}
