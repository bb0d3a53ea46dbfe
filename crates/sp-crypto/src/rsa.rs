//! RSA PKCS#1 v1.5 signing and verification.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair},
};

/// Errors from RSA signing operations.
///
/// Verification deliberately has no error variant of its own: a signature
/// that does not verify is a `false`, not an error, so callers cannot
/// accidentally treat "invalid" and "valid" as two kinds of success.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The private key could not be parsed as PKCS#1 or PKCS#8 DER.
    #[error("invalid RSA key: {0}")]
    InvalidKey(String),

    /// The signing operation itself failed.
    #[error("RSA signing failed: {0}")]
    Signing(String),
}

/// RSA signature algorithms used by SAML XML signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    Rs256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    Rs384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    Rs512,
}

impl RsaAlgorithm {
    /// Returns the JWA algorithm name.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }

    /// Returns the XML-DSig `SignatureMethod` algorithm URI.
    #[must_use]
    pub const fn xml_dsig_uri(self) -> &'static str {
        match self {
            Self::Rs256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::Rs384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::Rs512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }

    /// Returns the XML-DSig `DigestMethod` URI for the paired digest.
    #[must_use]
    pub const fn digest_uri(self) -> &'static str {
        match self {
            Self::Rs256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Rs384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            Self::Rs512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// Returns the digest algorithm paired with this signature algorithm.
    #[must_use]
    pub const fn hash_algorithm(self) -> crate::HashAlgorithm {
        match self {
            Self::Rs256 => crate::HashAlgorithm::Sha256,
            Self::Rs384 => crate::HashAlgorithm::Sha384,
            Self::Rs512 => crate::HashAlgorithm::Sha512,
        }
    }

    /// Looks up the algorithm for an XML-DSig `SignatureMethod` URI.
    #[must_use]
    pub fn from_xml_dsig_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Some(Self::Rs256),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => Some(Self::Rs384),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => Some(Self::Rs512),
            _ => None,
        }
    }
}

/// Signs data with an RSA private key.
///
/// # Arguments
///
/// * `key_der` - RSA private key in DER format (PKCS#1 or PKCS#8)
/// * `data` - Data to sign
/// * `algorithm` - Signature algorithm
///
/// # Errors
///
/// Returns an error if the key is invalid or signing fails.
pub fn rsa_sign(
    key_der: &[u8],
    data: &[u8],
    algorithm: RsaAlgorithm,
) -> Result<Vec<u8>, SignatureError> {
    let key_pair = RsaKeyPair::from_der(key_der)
        .or_else(|_| RsaKeyPair::from_pkcs8(key_der))
        .map_err(|e| SignatureError::InvalidKey(format!("{e}")))?;

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public_modulus_len()];

    let padding = match algorithm {
        RsaAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
        RsaAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
        RsaAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
    };

    key_pair
        .sign(padding, &rng, data, &mut sig)
        .map_err(|e| SignatureError::Signing(format!("{e}")))?;

    Ok(sig)
}

/// Verifies an RSA signature.
///
/// Returns `Ok(false)` for a signature that does not verify; the key
/// format or the bytes being nonsense are indistinguishable from a bad
/// signature at this layer, and all of them mean "reject".
///
/// # Arguments
///
/// * `public_key_der` - RSA public key in DER format (`SubjectPublicKeyInfo`
///   or PKCS#1 `RSAPublicKey`)
/// * `data` - Original data that was signed
/// * `sig` - Signature to verify
/// * `algorithm` - Signature algorithm
#[must_use]
pub fn rsa_verify(public_key_der: &[u8], data: &[u8], sig: &[u8], algorithm: RsaAlgorithm) -> bool {
    use aws_lc_rs::signature::{
        UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA384,
        RSA_PKCS1_2048_8192_SHA512,
    };

    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        RsaAlgorithm::Rs256 => &RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::Rs384 => &RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::Rs512 => &RSA_PKCS1_2048_8192_SHA512,
    };

    let public_key = UnparsedPublicKey::new(verification_alg, public_key_der);

    public_key.verify(data, sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_uris_round_trip() {
        for alg in [RsaAlgorithm::Rs256, RsaAlgorithm::Rs384, RsaAlgorithm::Rs512] {
            assert_eq!(RsaAlgorithm::from_xml_dsig_uri(alg.xml_dsig_uri()), Some(alg));
        }
    }

    #[test]
    fn unknown_uri_is_rejected() {
        assert_eq!(
            RsaAlgorithm::from_xml_dsig_uri("http://www.w3.org/2000/09/xmldsig#rsa-sha1"),
            None
        );
    }

    #[test]
    fn digest_pairing_matches_signature_strength() {
        assert_eq!(RsaAlgorithm::Rs256.hash_algorithm(), crate::HashAlgorithm::Sha256);
        assert_eq!(RsaAlgorithm::Rs384.hash_algorithm(), crate::HashAlgorithm::Sha384);
        assert_eq!(RsaAlgorithm::Rs512.hash_algorithm(), crate::HashAlgorithm::Sha512);
    }

    #[test]
    fn verify_with_garbage_key_is_false() {
        assert!(!rsa_verify(b"not a key", b"data", b"sig", RsaAlgorithm::Rs256));
    }

    #[test]
    fn sign_with_garbage_key_is_invalid_key() {
        let err = rsa_sign(b"not a key", b"data", RsaAlgorithm::Rs256).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidKey(_)));
    }
}
