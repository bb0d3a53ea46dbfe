//! # sp-crypto
//!
//! Cryptographic primitives for the SAML service-provider toolkit,
//! backed by aws-lc-rs.
//!
//! SAML 2.0 XML signatures in the wild are overwhelmingly RSA PKCS#1 v1.5
//! over SHA-2, so that is what this crate provides: SHA-256/384/512
//! digests and RSA sign/verify with the matching XML-DSig URIs. Key
//! generation and certificate handling live with the caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod hash;
pub mod rsa;

pub use hash::{hash, sha256, sha384, sha512, HashAlgorithm};
pub use rsa::{rsa_sign, rsa_verify, RsaAlgorithm, SignatureError};
