//! SAML 2.0 Web Browser SSO, service-provider side.
//!
//! This crate implements the SP half of the SAML 2.0 web SSO profile:
//!
//! - **AuthnRequest construction** - Build requests and their HTTP-POST form
//! - **Response decoding** - Base64 and raw-DEFLATE codec with hard size caps
//! - **Assertion parsing** - Extract subject, session and attributes from XML
//! - **XML signature** - Verify (and produce) enveloped XML-DSig signatures
//! - **SP metadata** - Generate the EntityDescriptor document for IdP exchange
//! - **SSO pipeline** - One call from raw POST body to accepted assertion
//!
//! # Architecture
//!
//! - [`types`] - Core SAML types and data structures
//! - [`codec`] - Base64 and DEFLATE transport encodings
//! - [`parser`] - Response/Assertion XML extraction
//! - [`signature`] - XML signature signing and verification
//! - [`request`] - AuthnRequest building and POST binding
//! - [`metadata`] - SP metadata document
//! - [`config`] - SP identity and IdP trust configuration
//! - [`pipeline`] - End-to-end response processing
//! - [`error`] - Error types for SAML operations
//!
//! The HTTP layer around this crate stays thin: it passes the posted
//! `SAMLResponse` form field to [`pipeline::SsoPipeline::process`] and maps
//! the outcome onto its own response types.
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod metadata;
pub mod parser;
pub mod pipeline;
pub mod request;
pub mod signature;
pub mod types;

pub use config::{SigningMaterial, SpConfig, SpIdentity};
pub use error::{FailureCategory, SamlSpError, SpResult};
pub use metadata::MetadataBuilder;
pub use parser::AssertionParser;
pub use pipeline::{PipelineOutcome, PipelineStage, SsoPipeline};
pub use request::{BuiltRequest, RequestBuilder};
pub use signature::{SignatureConfig, SignatureVerifier, XmlSigner};
pub use types::*;
