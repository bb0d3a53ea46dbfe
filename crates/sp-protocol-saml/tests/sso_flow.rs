//! End-to-end SSO flow tests.
//!
//! Exercises the full response pipeline against documents signed with a
//! real RSA test key, plus the request-side round trip. The fixtures are
//! a dedicated 2048-bit key with a self-signed certificate and a second,
//! non-matching certificate.

use std::collections::HashSet;

use sp_protocol_saml::codec::{decode_base64, deflate_raw, encode_base64};
use sp_protocol_saml::config::{SigningMaterial, SpIdentity};
use sp_protocol_saml::error::SamlSpError;
use sp_protocol_saml::pipeline::{PipelineOutcome, PipelineStage, SsoPipeline};
use sp_protocol_saml::request::RequestBuilder;
use sp_protocol_saml::signature::{SignatureVerifier, XmlSigner};

const IDP_KEY_PEM: &str = include_str!("fixtures/idp_key.pem");
const IDP_CERT_PEM: &str = include_str!("fixtures/idp_cert.pem");
const OTHER_CERT_PEM: &str = include_str!("fixtures/other_cert.pem");

const IDP_ENTITY_ID: &str = "https://idp.example.com";
const ASSERTION_ID: &str = "_assertion-9f6c2e";

fn sp_identity() -> SpIdentity {
    SpIdentity {
        entity_id: "https://sp.example.com".to_string(),
        acs_url: "https://sp.example.com/acs".to_string(),
        slo_url: None,
        certificate_der: Vec::new(),
    }
}

fn response_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_response-1" Version="2.0" IssueInstant="2024-01-01T00:00:01Z">
  <saml:Issuer>{IDP_ENTITY_ID}</saml:Issuer>
  <saml:Assertion ID="{ASSERTION_ID}" Version="2.0" IssueInstant="2024-01-01T00:00:00Z">
    <saml:Issuer>{IDP_ENTITY_ID}</saml:Issuer>
    <saml:Subject><saml:NameID>alice@example.com</saml:NameID></saml:Subject>
    <saml:AuthnStatement AuthnInstant="2024-01-01T00:00:00Z" SessionIndex="sess-123"/>
    <saml:AttributeStatement>
      <saml:Attribute Name="Department"><saml:AttributeValue>Mule Mongery</saml:AttributeValue></saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#
    )
}

/// Signs the assertion the way the test IdP would.
fn signed_response() -> anyhow::Result<String> {
    let signer = XmlSigner::from_pem(IDP_KEY_PEM, Some(IDP_CERT_PEM))?;
    Ok(signer.sign(&response_xml(), ASSERTION_ID)?)
}

/// Encodes a response document the way the POST binding delivers it.
fn encode_response(xml: &str) -> anyhow::Result<String> {
    Ok(encode_base64(&deflate_raw(xml.as_bytes())?))
}

fn pipeline(certificate_pem: &str, expected_issuer: Option<&str>) -> anyhow::Result<SsoPipeline> {
    let material = SigningMaterial::from_pem(certificate_pem, expected_issuer.map(String::from))?;
    Ok(SsoPipeline::new(&material)?)
}

#[test]
fn signed_response_is_accepted_with_exact_record() -> anyhow::Result<()> {
    let encoded = encode_response(&signed_response()?)?;
    let outcome = pipeline(IDP_CERT_PEM, Some(IDP_ENTITY_ID))?.process(&encoded);

    match outcome {
        PipelineOutcome::Accepted {
            record,
            signature_valid,
        } => {
            assert!(signature_valid);
            assert_eq!(record.issuer.as_deref(), Some(IDP_ENTITY_ID));
            assert_eq!(record.subject.as_deref(), Some("alice@example.com"));
            assert_eq!(record.session_index.as_deref(), Some("sess-123"));
            assert_eq!(record.authn_instant.as_deref(), Some("2024-01-01T00:00:00Z"));
            assert_eq!(record.attribute("Department"), Some("Mule Mongery"));
        }
        PipelineOutcome::Rejected { stage, error } => {
            panic!("rejected at {}: {error}", stage.name())
        }
    }
    Ok(())
}

#[test]
fn tampered_signed_region_is_rejected() -> anyhow::Result<()> {
    let tampered = signed_response()?.replace("alice@example.com", "mallory@example.com");
    let outcome = pipeline(IDP_CERT_PEM, Some(IDP_ENTITY_ID))?.process(&encode_response(&tampered)?);

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            stage: PipelineStage::SignatureChecked,
            error: SamlSpError::Signature(_),
        }
    ));
    Ok(())
}

#[test]
fn wrong_certificate_is_rejected() -> anyhow::Result<()> {
    let encoded = encode_response(&signed_response()?)?;
    let outcome = pipeline(OTHER_CERT_PEM, Some(IDP_ENTITY_ID))?.process(&encoded);

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            stage: PipelineStage::SignatureChecked,
            error: SamlSpError::Signature(_),
        }
    ));
    Ok(())
}

#[test]
fn unexpected_issuer_is_rejected() -> anyhow::Result<()> {
    let encoded = encode_response(&signed_response()?)?;
    let outcome = pipeline(IDP_CERT_PEM, Some("https://someone-else.example.com"))?.process(&encoded);

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            stage: PipelineStage::SignatureChecked,
            error: SamlSpError::Signature(_),
        }
    ));
    Ok(())
}

#[test]
fn issuer_check_is_skipped_when_not_configured() -> anyhow::Result<()> {
    let encoded = encode_response(&signed_response()?)?;
    let outcome = pipeline(IDP_CERT_PEM, None)?.process(&encoded);
    assert!(outcome.is_accepted());
    Ok(())
}

#[test]
fn wrapped_unsigned_assertion_never_reaches_the_record() -> anyhow::Result<()> {
    // A forged assertion smuggled in ahead of the legitimately signed one,
    // issuer text matching so document-order lookups would find it first.
    // The signature still holds over the untouched signed assertion; the
    // record must come from those covered bytes and nothing else.
    let forged = format!(
        r#"<saml:Assertion ID="_forged" Version="2.0" IssueInstant="2024-01-01T00:00:02Z">
    <saml:Issuer>{IDP_ENTITY_ID}</saml:Issuer>
    <saml:Subject><saml:NameID>mallory@example.com</saml:NameID></saml:Subject>
    <saml:AuthnStatement AuthnInstant="2024-01-01T00:00:02Z" SessionIndex="sess-evil"/>
    <saml:AttributeStatement>
      <saml:Attribute Name="Role"><saml:AttributeValue>SuperAdmin</saml:AttributeValue></saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
  "#
    );

    let signed_open = format!(r#"<saml:Assertion ID="{ASSERTION_ID}""#);
    let wrapped = signed_response()?.replacen(&signed_open, &format!("{forged}{signed_open}"), 1);
    assert!(wrapped.contains("_forged"));

    let outcome =
        pipeline(IDP_CERT_PEM, Some(IDP_ENTITY_ID))?.process(&encode_response(&wrapped)?);

    match outcome {
        PipelineOutcome::Accepted { record, .. } => {
            assert_eq!(record.subject.as_deref(), Some("alice@example.com"));
            assert_eq!(record.session_index.as_deref(), Some("sess-123"));
            assert_eq!(record.attribute("Role"), None);
            assert_eq!(record.attribute("Department"), Some("Mule Mongery"));
        }
        PipelineOutcome::Rejected { stage, error } => {
            panic!("rejected at {}: {error}", stage.name())
        }
    }
    Ok(())
}

#[test]
fn unsigned_response_never_reaches_accepted() -> anyhow::Result<()> {
    let outcome = pipeline(IDP_CERT_PEM, Some(IDP_ENTITY_ID))?
        .process(&encode_response(&response_xml())?);

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            stage: PipelineStage::SignatureChecked,
            error: SamlSpError::Signature(_),
        }
    ));
    Ok(())
}

#[test]
fn corrupt_deflate_stream_is_rejected_cleanly() -> anyhow::Result<()> {
    let garbage = encode_base64(&[0x00, 0xff, 0x13, 0x37, 0x99]);
    let outcome = pipeline(IDP_CERT_PEM, None)?.process(&garbage);

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            stage: PipelineStage::Decompressed,
            error: SamlSpError::Decompress(_),
        }
    ));
    Ok(())
}

#[test]
fn compression_bomb_is_rejected_not_truncated() -> anyhow::Result<()> {
    let bomb = deflate_raw(&vec![b'x'; 8 * 1024 * 1024])?;
    let outcome = pipeline(IDP_CERT_PEM, None)?.process(&encode_base64(&bomb));

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            stage: PipelineStage::Decompressed,
            error: SamlSpError::Decompress(_),
        }
    ));
    Ok(())
}

#[test]
fn request_base64_round_trips_byte_identical() -> anyhow::Result<()> {
    let built = RequestBuilder::new(&sp_identity()).build("https://idp.example.com/sso")?;
    let decoded = decode_base64(&encode_base64(built.xml.as_bytes()))?;
    assert_eq!(decoded, built.xml.as_bytes());
    Ok(())
}

#[test]
fn request_ids_are_unique_across_ten_thousand_builds() -> anyhow::Result<()> {
    let builder = RequestBuilder::new(&sp_identity());
    let mut seen = HashSet::new();

    for _ in 0..10_000 {
        let built = builder.build("https://idp.example.com/sso")?;
        assert!(seen.insert(built.id.clone()), "duplicate request ID: {}", built.id);
    }
    Ok(())
}

#[test]
fn signed_authn_request_verifies_against_signer_certificate() -> anyhow::Result<()> {
    let signer = XmlSigner::from_pem(IDP_KEY_PEM, Some(IDP_CERT_PEM))?;
    let built = RequestBuilder::new(&sp_identity())
        .with_signer(signer)
        .build("https://idp.example.com/sso")?;

    let material = SigningMaterial::from_pem(IDP_CERT_PEM, None)?;
    let verifier = SignatureVerifier::new(&material)?;
    assert!(verifier.verify(&built.xml)?);

    // The signature pins the document: any change breaks it.
    let tampered = built.xml.replace("https://sp.example.com/acs", "https://evil.example.com");
    assert!(!verifier.verify(&tampered)?);
    Ok(())
}
