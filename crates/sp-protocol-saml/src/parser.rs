//! SAML Response/Assertion parsing.
//!
//! Extracts an [`AssertionRecord`] from a Response document using
//! namespace-agnostic matching: elements are matched by local name
//! regardless of prefix, since IdPs variously emit `saml:`, `saml2:`, or
//! default-namespace documents.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{SamlSpError, SpResult};
use crate::types::AssertionRecord;

/// How elements are located within the response document.
///
/// The lenient mode takes the first matching element anywhere in the
/// document, not scoped to the Response or Assertion level. That matches
/// the behavior relying parties have historically depended on; a stricter
/// scoped strategy can be added here without touching the parse contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupStrategy {
    /// First matching element anywhere in the document.
    #[default]
    LenientFirstMatch,
}

/// Parses SAML Response XML into an [`AssertionRecord`].
#[derive(Debug, Clone, Default)]
pub struct AssertionParser {
    lookup: LookupStrategy,
}

impl AssertionParser {
    /// Creates a parser with the default lenient lookup strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lookup strategy this parser applies.
    #[must_use]
    pub const fn lookup(&self) -> LookupStrategy {
        self.lookup
    }

    /// Parses a SAML Response (or bare Assertion) document.
    ///
    /// # Errors
    ///
    /// Returns `MalformedXml` if the document is not well-formed and
    /// `MalformedAssertion` if it is well-formed but structurally unusable:
    /// the root is not a Response or Assertion, or an Attribute carries no
    /// AttributeValue.
    pub fn parse(&self, xml: &str) -> SpResult<AssertionRecord> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut root_seen = false;

        let mut issuer: Option<String> = None;
        let mut subject: Option<String> = None;
        let mut session_index: Option<String> = None;
        let mut authn_instant: Option<String> = None;
        let mut attributes: Vec<(String, String)> = Vec::new();

        let mut authn_statement_seen = false;

        // Text-capture states. Only the first match of each element kind
        // captures, per the lenient lookup strategy.
        let mut in_issuer = false;
        let mut in_name_id = false;
        let mut issuer_buf = String::new();
        let mut name_id_buf = String::new();

        // Attribute extraction state: name of the Attribute currently open,
        // its first AttributeValue once complete, and the in-progress value.
        let mut current_attr_name: Option<String> = None;
        let mut current_attr_value: Option<String> = None;
        let mut capturing_value = false;
        let mut value_buf = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let local_name = e.local_name();
                    let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");

                    if !root_seen {
                        check_root(name)?;
                        root_seen = true;
                    }

                    match name {
                        "Issuer" if issuer.is_none() && !in_issuer => {
                            in_issuer = true;
                            issuer_buf.clear();
                        }
                        "NameID" if subject.is_none() && !in_name_id => {
                            in_name_id = true;
                            name_id_buf.clear();
                        }
                        "AuthnStatement" if !authn_statement_seen => {
                            authn_statement_seen = true;
                            for attr in e.attributes().flatten() {
                                let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
                                match key {
                                    "SessionIndex" => {
                                        session_index = Some(attr.unescape_value()?.to_string());
                                    }
                                    "AuthnInstant" => {
                                        authn_instant = Some(attr.unescape_value()?.to_string());
                                    }
                                    _ => {}
                                }
                            }
                        }
                        "Attribute" => {
                            let mut attr_name = String::new();
                            for attr in e.attributes().flatten() {
                                let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
                                if key == "Name" {
                                    attr_name = attr.unescape_value()?.to_string();
                                }
                            }
                            current_attr_name = Some(attr_name);
                            current_attr_value = None;
                        }
                        "AttributeValue"
                            if current_attr_name.is_some() && current_attr_value.is_none() =>
                        {
                            capturing_value = true;
                            value_buf.clear();
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    let local_name = e.local_name();
                    let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");

                    if !root_seen {
                        check_root(name)?;
                        root_seen = true;
                    }

                    match name {
                        "Issuer" if issuer.is_none() => issuer = Some(String::new()),
                        "NameID" if subject.is_none() => subject = Some(String::new()),
                        "AuthnStatement" if !authn_statement_seen => {
                            authn_statement_seen = true;
                            for attr in e.attributes().flatten() {
                                let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
                                match key {
                                    "SessionIndex" => {
                                        session_index = Some(attr.unescape_value()?.to_string());
                                    }
                                    "AuthnInstant" => {
                                        authn_instant = Some(attr.unescape_value()?.to_string());
                                    }
                                    _ => {}
                                }
                            }
                        }
                        // A self-closing Attribute cannot carry a value.
                        "Attribute" => {
                            return Err(SamlSpError::MalformedAssertion(
                                "Attribute element has no AttributeValue".to_string(),
                            ));
                        }
                        "AttributeValue"
                            if current_attr_name.is_some() && current_attr_value.is_none() =>
                        {
                            current_attr_value = Some(String::new());
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape()?;
                    if capturing_value {
                        value_buf.push_str(&text);
                    } else if in_issuer {
                        issuer_buf.push_str(&text);
                    } else if in_name_id {
                        name_id_buf.push_str(&text);
                    }
                }
                // CDATA carries content literally, no entity unescaping.
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if capturing_value {
                        value_buf.push_str(&text);
                    } else if in_issuer {
                        issuer_buf.push_str(&text);
                    } else if in_name_id {
                        name_id_buf.push_str(&text);
                    }
                }
                Ok(Event::End(e)) => {
                    let local_name = e.local_name();
                    let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");

                    match name {
                        "Issuer" if in_issuer => {
                            issuer = Some(std::mem::take(&mut issuer_buf));
                            in_issuer = false;
                        }
                        "NameID" if in_name_id => {
                            subject = Some(std::mem::take(&mut name_id_buf));
                            in_name_id = false;
                        }
                        "AttributeValue" if capturing_value => {
                            current_attr_value = Some(std::mem::take(&mut value_buf));
                            capturing_value = false;
                        }
                        "Attribute" => {
                            if let Some(attr_name) = current_attr_name.take() {
                                match current_attr_value.take() {
                                    Some(value) => attributes.push((attr_name, value)),
                                    None => {
                                        return Err(SamlSpError::MalformedAssertion(format!(
                                            "Attribute '{attr_name}' has no AttributeValue"
                                        )));
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        if !root_seen {
            return Err(SamlSpError::MalformedAssertion(
                "document has no Response or Assertion root".to_string(),
            ));
        }

        Ok(AssertionRecord {
            issuer,
            subject,
            session_index,
            authn_instant,
            attributes,
        })
    }
}

fn check_root(name: &str) -> SpResult<()> {
    if name == "Response" || name == "Assertion" {
        Ok(())
    } else {
        Err(SamlSpError::MalformedAssertion(format!(
            "document root '{name}' is not a SAML Response or Assertion"
        )))
    }
}

/// Returns the text content of the first element with the given local name.
///
/// Shared with signature verification for the issuer cross-check; follows
/// the same first-match-anywhere semantics as the parser.
pub(crate) fn first_element_text(xml: &str, target: &str) -> SpResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut capturing = false;
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                if name == target {
                    capturing = true;
                }
            }
            Ok(Event::Empty(e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                if name == target {
                    return Ok(Some(String::new()));
                }
            }
            Ok(Event::Text(e)) => {
                if capturing {
                    buf.push_str(&e.unescape()?);
                }
            }
            Ok(Event::CData(e)) => {
                if capturing {
                    buf.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                if capturing && name == target {
                    return Ok(Some(buf));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0">
  <saml:Issuer>https://idp.example.com</saml:Issuer>
  <saml:Assertion ID="_a1" Version="2.0">
    <saml:Issuer>https://idp.example.com</saml:Issuer>
    <saml:Subject>
      <saml:NameID>alice@example.com</saml:NameID>
    </saml:Subject>
    <saml:AuthnStatement AuthnInstant="2024-01-01T00:00:00Z" SessionIndex="sess-123"/>
    <saml:AttributeStatement>
      <saml:Attribute Name="Department">
        <saml:AttributeValue>Mule Mongery</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="Role">
        <saml:AttributeValue>Admin</saml:AttributeValue>
      </saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#
    }

    #[test]
    fn parses_full_response() {
        let record = AssertionParser::new().parse(sample_response()).unwrap();

        assert_eq!(record.issuer.as_deref(), Some("https://idp.example.com"));
        assert_eq!(record.subject.as_deref(), Some("alice@example.com"));
        assert_eq!(record.session_index.as_deref(), Some("sess-123"));
        assert_eq!(record.authn_instant.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(
            record.attributes,
            vec![
                ("Department".to_string(), "Mule Mongery".to_string()),
                ("Role".to_string(), "Admin".to_string()),
            ]
        );
    }

    #[test]
    fn attribute_order_is_document_order_with_duplicates() {
        let xml = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_a1">
  <saml:Attribute Name="Role"><saml:AttributeValue>Admin</saml:AttributeValue></saml:Attribute>
  <saml:Attribute Name="Role"><saml:AttributeValue>User</saml:AttributeValue></saml:Attribute>
  <saml:Attribute Name="Department"><saml:AttributeValue>Ops</saml:AttributeValue></saml:Attribute>
</saml:Assertion>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(
            record.attributes,
            vec![
                ("Role".to_string(), "Admin".to_string()),
                ("Role".to_string(), "User".to_string()),
                ("Department".to_string(), "Ops".to_string()),
            ]
        );
    }

    #[test]
    fn only_first_attribute_value_is_taken() {
        let xml = r#"<Assertion ID="_a1">
  <Attribute Name="Email">
    <AttributeValue>first@example.com</AttributeValue>
    <AttributeValue>second@example.com</AttributeValue>
  </Attribute>
</Assertion>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(
            record.attributes,
            vec![("Email".to_string(), "first@example.com".to_string())]
        );
    }

    #[test]
    fn attribute_without_value_is_malformed() {
        let xml = r#"<Assertion ID="_a1"><Attribute Name="Empty"></Attribute></Assertion>"#;
        let err = AssertionParser::new().parse(xml).unwrap_err();
        assert!(matches!(err, SamlSpError::MalformedAssertion(_)));

        let xml = r#"<Assertion ID="_a1"><Attribute Name="Empty"/></Assertion>"#;
        let err = AssertionParser::new().parse(xml).unwrap_err();
        assert!(matches!(err, SamlSpError::MalformedAssertion(_)));
    }

    #[test]
    fn empty_attribute_value_is_empty_string() {
        let xml = r#"<Assertion ID="_a1">
  <Attribute Name="Blank"><AttributeValue/></Attribute>
</Assertion>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(record.attributes, vec![("Blank".to_string(), String::new())]);
    }

    #[test]
    fn issuer_is_first_match_in_document_order() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">
  <saml:Issuer>response-level</saml:Issuer>
  <saml:Assertion><saml:Issuer>assertion-level</saml:Issuer></saml:Assertion>
</samlp:Response>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(record.issuer.as_deref(), Some("response-level"));
    }

    #[test]
    fn second_authn_statement_is_ignored() {
        let xml = r#"<Assertion>
  <AuthnStatement SessionIndex="first"/>
  <AuthnStatement SessionIndex="second"/>
</Assertion>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(record.session_index.as_deref(), Some("first"));
    }

    #[test]
    fn prefix_variants_are_equivalent() {
        let xml = r#"<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
  <saml2:Assertion>
    <saml2:Subject><saml2:NameID>bob@example.com</saml2:NameID></saml2:Subject>
  </saml2:Assertion>
</saml2p:Response>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(record.subject.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn non_saml_root_is_malformed_assertion() {
        let err = AssertionParser::new().parse("<html>nope</html>").unwrap_err();
        assert!(matches!(err, SamlSpError::MalformedAssertion(_)));
    }

    #[test]
    fn mismatched_tags_are_malformed_xml() {
        let err = AssertionParser::new()
            .parse("<Response><Issuer>x</Response></Issuer>")
            .unwrap_err();
        assert!(matches!(err, SamlSpError::MalformedXml(_)));
    }

    #[test]
    fn empty_document_is_malformed_assertion() {
        let err = AssertionParser::new().parse("").unwrap_err();
        assert!(matches!(err, SamlSpError::MalformedAssertion(_)));
    }

    #[test]
    fn entities_in_values_are_unescaped() {
        let xml = r#"<Assertion>
  <Attribute Name="Motto"><AttributeValue>salt &amp; iron</AttributeValue></Attribute>
</Assertion>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(record.attribute("Motto"), Some("salt & iron"));
    }

    #[test]
    fn cdata_values_are_read_literally() {
        let xml = r#"<Assertion>
  <Subject><NameID><![CDATA[alice@example.com]]></NameID></Subject>
  <Attribute Name="Motto"><AttributeValue><![CDATA[salt & iron]]></AttributeValue></Attribute>
</Assertion>"#;

        let record = AssertionParser::new().parse(xml).unwrap();
        assert_eq!(record.subject.as_deref(), Some("alice@example.com"));
        assert_eq!(record.attribute("Motto"), Some("salt & iron"));
    }

    #[test]
    fn first_element_text_reads_cdata() {
        let xml = "<Response><Issuer><![CDATA[https://idp.example.com]]></Issuer></Response>";
        let text = first_element_text(xml, "Issuer").unwrap();
        assert_eq!(text.as_deref(), Some("https://idp.example.com"));
    }

    #[test]
    fn first_element_text_finds_issuer() {
        let text = first_element_text(sample_response(), "Issuer").unwrap();
        assert_eq!(text.as_deref(), Some("https://idp.example.com"));

        let text = first_element_text(sample_response(), "Audience").unwrap();
        assert_eq!(text, None);
    }
}
