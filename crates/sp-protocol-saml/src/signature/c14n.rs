//! Exclusive XML canonicalization.
//!
//! Produces the canonical octet stream hashed by XML-DSig: the XML
//! declaration, comments and processing instructions are dropped, empty
//! elements are expanded to start/end pairs, attributes are sorted with
//! namespace declarations first, superfluous namespace redeclarations are
//! removed, and text is re-escaped with the canonical entity set.
//!
//! Signing and verification both canonicalize through this function, so a
//! document signed by this crate verifies against the same octets.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlSpError, SpResult};

/// Canonicalizes an XML fragment per exclusive c14n.
pub(crate) fn canonicalize(xml: &str) -> SpResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len());
    let mut ns_stack: Vec<Vec<(String, String)>> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let frame = write_element(&mut out, &e, &ns_stack, false)?;
                ns_stack.push(frame);
            }
            Event::Empty(e) => {
                write_element(&mut out, &e, &ns_stack, true)?;
            }
            Event::End(e) => {
                out.push_str("</");
                out.push_str(name_str(e.name().as_ref())?);
                out.push('>');
                ns_stack.pop();
            }
            Event::Text(e) => escape_text(&e.unescape()?, &mut out),
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|_| SamlSpError::MalformedXml("CDATA is not valid UTF-8".into()))?;
                escape_text(text, &mut out);
            }
            Event::Eof => break,
            // Comments, processing instructions and the XML declaration
            // have no canonical form.
            _ => {}
        }
    }

    Ok(out)
}

/// Writes one start tag with sorted namespace declarations and attributes.
/// Returns the namespace declarations emitted, to be pushed as the scope
/// frame for this element's subtree.
fn write_element(
    out: &mut String,
    e: &BytesStart<'_>,
    ns_stack: &[Vec<(String, String)>],
    self_closing: bool,
) -> SpResult<Vec<(String, String)>> {
    let name = name_str(e.name().as_ref())?.to_string();

    let mut ns_decls: Vec<(String, String)> = Vec::new();
    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = name_str(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            ns_decls.push((key, value));
        } else {
            attrs.push((key, value));
        }
    }

    ns_decls.retain(|(key, value)| !binding_in_scope(ns_stack, key, value));
    ns_decls.sort();
    attrs.sort();

    out.push('<');
    out.push_str(&name);
    for (key, value) in ns_decls.iter().chain(attrs.iter()) {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
    if self_closing {
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }

    Ok(ns_decls)
}

/// Whether the nearest in-scope declaration of `key` already binds `value`.
/// A prefix rebound to a different URI in between makes a redeclaration
/// meaningful again, so only the nearest frame counts.
fn binding_in_scope(ns_stack: &[Vec<(String, String)>], key: &str, value: &str) -> bool {
    for frame in ns_stack.iter().rev() {
        if let Some((_, bound)) = frame.iter().find(|(k, _)| k == key) {
            return bound == value;
        }
    }
    false
}

fn name_str(raw: &[u8]) -> SpResult<&str> {
    std::str::from_utf8(raw)
        .map_err(|_| SamlSpError::MalformedXml("XML name is not valid UTF-8".into()))
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
