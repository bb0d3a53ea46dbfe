//! XML signature support.
//!
//! Enveloped XML-DSig over SAML documents: [`SignatureVerifier`] checks
//! inbound responses against the configured IdP certificate, [`XmlSigner`]
//! signs outbound AuthnRequests (and builds signed test documents). Both
//! share one canonicalizer so a document signed here verifies here
//! byte-for-byte.
//!
//! Element location works on the raw document text rather than a DOM:
//! signed subsets must be hashed over the exact bytes the producer hashed,
//! and re-serializing through a parser would destroy them.

mod c14n;
mod signer;
mod verifier;

pub use signer::XmlSigner;
pub use verifier::SignatureVerifier;

use sp_crypto::RsaAlgorithm;

/// Configuration for signature creation.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Signature algorithm to use.
    pub algorithm: RsaAlgorithm,
    /// Whether to embed the signer's certificate in a KeyInfo element.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            algorithm: RsaAlgorithm::Rs256,
            include_certificate: true,
        }
    }
}

impl SignatureConfig {
    /// Sets the signature algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: RsaAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// Returns the local part of a possibly prefixed XML name.
pub(crate) fn local_name_of(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Returns the qualified name of the tag starting at `tag_start`.
fn qname_at(xml: &str, tag_start: usize) -> Option<&str> {
    let rest = xml.get(tag_start + 1..)?;
    let end = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
    Some(&rest[..end])
}

/// Finds the next start tag whose local name matches, scanning from `from`.
pub(crate) fn find_local_open_tag(xml: &str, local: &str, from: usize) -> Option<usize> {
    let mut at = from;
    while let Some(i) = xml[at..].find('<').map(|i| i + at) {
        let rest = &xml[i + 1..];
        if rest.starts_with('/') || rest.starts_with('!') || rest.starts_with('?') {
            at = i + 1;
            continue;
        }
        if let Some(qname) = qname_at(xml, i) {
            if local_name_of(qname) == local {
                return Some(i);
            }
        }
        at = i + 1;
    }
    None
}

/// Returns the byte offset just past the first close tag with the given
/// local name, or `None` if there is none.
pub(crate) fn find_local_close_end(xml: &str, local: &str) -> Option<usize> {
    let mut at = 0;
    while let Some(i) = xml[at..].find("</").map(|i| i + at) {
        let rest = &xml[i + 2..];
        let end = rest.find('>')?;
        if local_name_of(rest[..end].trim()) == local {
            return Some(i + 2 + end + 1);
        }
        at = i + 2;
    }
    None
}

/// Finds the byte range of the first element with the given local name,
/// including its close tag. The element must not nest within itself.
pub(crate) fn find_local_element_range(xml: &str, local: &str) -> Option<(usize, usize)> {
    let start = find_local_open_tag(xml, local, 0)?;
    let qname = qname_at(xml, start)?;

    // Self-closing form.
    let tag_end = start + xml[start..].find('>')?;
    if xml.as_bytes().get(tag_end.wrapping_sub(1)) == Some(&b'/') {
        return Some((start, tag_end + 1));
    }

    let close = format!("</{qname}>");
    let end = xml[start..].find(&close)? + start + close.len();
    Some((start, end))
}

/// Finds the byte range of the element carrying `ID="{id}"` (or `Id=`),
/// including its close tag. Handles nested elements of the same name.
pub(crate) fn find_element_range(xml: &str, id: &str) -> Option<(usize, usize)> {
    let attr_pos = {
        let upper = format!("ID=\"{id}\"");
        let mixed = format!("Id=\"{id}\"");
        find_id_attribute(xml, &upper).or_else(|| find_id_attribute(xml, &mixed))?
    };
    let start = xml[..attr_pos].rfind('<')?;
    let qname = qname_at(xml, start)?;

    let open_pat = format!("<{qname}");
    let close_pat = format!("</{qname}>");

    let mut depth = 0usize;
    let mut cursor = start;
    loop {
        let next_open = next_tag_occurrence(xml, &open_pat, cursor);
        let next_close = xml[cursor..].find(&close_pat).map(|i| i + cursor);

        match (next_open, next_close) {
            (Some(open), Some(close)) if open < close => {
                let tag_end = open + xml[open..].find('>')?;
                let self_closing = xml.as_bytes().get(tag_end.wrapping_sub(1)) == Some(&b'/');
                if self_closing {
                    if open == start {
                        return Some((start, tag_end + 1));
                    }
                } else {
                    depth += 1;
                }
                cursor = tag_end + 1;
            }
            (_, Some(close)) => {
                depth = depth.checked_sub(1)?;
                let close_end = close + close_pat.len();
                if depth == 0 {
                    return Some((start, close_end));
                }
                cursor = close_end;
            }
            _ => return None,
        }
    }
}

/// Finds `pat` (an `ID="…"` attribute pattern) where it is a whole
/// attribute inside a tag: preceded by whitespace, with an open angle
/// bracket as the nearest enclosing bracket. Rejects suffix matches like
/// `CustomID="…"` and the pattern occurring in text content.
fn find_id_attribute(xml: &str, pat: &str) -> Option<usize> {
    let mut at = 0;
    while let Some(i) = xml[at..].find(pat).map(|i| i + at) {
        let preceded_by_ws = i > 0
            && matches!(xml.as_bytes()[i - 1], b' ' | b'\t' | b'\r' | b'\n');
        let inside_tag = matches!(
            xml[..i].rfind(|c| c == '<' || c == '>'),
            Some(j) if xml.as_bytes()[j] == b'<'
        );
        if preceded_by_ws && inside_tag {
            return Some(i);
        }
        at = i + 1;
    }
    None
}

/// Finds the next occurrence of an open-tag pattern that is a whole tag
/// name (`<saml:Assertion` must not match `<saml:AssertionIDRef`).
fn next_tag_occurrence(xml: &str, open_pat: &str, from: usize) -> Option<usize> {
    let mut at = from;
    while let Some(i) = xml[at..].find(open_pat).map(|i| i + at) {
        match xml.as_bytes().get(i + open_pat.len()) {
            Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/') => return Some(i),
            _ => at = i + open_pat.len(),
        }
    }
    None
}
