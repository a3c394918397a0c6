//! Attachment detection and retrieval-URL resolution.

use crate::model::Element;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use url::Url;

/// True iff the node is a file reference whose declared content type marks
/// it as a PDF. The content-type match is a case-insensitive substring
/// check, mirroring the repository's loose typing.
pub fn is_pdf_attachment(element: &Element) -> bool {
    element.model_type.as_deref() == Some("File")
        && element
            .content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
            .unwrap_or(false)
}

/// Resolve the URL the attachment can be fetched from.
///
/// An explicit HTTP(S) value wins verbatim. Otherwise the URL is derived
/// from the repository base and the URL-safe unpadded base64 encoding of the
/// submodel id, following the document store's attachment-retrieval
/// convention. The encoding is round-trip stable: decoding the base64
/// segment recovers the submodel id exactly.
pub fn resolve_attachment_url(
    value: Option<&str>,
    submodel_id: &str,
    local_name: &str,
    repo_base_url: &str,
) -> String {
    if let Some(v) = value {
        if v.starts_with("http") {
            return v.to_string();
        }
    }

    let encoded_id = URL_SAFE_NO_PAD.encode(submodel_id.as_bytes());
    format!(
        "{}/submodels/{}/submodel-elements/{}/attachment",
        repo_base_url.trim_end_matches('/'),
        encoded_id,
        local_name
    )
}

/// Human-readable source name for index records: the last path segment of
/// the URL, query string stripped.
pub fn source_name_from_url(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(segment) = parsed
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
        {
            return segment.to_string();
        }
    }
    url.split('/')
        .next_back()
        .unwrap_or(url)
        .split('?')
        .next()
        .unwrap_or(url)
        .to_string()
}
