use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Marker prefix the backend writes when it turns an upload into a message.
pub const FILE_MARKER: &str = "FILE:";

/// Extensions rendered inline as images; everything else gets a download
/// affordance.
static IMAGE_EXTENSIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["jpeg", "jpg", "gif", "png", "webp"].into_iter().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

/// Parsed view of a `FILE:`-encoded message body. Recomputed at render time,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub filename: String,
    pub url: String,
}

/// Canonical encoded body for an uploaded file.
pub fn encode(filename: &str) -> String {
    format!("{FILE_MARKER}{filename}")
}

/// Decode a message body into an attachment descriptor, or `None` when the
/// body is ordinary text. Pure and cheap enough to call on every render.
pub fn decode(body: &str, asset_base: &str) -> Option<Attachment> {
    let filename = body.strip_prefix(FILE_MARKER)?;
    if filename.is_empty() {
        return None;
    }
    let kind = if is_image(filename) {
        AttachmentKind::Image
    } else {
        AttachmentKind::Document
    };
    Some(Attachment {
        kind,
        filename: filename.to_string(),
        url: format!("{}/{}", asset_base.trim_end_matches('/'), filename),
    })
}

fn is_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://127.0.0.1:5000/chat/uploads";

    #[test]
    fn plain_text_is_not_an_attachment() {
        assert_eq!(decode("hello there", BASE), None);
        assert_eq!(decode("", BASE), None);
        // Marker must be a prefix, not merely present.
        assert_eq!(decode("see FILE:contract.pdf", BASE), None);
    }

    #[test]
    fn marker_without_filename_is_ignored() {
        assert_eq!(decode("FILE:", BASE), None);
    }

    #[test]
    fn decodes_documents_and_images() {
        let doc = decode("FILE:contract.pdf", BASE).expect("document expected");
        assert_eq!(doc.kind, AttachmentKind::Document);
        assert_eq!(doc.filename, "contract.pdf");
        assert_eq!(doc.url, "http://127.0.0.1:5000/chat/uploads/contract.pdf");

        let img = decode("FILE:scan.PNG", BASE).expect("image expected");
        assert_eq!(img.kind, AttachmentKind::Image);
        assert_eq!(img.url, "http://127.0.0.1:5000/chat/uploads/scan.PNG");
    }

    #[test]
    fn extensionless_files_are_documents() {
        let doc = decode("FILE:notes", BASE).expect("document expected");
        assert_eq!(doc.kind, AttachmentKind::Document);
    }

    #[test]
    fn encode_round_trips() {
        let body = encode("photo.webp");
        assert_eq!(body, "FILE:photo.webp");
        let parsed = decode(&body, "http://cdn.haki.example/files/").expect("image expected");
        assert_eq!(parsed.kind, AttachmentKind::Image);
        assert_eq!(parsed.url, "http://cdn.haki.example/files/photo.webp");
    }
}
