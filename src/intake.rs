//! Image intake: uploads become data URLs, data URLs become inline parts.

use std::{fmt, str::FromStr};

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    Front,
    Back,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageSlot::Front => "front",
            ImageSlot::Back => "back",
        })
    }
}

impl FromStr for ImageSlot {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "front" => Ok(ImageSlot::Front),
            "back" => Ok(ImageSlot::Back),
            other => Err(IntakeError::UnknownSlot(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("only image files are accepted (got {0})")]
    NotAnImage(String),
    #[error("upload is empty")]
    Empty,
    #[error("file content is not a recognizable image")]
    Unrecognized,
    #[error("malformed data URL: {0}")]
    MalformedDataUrl(&'static str),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unknown image slot '{0}'")]
    UnknownSlot(String),
}

/// An image ready to be inlined into a provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload without the `data:` header.
    pub data: String,
}

/// Encodes an uploaded file as a data URL.
///
/// The declared content type must be `image/*` and the bytes must sniff as a
/// known image format; the MIME type in the URL is the sniffed one.
pub fn encode_upload(content_type: Option<&str>, bytes: &[u8]) -> Result<String, IntakeError> {
    let declared = content_type.unwrap_or("unknown");
    if !declared.starts_with("image/") {
        return Err(IntakeError::NotAnImage(declared.to_string()));
    }
    if bytes.is_empty() {
        return Err(IntakeError::Empty);
    }
    let format = image::guess_format(bytes).map_err(|_| IntakeError::Unrecognized)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", format.to_mime_type(), encoded))
}

/// Splits a `data:image/...;base64,` URL and checks that it holds an image.
pub fn parse_data_url(url: &str) -> Result<InlineImage, IntakeError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or(IntakeError::MalformedDataUrl("missing data: prefix"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(IntakeError::MalformedDataUrl("missing payload separator"))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or(IntakeError::MalformedDataUrl("payload is not base64"))?;
    if !mime_type.starts_with("image/") {
        return Err(IntakeError::NotAnImage(mime_type.to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    if bytes.is_empty() {
        return Err(IntakeError::Empty);
    }
    image::guess_format(&bytes).map_err(|_| IntakeError::Unrecognized)?;

    Ok(InlineImage {
        mime_type: mime_type.to_string(),
        data: payload.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::TINY_PNG;

    #[test]
    fn upload_round_trips_through_data_url() {
        let url = encode_upload(Some("image/png"), TINY_PNG).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let inline = parse_data_url(&url).unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert!(!inline.data.contains(','));
    }

    #[test]
    fn sniffed_type_wins_over_declared_subtype() {
        let url = encode_upload(Some("image/jpeg"), TINY_PNG).unwrap();
        assert!(url.starts_with("data:image/png;"));
    }

    #[test]
    fn non_image_uploads_are_rejected() {
        assert!(matches!(
            encode_upload(Some("application/pdf"), TINY_PNG),
            Err(IntakeError::NotAnImage(t)) if t == "application/pdf"
        ));
        assert!(matches!(encode_upload(None, TINY_PNG), Err(IntakeError::NotAnImage(_))));
        assert!(matches!(encode_upload(Some("image/png"), b""), Err(IntakeError::Empty)));
        assert!(matches!(
            encode_upload(Some("image/png"), b"definitely not pixels"),
            Err(IntakeError::Unrecognized)
        ));
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(matches!(parse_data_url("image/png;base64,AAAA"), Err(IntakeError::MalformedDataUrl(_))));
        assert!(matches!(parse_data_url("data:image/png;base64"), Err(IntakeError::MalformedDataUrl(_))));
        assert!(matches!(parse_data_url("data:image/png,AAAA"), Err(IntakeError::MalformedDataUrl(_))));
        assert!(matches!(parse_data_url("data:image/png;base64,@@@"), Err(IntakeError::Base64(_))));
    }

    #[test]
    fn slots_parse_from_form_values() {
        assert_eq!("front".parse::<ImageSlot>().unwrap(), ImageSlot::Front);
        assert_eq!(" back ".parse::<ImageSlot>().unwrap(), ImageSlot::Back);
        assert!("side".parse::<ImageSlot>().is_err());
    }
}
