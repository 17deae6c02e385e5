//! services/api/src/web/uploads.rs
//!
//! Reads the multipart generation form and normalizes each uploaded file into
//! an `UploadedAsset`.

use axum::extract::Multipart;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use exam_forge_core::domain::{AssetKind, Mode, StudyInput, UnknownMode, UploadedAsset};

const MEBIBYTE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0} is not an image, PDF, or PPTX.")]
    Unsupported(String),

    #[error("{name} exceeds the {limit_mb}MB limit.")]
    TooLarge { name: String, limit_mb: usize },

    #[error("An intelligence mode must be selected.")]
    MissingMode,

    #[error(transparent)]
    UnknownMode(#[from] UnknownMode),

    #[error("Failed to read multipart data: {0}")]
    Multipart(String),
}

/// The decoded `POST /generate` form.
#[derive(Debug)]
pub struct GenerationForm {
    pub mode: Mode,
    pub input: StudyInput,
}

/// Classifies and encodes one uploaded file.
///
/// Images become data URIs. PDFs and slide decks are not parsed; they are
/// represented by a marker naming the file.
pub fn asset_from_upload(
    name: &str,
    mime_type: &str,
    data: &[u8],
    max_upload_bytes: usize,
) -> Result<UploadedAsset, UploadError> {
    let kind = AssetKind::from_mime(mime_type)
        .ok_or_else(|| UploadError::Unsupported(name.to_string()))?;

    if data.len() > max_upload_bytes {
        return Err(UploadError::TooLarge {
            name: name.to_string(),
            limit_mb: max_upload_bytes / MEBIBYTE,
        });
    }

    let size_bytes = data.len() as u64;
    Ok(match kind {
        AssetKind::Image => UploadedAsset::image(
            name,
            mime_type,
            size_bytes,
            format!("data:{};base64,{}", mime_type, STANDARD.encode(data)),
        ),
        AssetKind::Pdf => {
            UploadedAsset::document(name, mime_type, size_bytes, format!("[Content of PDF: {name}]"))
        }
        AssetKind::SlideDeck => {
            UploadedAsset::document(name, mime_type, size_bytes, format!("[Content of PPTX: {name}]"))
        }
    })
}

/// Reads the `mode`, `text` and file fields of the generation form.
pub async fn read_generation_form(
    multipart: &mut Multipart,
    max_upload_bytes: usize,
) -> Result<GenerationForm, UploadError> {
    let mut mode = None;
    let mut raw_text = String::new();
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| UploadError::Multipart(e.to_string()))?;
            attachments.push(asset_from_upload(&file_name, &mime_type, &data, max_upload_bytes)?);
            continue;
        }

        let field_name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| UploadError::Multipart(e.to_string()))?;
        match field_name.as_str() {
            "mode" => mode = Some(value.parse::<Mode>()?),
            "text" => raw_text = value,
            _ => {}
        }
    }

    Ok(GenerationForm {
        mode: mode.ok_or(UploadError::MissingMode)?,
        input: StudyInput::new(raw_text, attachments),
    })
}
