use crate::error::{LabError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Markdown,
    Csv,
    Json,
}

impl DocumentKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn is_text(self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub mime: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn text(&self) -> Option<&str> {
        if self.kind.is_text() {
            std::str::from_utf8(&self.bytes).ok()
        } else {
            None
        }
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

pub fn validate_upload(filename: &str, bytes: Vec<u8>, max_bytes: usize) -> Result<UploadedDocument> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| LabError::Upload("missing file name".into()))?
        .to_string();

    if bytes.is_empty() {
        return Err(LabError::Upload(format!("'{name}' is empty")));
    }
    if bytes.len() > max_bytes {
        return Err(LabError::Upload(format!(
            "'{name}' is {} bytes, the limit is {max_bytes}",
            bytes.len()
        )));
    }

    let kind = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentKind::from_extension)
        .ok_or_else(|| LabError::Upload(format!("'{name}' is not a supported document type")))?;

    match kind {
        DocumentKind::Pdf => {
            if !bytes.starts_with(b"%PDF-") {
                return Err(LabError::Upload(format!("'{name}' does not look like a PDF")));
            }
        }
        _ => {
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| LabError::Upload(format!("'{name}' is not valid UTF-8 text")))?;
            if kind == DocumentKind::Json && serde_json::from_str::<serde_json::Value>(text).is_err() {
                return Err(LabError::Upload(format!("'{name}' is not valid JSON")));
            }
        }
    }

    let mime = match kind {
        DocumentKind::Markdown => "text/markdown".to_string(),
        _ => mime_guess::from_path(&name).first_or_octet_stream().essence_str().to_string(),
    };

    log::debug!("Accepted upload '{name}' ({mime}, {} bytes)", bytes.len());
    Ok(UploadedDocument { filename: name, mime, kind, bytes })
}
