//! crates/exam_forge_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::IntelligenceResult;

//=========================================================================================
// Intelligence Modes
//=========================================================================================

/// The four generation strategies a user can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Survival,
    Weaponizer,
    TrapDetector,
    McqGenerator,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::Survival,
        Mode::Weaponizer,
        Mode::TrapDetector,
        Mode::McqGenerator,
    ];

    /// The wire identifier of the mode, e.g. `trap-detector`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Survival => "survival",
            Mode::Weaponizer => "weaponizer",
            Mode::TrapDetector => "trap-detector",
            Mode::McqGenerator => "mcq-generator",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown intelligence mode: '{0}'")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

//=========================================================================================
// Attachments
//=========================================================================================

pub const PDF_MIME: &str = "application/pdf";
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// The kinds of files the forge accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Pdf,
    SlideDeck,
}

impl AssetKind {
    /// Classifies a MIME type, returning `None` for unsupported files.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        if mime_type.starts_with("image/") {
            Some(AssetKind::Image)
        } else if mime_type == PDF_MIME {
            Some(AssetKind::Pdf)
        } else if mime_type == PPTX_MIME {
            Some(AssetKind::SlideDeck)
        } else {
            None
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, AssetKind::Pdf | AssetKind::SlideDeck)
    }
}

/// A user-supplied file, normalized once at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// A `data:<mime>;base64,...` URI, present for images only.
    pub inline_data: Option<String>,
    /// Text pulled out of a PDF or slide deck.
    pub extracted_text: Option<String>,
}

impl UploadedAsset {
    pub fn image(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64, data_uri: String) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            inline_data: Some(data_uri),
            extracted_text: None,
        }
    }

    pub fn document(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64, text: String) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            inline_data: None,
            extracted_text: Some(text),
        }
    }

    pub fn kind(&self) -> Option<AssetKind> {
        AssetKind::from_mime(&self.mime_type)
    }
}

/// The unified input bundle for one generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyInput {
    pub raw_text: String,
    pub attachments: Vec<UploadedAsset>,
}

impl StudyInput {
    pub fn new(raw_text: impl Into<String>, attachments: Vec<UploadedAsset>) -> Self {
        Self {
            raw_text: raw_text.into(),
            attachments,
        }
    }

    /// True when there is neither text nor any attachment to work with.
    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty() && self.attachments.is_empty()
    }
}

//=========================================================================================
// Study Sessions
//=========================================================================================

/// One persisted generation request and its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySession {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    /// The first attachment's MIME type, or `TEXT`.
    pub source_type: String,
    pub extracted_text: String,
    pub uploaded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub mode: Mode,
    pub result: IntelligenceResult,
}

/// The slice of a session shown in the history list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySessionSummary {
    pub id: Uuid,
    pub title: String,
    pub mode: Mode,
    pub source_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&StudySession> for StudySessionSummary {
    fn from(session: &StudySession) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            mode: session.mode,
            source_type: session.source_type.clone(),
            uploaded_at: session.uploaded_at,
        }
    }
}

//=========================================================================================
// Identity
//=========================================================================================

// Represents a user - anonymous guests and registered accounts alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
