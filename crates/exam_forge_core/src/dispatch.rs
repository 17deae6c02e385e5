//! crates/exam_forge_core/src/dispatch.rs
//!
//! The mode dispatcher: shapes the unified input bundle into the payload of
//! the selected mode and runs exactly that mode.

use crate::domain::{AssetKind, Mode, StudyInput};
use crate::error::StudyError;
use crate::generation::{generate, McqGenerator, Survival, TrapDetector, Weaponizer};
use crate::ports::StructuredGenerationService;
use crate::schema::{IntelligenceResult, McqInput, SurvivalInput, TrapDetectorInput, WeaponizerInput};

/// Placeholders sent instead of an empty string so the model still gets
/// some text to anchor on, e.g. when only an image was uploaded.
const NO_TEXT_PLACEHOLDER: &str = "No text";
const MATERIAL_PLACEHOLDER: &str = "Material";

/// The text and media views of a `StudyInput` the modes draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    /// The typed text followed by every attachment's extracted text.
    pub corpus: String,
    /// The first image attachment, as a data URI.
    pub image: Option<String>,
    /// Extracted text of PDF and slide-deck attachments only.
    pub document_text: String,
}

impl PreparedInput {
    pub fn from_input(input: &StudyInput) -> Self {
        let corpus = join_non_empty(
            std::iter::once(input.raw_text.trim()).chain(
                input
                    .attachments
                    .iter()
                    .filter_map(|asset| asset.extracted_text.as_deref()),
            ),
        );

        let image = input
            .attachments
            .iter()
            .find(|asset| asset.kind() == Some(AssetKind::Image))
            .and_then(|asset| asset.inline_data.clone());

        let document_text = join_non_empty(
            input
                .attachments
                .iter()
                .filter(|asset| asset.kind().is_some_and(|kind| kind.is_document()))
                .filter_map(|asset| asset.extracted_text.as_deref()),
        );

        Self {
            corpus,
            image,
            document_text,
        }
    }
}

fn join_non_empty<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|text| !text.is_empty())
}

/// Runs the selected mode over the input bundle.
///
/// Fails with `StudyError::InputMissing` before any generation when there is
/// neither text nor an attachment.
pub async fn dispatch(
    service: &dyn StructuredGenerationService,
    mode: Mode,
    input: &StudyInput,
) -> Result<IntelligenceResult, StudyError> {
    if input.is_empty() {
        return Err(StudyError::InputMissing);
    }

    let prepared = PreparedInput::from_input(input);
    let raw_text = input.raw_text.trim();

    let result = match mode {
        Mode::Survival => {
            let payload = SurvivalInput {
                text_content: non_empty(&prepared.corpus)
                    .unwrap_or(NO_TEXT_PLACEHOLDER)
                    .to_string(),
                image_reference: prepared.image,
            };
            IntelligenceResult::Survival(generate::<Survival>(service, &payload).await?)
        }
        Mode::Weaponizer => {
            let payload = WeaponizerInput {
                text: non_empty(raw_text)
                    .or_else(|| non_empty(&prepared.corpus))
                    .unwrap_or(MATERIAL_PLACEHOLDER)
                    .to_string(),
                image_data_uri: prepared.image,
                document_text_content: non_empty(&prepared.document_text).map(str::to_string),
            };
            IntelligenceResult::Weaponizer(generate::<Weaponizer>(service, &payload).await?)
        }
        Mode::TrapDetector => {
            let payload = TrapDetectorInput {
                study_material: non_empty(&prepared.corpus)
                    .or_else(|| non_empty(raw_text))
                    .unwrap_or(MATERIAL_PLACEHOLDER)
                    .to_string(),
            };
            IntelligenceResult::TrapDetector(generate::<TrapDetector>(service, &payload).await?)
        }
        Mode::McqGenerator => {
            let payload = McqInput {
                study_material_text: non_empty(&prepared.corpus).map(str::to_string),
                study_material_image: prepared.image,
            };
            IntelligenceResult::McqGenerator(generate::<McqGenerator>(service, &payload).await?)
        }
    };

    Ok(result)
}
