//! crates/exam_forge_core/src/schema.rs
//!
//! Typed input and output shapes for every intelligence mode, plus the JSON
//! schemas handed to the structured generation service.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::Mode;

//=========================================================================================
// Mode Inputs
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurvivalInput {
    /// Combined text from the typed notes and every attachment.
    pub text_content: String,
    pub image_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponizerInput {
    pub text: String,
    pub image_data_uri: Option<String>,
    /// Text extracted from PDFs or slide decks, kept apart from `text`.
    pub document_text_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapDetectorInput {
    pub study_material: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqInput {
    pub study_material_text: Option<String>,
    pub study_material_image: Option<String>,
}

//=========================================================================================
// Mode Outputs
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalOutput {
    pub revision_summary: String,
    pub key_formulas: Vec<String>,
    pub important_definitions: Vec<String>,
    pub critical_theorems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponizerOutput {
    pub probable_questions: Vec<String>,
    pub predicted_weightage: String,
    pub important_derivations: Vec<String>,
    pub strategic_study_suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapDetectorOutput {
    pub common_mistakes: Vec<String>,
    pub misconceptions: Vec<String>,
    pub trick_questions: Vec<String>,
    pub frequently_confused_concepts: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mcq {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOutput {
    pub mcqs: Vec<Mcq>,
}

/// The output of one generation, tagged with the mode that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "result", rename_all = "kebab-case")]
pub enum IntelligenceResult {
    Survival(SurvivalOutput),
    Weaponizer(WeaponizerOutput),
    TrapDetector(TrapDetectorOutput),
    McqGenerator(McqOutput),
}

impl IntelligenceResult {
    pub fn mode(&self) -> Mode {
        match self {
            IntelligenceResult::Survival(_) => Mode::Survival,
            IntelligenceResult::Weaponizer(_) => Mode::Weaponizer,
            IntelligenceResult::TrapDetector(_) => Mode::TrapDetector,
            IntelligenceResult::McqGenerator(_) => Mode::McqGenerator,
        }
    }

    /// Serializes only the mode-specific payload, without the tag.
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            IntelligenceResult::Survival(output) => serde_json::to_value(output),
            IntelligenceResult::Weaponizer(output) => serde_json::to_value(output),
            IntelligenceResult::TrapDetector(output) => serde_json::to_value(output),
            IntelligenceResult::McqGenerator(output) => serde_json::to_value(output),
        }
    }

    /// Rebuilds a result from a stored payload and the mode it was stored under.
    pub fn from_payload(mode: Mode, payload: Value) -> serde_json::Result<Self> {
        Ok(match mode {
            Mode::Survival => IntelligenceResult::Survival(serde_json::from_value(payload)?),
            Mode::Weaponizer => IntelligenceResult::Weaponizer(serde_json::from_value(payload)?),
            Mode::TrapDetector => {
                IntelligenceResult::TrapDetector(serde_json::from_value(payload)?)
            }
            Mode::McqGenerator => {
                IntelligenceResult::McqGenerator(serde_json::from_value(payload)?)
            }
        })
    }
}

//=========================================================================================
// Output JSON Schemas
//=========================================================================================

/// A named JSON schema describing the object the model must return.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

fn text(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn text_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

/// A closed object: every property listed is required and nothing else is allowed.
fn closed_object(properties: &[(&str, Value)]) -> Value {
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    let properties: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

pub fn survival_schema() -> OutputSchema {
    OutputSchema {
        name: "survival_mode_output",
        description: "Ultra-condensed revision notes for rapid exam revision.",
        schema: closed_object(&[
            ("revisionSummary", text("An ultra-condensed revision summary of the provided study material.")),
            ("keyFormulas", text_list("A list of key formulas extracted from the study material.")),
            ("importantDefinitions", text_list("A list of important definitions extracted from the study material.")),
            ("criticalTheorems", text_list("A list of critical theorems extracted from the study material.")),
        ]),
    }
}

pub fn weaponizer_schema() -> OutputSchema {
    let mut questions = text_list("A list of 10 probable exam questions based on the study material.");
    questions["minItems"] = json!(10);
    questions["maxItems"] = json!(10);

    OutputSchema {
        name: "exam_weaponizer_output",
        description: "Predicted exam questions, weightage, derivations and study strategy.",
        schema: closed_object(&[
            ("probableQuestions", questions),
            ("predictedWeightage", text("The predicted weightage of this topic in an exam, e.g. High, Medium or Low.")),
            ("importantDerivations", text_list("Important derivations, formulas, or step-by-step problem-solving methods.")),
            ("strategicStudySuggestions", text_list("Strategic study suggestions tailored to the provided material.")),
        ]),
    }
}

pub fn trap_detector_schema() -> OutputSchema {
    OutputSchema {
        name: "concept_trap_detector_output",
        description: "Common mistakes, misconceptions and trick questions for the material.",
        schema: closed_object(&[
            ("commonMistakes", text_list("A list of common mistakes related to the study material.")),
            ("misconceptions", text_list("A list of misconceptions frequently encountered with this topic.")),
            ("trickQuestions", text_list("A list of trick-based questions or tricky aspects related to the study material.")),
            ("frequentlyConfusedConcepts", text_list("A list of concepts that are often confused with each other.")),
            ("summary", text("A brief summary of the overall concept traps identified.")),
        ]),
    }
}

pub fn mcq_schema() -> OutputSchema {
    let mut options = text_list("An array of possible answer options for the MCQ.");
    options["minItems"] = json!(2);
    options["maxItems"] = json!(5);

    let mcq = closed_object(&[
        ("question", text("The multiple-choice question.")),
        ("options", options),
        ("answer", text("The correct answer option (must be one of the options).")),
        ("explanation", text("A short explanation for the correct answer.")),
    ]);

    OutputSchema {
        name: "mcq_generator_output",
        description: "Multiple-choice questions of mixed difficulty.",
        schema: closed_object(&[(
            "mcqs",
            json!({
                "type": "array",
                "items": mcq,
                "minItems": 10,
                "maxItems": 15,
                "description": "An array of 10-15 multiple-choice questions of mixed difficulty.",
            }),
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_mode_tag_and_camel_case_fields() {
        let result = IntelligenceResult::TrapDetector(TrapDetectorOutput {
            common_mistakes: vec!["sign errors".into()],
            misconceptions: vec![],
            trick_questions: vec![],
            frequently_confused_concepts: vec![],
            summary: "watch the signs".into(),
        });

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["mode"], "trap-detector");
        assert_eq!(value["result"]["commonMistakes"][0], "sign errors");
    }

    #[test]
    fn payload_can_be_restored_under_its_mode() {
        let result = IntelligenceResult::Survival(SurvivalOutput {
            revision_summary: "X".into(),
            key_formulas: vec!["a=b".into()],
            important_definitions: vec![],
            critical_theorems: vec![],
        });

        let payload = result.payload().unwrap();
        assert!(payload.get("mode").is_none());
        let restored = IntelligenceResult::from_payload(Mode::Survival, payload.clone()).unwrap();
        assert_eq!(restored, result);
        assert!(IntelligenceResult::from_payload(Mode::McqGenerator, payload).is_err());
    }

    #[test]
    fn schemas_require_every_declared_property() {
        let schema = trap_detector_schema().schema;
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(schema["additionalProperties"], false);

        let mcq = mcq_schema().schema;
        assert_eq!(mcq["properties"]["mcqs"]["minItems"], 10);
        assert_eq!(mcq["properties"]["mcqs"]["items"]["properties"]["options"]["maxItems"], 5);
    }
}
