//! crates/exam_forge_core/src/generation.rs
//!
//! The generation strategies. Every mode follows the same recipe (render an
//! instruction, call the structured generation service with the mode's output
//! schema, check the result), so the recipe lives in one generic function and
//! each mode only supplies its prompt, schema and rules.

use serde::de::DeserializeOwned;
use std::ops::RangeInclusive;

use crate::domain::Mode;
use crate::error::{GenerationFailure, StudyError};
use crate::ports::{StructuredGenerationService, StructuredPrompt};
use crate::schema::{
    self, McqInput, McqOutput, OutputSchema, SurvivalInput, SurvivalOutput, TrapDetectorInput,
    TrapDetectorOutput, WeaponizerInput, WeaponizerOutput,
};

pub const WEAPONIZER_QUESTION_COUNT: usize = 10;
pub const MCQ_COUNT: RangeInclusive<usize> = 10..=15;
pub const MCQ_OPTION_COUNT: RangeInclusive<usize> = 2..=5;

/// Included in every instruction so math in the source comes back as LaTeX.
const MATH_NOTATION_RULE: &str = r#"CRITICAL: If the material contains any mathematical content (formulas, equations, variables, derivations), ALWAYS use standard LaTeX notation for ALL mathematical expressions.
- Use $...$ for inline math (e.g., $E=mc^2$).
- Use $$...$$ for standalone block math equations.
- Ensure subscripts (a_{n}), superscripts (x^{2}), fractions (\frac{a}{b}), and special symbols (\int, \sum, \alpha) are rendered correctly in LaTeX."#;

const SURVIVAL_TEMPLATE: &str = r#"You are an expert exam strategist and educator, specializing in creating ultra-condensed revision notes for competitive exams.
Your task is to analyze the provided study material and extract the most crucial information for rapid revision.

{math_rule}

Focus on identifying and listing key formulas, important definitions, and critical theorems.
Finally, provide an overall ultra-condensed summary of the material.

Study Material Text:
{text_content}
{visual_reference}
Please ensure the output is concise, accurate, and directly relevant for quick exam preparation."#;

const WEAPONIZER_TEMPLATE: &str = r#"You are an expert AI Exam Strategist. Your task is to analyze the provided study material thoroughly and generate highly relevant, exam-focused intelligence.

{math_rule}

Based on the content, identify and output:
1. **10 Probable Exam Questions**: These should be direct, challenging questions.
2. **Predicted Weightage**: Importance level (High/Medium/Low).
3. **Important Derivations**: Critical derivations, formulas, or step-by-step proofs.
4. **Strategic Study Suggestions**: Practical advice for retention.

Study Material for Analysis:
---
{text}
{document_text}{visual_reference}
Ensure your output adheres strictly to the JSON schema provided, with exactly 10 probable questions."#;

const TRAP_DETECTOR_TEMPLATE: &str = r#"You are an expert educator specializing in competitive exam preparation. Your task is to analyze the provided study material and identify potential "concept traps".

{math_rule}

Analyze the following study material and output:
1.  **Common Mistakes**: Errors students frequently make.
2.  **Misconceptions**: Incorrect understandings students often hold.
3.  **Trick-Based Questions**: Ways this concept can be tested deceptively.
4.  **Frequently Confused Concepts**: Other concepts that are often mixed up with this one.
5.  **Summary**: A brief overview of the identified traps.

Study Material:
{study_material}

Please provide your output in a structured JSON format matching the schema provided."#;

const MCQ_TEMPLATE: &str = r#"You are an expert educator specializing in creating competitive exam questions.
Your task is to generate 10-15 multiple-choice questions (MCQs) based on the provided study material.
The answer of every question must be copied verbatim from its own options.

{math_rule} Apply this to the question, the options, and the explanation.

Study Material:
{text}{image}
Generate the output in JSON format, strictly adhering to the defined output schema."#;

const VISUAL_REFERENCE_NOTE: &str =
    "\nVisual Study Material Reference:\n---\nThe attached image is part of the study material.\n";

//=========================================================================================
// The Strategy Trait
//=========================================================================================

/// One intelligence mode: its payload types, prompt, schema and output rules.
pub trait GenerationMode {
    const MODE: Mode;

    type Input: Send + Sync;
    type Output: DeserializeOwned + Send;

    fn output_schema() -> OutputSchema;

    fn instruction(input: &Self::Input) -> String;

    /// The image the model should look at, if any.
    fn media(_input: &Self::Input) -> Option<&str> {
        None
    }

    fn validate_input(_input: &Self::Input) -> Result<(), StudyError> {
        Ok(())
    }

    /// Checks the rules the schema alone cannot guarantee.
    fn validate_output(_output: &Self::Output) -> Result<(), String> {
        Ok(())
    }
}

/// Runs one mode against the structured generation service.
///
/// The service is called at most once. Any failure yields no output at all.
pub async fn generate<M: GenerationMode>(
    service: &dyn StructuredGenerationService,
    input: &M::Input,
) -> Result<M::Output, StudyError> {
    M::validate_input(input)?;

    let prompt = StructuredPrompt {
        instruction: M::instruction(input),
        media: M::media(input).map(str::to_string),
        schema: M::output_schema(),
    };

    let value = service
        .generate_structured(prompt)
        .await?
        .filter(|value| !value.is_null())
        .ok_or_else(|| {
            StudyError::generation(
                GenerationFailure::EmptyOutput,
                format!("{} returned no output", M::MODE),
            )
        })?;

    let output: M::Output = serde_json::from_value(value)
        .map_err(|e| StudyError::generation(GenerationFailure::MalformedOutput, e.to_string()))?;

    M::validate_output(&output)
        .map_err(|detail| StudyError::generation(GenerationFailure::ConstraintViolated, detail))?;

    Ok(output)
}

/// Fills the `{name}` placeholders of a template in one pass.
///
/// `{math_rule}` is always available. Inserted values are never scanned
/// again, so placeholder-shaped user text is sent as typed.
fn render(template: &str, fields: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let field = std::iter::once(("math_rule", MATH_NOTATION_RULE))
            .chain(fields.iter().copied())
            .find(|(name, _)| {
                tail.strip_prefix(name)
                    .is_some_and(|after| after.starts_with('}'))
            });

        match field {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

fn visual_reference(image: Option<&String>) -> &'static str {
    if image.is_some() {
        VISUAL_REFERENCE_NOTE
    } else {
        ""
    }
}

//=========================================================================================
// The Four Modes
//=========================================================================================

pub struct Survival;

impl GenerationMode for Survival {
    const MODE: Mode = Mode::Survival;
    type Input = SurvivalInput;
    type Output = SurvivalOutput;

    fn output_schema() -> OutputSchema {
        schema::survival_schema()
    }

    fn instruction(input: &SurvivalInput) -> String {
        render(
            SURVIVAL_TEMPLATE,
            &[
                ("text_content", input.text_content.as_str()),
                ("visual_reference", visual_reference(input.image_reference.as_ref())),
            ],
        )
    }

    fn media(input: &SurvivalInput) -> Option<&str> {
        input.image_reference.as_deref()
    }
}

pub struct Weaponizer;

impl GenerationMode for Weaponizer {
    const MODE: Mode = Mode::Weaponizer;
    type Input = WeaponizerInput;
    type Output = WeaponizerOutput;

    fn output_schema() -> OutputSchema {
        schema::weaponizer_schema()
    }

    fn instruction(input: &WeaponizerInput) -> String {
        let document_text = input
            .document_text_content
            .as_ref()
            .map(|text| {
                format!("\nAdditional Extracted Text from Documents (PDF/PPTX):\n---\n{text}\n")
            })
            .unwrap_or_default();

        render(
            WEAPONIZER_TEMPLATE,
            &[
                ("text", input.text.as_str()),
                ("document_text", document_text.as_str()),
                ("visual_reference", visual_reference(input.image_data_uri.as_ref())),
            ],
        )
    }

    fn media(input: &WeaponizerInput) -> Option<&str> {
        input.image_data_uri.as_deref()
    }

    fn validate_output(output: &WeaponizerOutput) -> Result<(), String> {
        let count = output.probable_questions.len();
        if count != WEAPONIZER_QUESTION_COUNT {
            return Err(format!(
                "expected {WEAPONIZER_QUESTION_COUNT} probable questions, got {count}"
            ));
        }
        Ok(())
    }
}

pub struct TrapDetector;

impl GenerationMode for TrapDetector {
    const MODE: Mode = Mode::TrapDetector;
    type Input = TrapDetectorInput;
    type Output = TrapDetectorOutput;

    fn output_schema() -> OutputSchema {
        schema::trap_detector_schema()
    }

    fn instruction(input: &TrapDetectorInput) -> String {
        render(
            TRAP_DETECTOR_TEMPLATE,
            &[("study_material", input.study_material.as_str())],
        )
    }
}

pub struct McqGenerator;

impl GenerationMode for McqGenerator {
    const MODE: Mode = Mode::McqGenerator;
    type Input = McqInput;
    type Output = McqOutput;

    fn output_schema() -> OutputSchema {
        schema::mcq_schema()
    }

    fn instruction(input: &McqInput) -> String {
        let text = input
            .study_material_text
            .as_ref()
            .map(|text| format!("Text:\n{text}\n"))
            .unwrap_or_default();
        let image = if input.study_material_image.is_some() {
            "\nImage: the attached image.\n"
        } else {
            ""
        };

        render(MCQ_TEMPLATE, &[("text", text.as_str()), ("image", image)])
    }

    fn media(input: &McqInput) -> Option<&str> {
        input.study_material_image.as_deref()
    }

    fn validate_input(input: &McqInput) -> Result<(), StudyError> {
        let has_text = input
            .study_material_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());
        if !has_text && input.study_material_image.is_none() {
            return Err(StudyError::InputMissing);
        }
        Ok(())
    }

    fn validate_output(output: &McqOutput) -> Result<(), String> {
        if !MCQ_COUNT.contains(&output.mcqs.len()) {
            return Err(format!(
                "expected {}-{} questions, got {}",
                MCQ_COUNT.start(),
                MCQ_COUNT.end(),
                output.mcqs.len()
            ));
        }

        for (index, mcq) in output.mcqs.iter().enumerate() {
            if !MCQ_OPTION_COUNT.contains(&mcq.options.len()) {
                return Err(format!(
                    "question {} has {} options",
                    index + 1,
                    mcq.options.len()
                ));
            }
            let answer = mcq.answer.trim();
            if !mcq.options.iter().any(|option| option.trim() == answer) {
                return Err(format!(
                    "answer of question {} is not one of its options",
                    index + 1
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mcq_payload, trap_payload, weaponizer_payload, FakeGenerator};
    use serde_json::json;

    #[tokio::test]
    async fn instruction_carries_the_math_rule() {
        let generator = FakeGenerator::returning(trap_payload());
        let input = TrapDetectorInput {
            study_material: "Newton's laws".into(),
        };

        generate::<TrapDetector>(&generator, &input).await.unwrap();

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.instruction.contains("Use $...$ for inline math"));
        assert!(prompt.instruction.contains("Use $$...$$ for standalone block math"));
        assert!(prompt.instruction.contains("Newton's laws"));
        assert!(!prompt.instruction.contains("{math_rule}"));
        assert_eq!(prompt.schema.name, "concept_trap_detector_output");
        assert_eq!(prompt.media, None);
    }

    #[tokio::test]
    async fn weaponizer_embeds_document_text_and_image() {
        let generator = FakeGenerator::returning(weaponizer_payload(10));
        let input = WeaponizerInput {
            text: "Thermodynamics".into(),
            image_data_uri: Some("data:image/png;base64,AAAA".into()),
            document_text_content: Some("[Content of PDF: heat.pdf]".into()),
        };

        let output = generate::<Weaponizer>(&generator, &input).await.unwrap();
        assert_eq!(output.probable_questions.len(), 10);

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.instruction.contains("Additional Extracted Text from Documents"));
        assert!(prompt.instruction.contains("[Content of PDF: heat.pdf]"));
        assert!(prompt.instruction.contains("Visual Study Material Reference"));
        assert_eq!(prompt.media.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[tokio::test]
    async fn weaponizer_rejects_anything_but_ten_questions() {
        let generator = FakeGenerator::returning(weaponizer_payload(9));
        let input = WeaponizerInput {
            text: "Optics".into(),
            image_data_uri: None,
            document_text_content: None,
        };

        let err = generate::<Weaponizer>(&generator, &input).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(GenerationFailure::ConstraintViolated));
    }

    #[tokio::test]
    async fn empty_output_is_a_generation_failure() {
        let generator = FakeGenerator::empty();
        let input = SurvivalInput {
            text_content: "Cells".into(),
            image_reference: None,
        };

        let err = generate::<Survival>(&generator, &input).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(GenerationFailure::EmptyOutput));
    }

    #[tokio::test]
    async fn output_of_the_wrong_shape_is_malformed() {
        let generator = FakeGenerator::returning(json!({ "revisionSummary": 42 }));
        let input = SurvivalInput {
            text_content: "Cells".into(),
            image_reference: None,
        };

        let err = generate::<Survival>(&generator, &input).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(GenerationFailure::MalformedOutput));
    }

    #[tokio::test]
    async fn service_errors_surface_as_unavailable() {
        let generator = FakeGenerator::failing();
        let input = SurvivalInput {
            text_content: "Cells".into(),
            image_reference: None,
        };

        let err = generate::<Survival>(&generator, &input).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(GenerationFailure::ServiceUnavailable));
    }

    #[tokio::test]
    async fn mcq_accepts_an_image_without_text() {
        let generator = FakeGenerator::returning(mcq_payload(12));
        let input = McqInput {
            study_material_text: None,
            study_material_image: Some("data:image/jpeg;base64,AAAA".into()),
        };

        let output = generate::<McqGenerator>(&generator, &input).await.unwrap();
        assert_eq!(output.mcqs.len(), 12);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn mcq_without_text_or_image_never_reaches_the_service() {
        let generator = FakeGenerator::returning(mcq_payload(12));
        let input = McqInput {
            study_material_text: Some("   ".into()),
            study_material_image: None,
        };

        let err = generate::<McqGenerator>(&generator, &input).await.unwrap_err();
        assert!(matches!(err, StudyError::InputMissing));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn mcq_answer_must_be_one_of_its_options() {
        let mut payload = mcq_payload(10);
        payload["mcqs"][3]["answer"] = json!("None of the above");
        let generator = FakeGenerator::returning(payload);
        let input = McqInput {
            study_material_text: Some("Photosynthesis".into()),
            study_material_image: None,
        };

        let err = generate::<McqGenerator>(&generator, &input).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(GenerationFailure::ConstraintViolated));
    }

    #[test]
    fn mcq_rules_cover_counts_and_option_bounds() {
        let too_few: McqOutput = serde_json::from_value(mcq_payload(9)).unwrap();
        assert!(McqGenerator::validate_output(&too_few).is_err());

        let too_many: McqOutput = serde_json::from_value(mcq_payload(16)).unwrap();
        assert!(McqGenerator::validate_output(&too_many).is_err());

        let mut one_option: McqOutput = serde_json::from_value(mcq_payload(10)).unwrap();
        one_option.mcqs[0].options.truncate(1);
        one_option.mcqs[0].answer = one_option.mcqs[0].options[0].clone();
        assert!(McqGenerator::validate_output(&one_option).is_err());

        let fine: McqOutput = serde_json::from_value(mcq_payload(15)).unwrap();
        assert!(McqGenerator::validate_output(&fine).is_ok());
    }

    #[test]
    fn placeholder_shaped_user_text_is_sent_as_typed() {
        let instruction = Weaponizer::instruction(&WeaponizerInput {
            text: "Optics {math_rule}".into(),
            image_data_uri: None,
            document_text_content: Some("[Content of PDF: {text}.pdf]".into()),
        });

        assert!(instruction.contains("---\nOptics {math_rule}\n"));
        assert!(instruction.contains("[Content of PDF: {text}.pdf]"));
        assert_eq!(instruction.matches("CRITICAL: If the material").count(), 1);

        let mcq = McqGenerator::instruction(&McqInput {
            study_material_text: Some("Sets {image} and {}".into()),
            study_material_image: None,
        });
        assert!(mcq.contains("Text:\nSets {image} and {}\n"));
        assert!(!mcq.contains("the attached image"));
    }

    #[test]
    fn render_leaves_unknown_braces_alone() {
        let rendered = render("a {x} {unknown} {", &[("x", "{y}"), ("y", "no")]);
        assert_eq!(rendered, "a {y} {unknown} {");
    }

    #[test]
    fn survival_instruction_mentions_the_image_only_when_present() {
        let without = Survival::instruction(&SurvivalInput {
            text_content: "No text".into(),
            image_reference: None,
        });
        assert!(!without.contains("Visual Study Material Reference"));

        let with = Survival::instruction(&SurvivalInput {
            text_content: "No text".into(),
            image_reference: Some("data:image/png;base64,AAAA".into()),
        });
        assert!(with.contains("Visual Study Material Reference"));
    }
}
