//! crates/exam_forge_core/src/report.rs
//!
//! Renders a result as a downloadable Markdown report.

use chrono::{DateTime, Utc};

use crate::domain::Mode;
use crate::schema::IntelligenceResult;

pub const REPORT_TITLE: &str = "# ExamForge AI Intelligence Report";

/// `ExamForge_Intelligence_<mode>_<unix millis>.md`
pub fn report_file_name(mode: Mode, generated_at: DateTime<Utc>) -> String {
    format!(
        "ExamForge_Intelligence_{}_{}.md",
        mode,
        generated_at.timestamp_millis()
    )
}

fn mode_label(mode: Mode) -> String {
    mode.as_str().replace('-', " ").to_uppercase()
}

fn list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders one section per output field, headed by the mode and timestamp.
pub fn render_report(result: &IntelligenceResult, generated_at: DateTime<Utc>) -> String {
    let mut content = format!("{REPORT_TITLE}\n\n");
    content.push_str(&format!("**Mode:** {}\n", mode_label(result.mode())));
    content.push_str(&format!(
        "**Date:** {}\n\n---\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    match result {
        IntelligenceResult::Survival(output) => {
            content.push_str(&format!("## Revision Summary\n{}\n\n", output.revision_summary));
            content.push_str(&format!("## Key Formulas\n{}\n\n", list(&output.key_formulas)));
            content.push_str(&format!(
                "## Important Definitions\n{}\n\n",
                list(&output.important_definitions)
            ));
            content.push_str(&format!(
                "## Critical Theorems\n{}\n",
                list(&output.critical_theorems)
            ));
        }
        IntelligenceResult::Weaponizer(output) => {
            content.push_str(&format!(
                "## Probable Questions\n{}\n\n",
                list(&output.probable_questions)
            ));
            content.push_str(&format!(
                "## Predicted Weightage\n**{}**\n\n",
                output.predicted_weightage
            ));
            content.push_str(&format!(
                "## Important Derivations\n{}\n\n",
                list(&output.important_derivations)
            ));
            content.push_str(&format!(
                "## Strategic Suggestions\n{}\n",
                list(&output.strategic_study_suggestions)
            ));
        }
        IntelligenceResult::TrapDetector(output) => {
            content.push_str(&format!("## Common Mistakes\n{}\n\n", list(&output.common_mistakes)));
            content.push_str(&format!("## Misconceptions\n{}\n\n", list(&output.misconceptions)));
            content.push_str(&format!(
                "## Frequently Confused Concepts\n{}\n\n",
                list(&output.frequently_confused_concepts)
            ));
            content.push_str(&format!("## Trick Questions\n{}\n\n", list(&output.trick_questions)));
            content.push_str(&format!("## Summary\n{}\n", output.summary));
        }
        IntelligenceResult::McqGenerator(output) => {
            content.push_str("## Practice MCQs\n\n");
            for (index, mcq) in output.mcqs.iter().enumerate() {
                content.push_str(&format!("### Q{}: {}\n", index + 1, mcq.question));
                for (letter, option) in ('A'..='Z').zip(&mcq.options) {
                    content.push_str(&format!("{letter}) {option}\n"));
                }
                content.push_str(&format!("**Answer:** {}\n", mcq.answer));
                content.push_str(&format!("**Explanation:** {}\n\n", mcq.explanation));
            }
        }
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Mcq, McqOutput, SurvivalOutput, TrapDetectorOutput};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn section<'a>(report: &'a str, header: &str) -> &'a str {
        let start = report.find(header).expect("section missing") + header.len();
        let rest = &report[start..];
        rest.find("\n## ").map_or(rest, |end| &rest[..end])
    }

    #[test]
    fn survival_report_lists_formulas_and_keeps_empty_sections() {
        let result = IntelligenceResult::Survival(SurvivalOutput {
            revision_summary: "X".into(),
            key_formulas: vec!["a=b".into()],
            important_definitions: vec![],
            critical_theorems: vec![],
        });

        let report = render_report(&result, at());
        assert!(report.starts_with(REPORT_TITLE));
        assert!(report.contains("**Mode:** SURVIVAL\n"));
        assert!(report.contains("**Date:** 2026-03-14 09:26:53 UTC"));
        assert!(section(&report, "## Key Formulas\n").contains("- a=b"));
        assert!(report.contains("## Important Definitions\n"));
        assert!(!section(&report, "## Important Definitions\n").contains("- "));
        assert!(section(&report, "## Revision Summary\n").starts_with("X"));
    }

    #[test]
    fn trap_report_uses_spaced_upper_case_mode() {
        let result = IntelligenceResult::TrapDetector(TrapDetectorOutput {
            common_mistakes: vec!["Forgetting units".into()],
            misconceptions: vec![],
            trick_questions: vec![],
            frequently_confused_concepts: vec![],
            summary: "Check units.".into(),
        });

        let report = render_report(&result, at());
        assert!(report.contains("**Mode:** TRAP DETECTOR\n"));
        assert!(report.ends_with("## Summary\nCheck units.\n"));
    }

    #[test]
    fn mcq_report_letters_the_options() {
        let result = IntelligenceResult::McqGenerator(McqOutput {
            mcqs: vec![Mcq {
                question: "What is $2+2$?".into(),
                options: vec!["3".into(), "4".into()],
                answer: "4".into(),
                explanation: "Basic addition.".into(),
            }],
        });

        let report = render_report(&result, at());
        assert!(report.contains("### Q1: What is $2+2$?\nA) 3\nB) 4\n**Answer:** 4\n"));
        assert!(report.contains("**Explanation:** Basic addition.\n"));
    }

    #[test]
    fn file_name_carries_mode_and_millis() {
        assert_eq!(
            report_file_name(Mode::McqGenerator, at()),
            format!("ExamForge_Intelligence_mcq-generator_{}.md", at().timestamp_millis())
        );
    }
}
