//! Per-question judgment

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use xpi_common::db::{AnswerChoice, WinnerFlag};
use xpi_common::{Message, Transcript};

use super::prompts;
use crate::llm::{parse_structured, ChatModel, ChatRequest, LlmError};

pub const FALLBACK_SEVERITY: f64 = 0.5;
pub const FALLBACK_RATIONALE: &str = "Analysis failed due to an error.";
pub const FALLBACK_GAP: &str = "Analysis error";
pub const FALLBACK_SUGGESTION: &str = "Retry analysis";

/// A step record joined with its question pair
#[derive(Debug, Clone)]
pub struct StepInput {
    pub step_record_id: Uuid,
    pub question_pair_id: Uuid,
    pub preferred_answer: Option<AnswerChoice>,
    pub transcript: Transcript,
    pub question_text: String,
    pub answer_a: String,
    pub answer_b: String,
}

/// Model judgment for one step record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub winner_flag: WinnerFlag,
    pub severity_score: f64,
    pub rationale_digest: String,
    pub knowledge_gaps: Vec<String>,
    pub prompt_suggestions: Vec<String>,
}

impl AnalysisResult {
    /// Result recorded when the model call or its parsing fails
    pub fn fallback(preferred: Option<AnswerChoice>) -> Self {
        Self {
            winner_flag: preferred.map(WinnerFlag::from).unwrap_or(WinnerFlag::Tied),
            severity_score: FALLBACK_SEVERITY,
            rationale_digest: FALLBACK_RATIONALE.to_string(),
            knowledge_gaps: vec![FALLBACK_GAP.to_string()],
            prompt_suggestions: vec![FALLBACK_SUGGESTION.to_string()],
        }
    }
}

/// Reply shape declared in [`prompts::step_schema`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct StepJudgment {
    winner_flag: WinnerFlag,
    severity_score: f64,
    rationale_digest: String,
    knowledge_gaps: Vec<String>,
    prompt_suggestions: Vec<String>,
}

impl TryFrom<StepJudgment> for AnalysisResult {
    type Error = LlmError;

    fn try_from(judgment: StepJudgment) -> Result<Self, LlmError> {
        if !judgment.severity_score.is_finite() {
            return Err(LlmError::Parse(format!(
                "SEVERITY_SCORE is not a finite number: {}",
                judgment.severity_score
            )));
        }

        Ok(Self {
            winner_flag: judgment.winner_flag,
            severity_score: judgment.severity_score.clamp(0.0, 1.0),
            rationale_digest: judgment.rationale_digest,
            knowledge_gaps: judgment.knowledge_gaps,
            prompt_suggestions: judgment.prompt_suggestions,
        })
    }
}

async fn request_judgment(model: &dyn ChatModel, input: &StepInput) -> Result<AnalysisResult, LlmError> {
    let conversation = input.transcript.flatten();
    let request = ChatRequest {
        messages: vec![Message::new("system", prompts::step_prompt(input, &conversation))],
        schema: prompts::step_schema(),
    };

    let reply = model.complete(request).await?;
    let judgment: StepJudgment = parse_structured(&reply)?;
    judgment.try_into()
}

/// Judge one step record; model or parse failures yield the fallback result
pub async fn analyze_step(model: &dyn ChatModel, input: &StepInput) -> AnalysisResult {
    match request_judgment(model, input).await {
        Ok(result) => {
            debug!(
                step_record_id = %input.step_record_id,
                winner = %result.winner_flag,
                severity = result.severity_score,
                "Step judged"
            );
            result
        }
        Err(e) => {
            warn!(
                step_record_id = %input.step_record_id,
                error = %e,
                "Step analysis failed, using fallback result"
            );
            AnalysisResult::fallback(input.preferred_answer)
        }
    }
}
