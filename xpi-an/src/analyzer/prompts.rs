//! Prompt text and output schemas for the analysis model calls

use serde_json::{json, Value};
use xpi_common::db::AnswerChoice;

use super::step::{AnalysisResult, StepInput};
use crate::llm::OutputSchema;

pub const STEP_SCHEMA_NAME: &str = "step_judgment";
pub const SUMMARY_SCHEMA_NAME: &str = "session_synthesis";

/// Schema for a single question judgment
///
/// Strict structured outputs reject `minimum`/`maximum`, so the severity
/// range is stated in the prompt and clamped after parsing.
pub fn step_schema() -> OutputSchema {
    OutputSchema {
        name: STEP_SCHEMA_NAME,
        schema: json!({
            "type": "object",
            "properties": {
                "WINNER_FLAG": { "type": "string", "enum": ["A", "B", "TIED"] },
                "SEVERITY_SCORE": { "type": "number" },
                "RATIONALE_DIGEST": { "type": "string" },
                "KNOWLEDGE_GAPS": { "type": "array", "items": { "type": "string" } },
                "PROMPT_SUGGESTIONS": { "type": "array", "items": { "type": "string" } }
            },
            "required": [
                "WINNER_FLAG",
                "SEVERITY_SCORE",
                "RATIONALE_DIGEST",
                "KNOWLEDGE_GAPS",
                "PROMPT_SUGGESTIONS"
            ],
            "additionalProperties": false
        }),
    }
}

/// Schema for the cross-question synthesis
pub fn summary_schema() -> OutputSchema {
    OutputSchema {
        name: SUMMARY_SCHEMA_NAME,
        schema: json!({
            "type": "object",
            "properties": {
                "TOP_KNOWLEDGE_GAPS": { "type": "array", "items": { "type": "string" } },
                "CROSS_QUESTION_PROMPT_SUGGESTIONS": { "type": "array", "items": { "type": "string" } },
                "SUMMARY": { "type": "string" }
            },
            "required": ["TOP_KNOWLEDGE_GAPS", "CROSS_QUESTION_PROMPT_SUGGESTIONS", "SUMMARY"],
            "additionalProperties": false
        }),
    }
}

fn format_instructions(schema: &Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "Respond with a single JSON object that conforms to this JSON schema, without any surrounding text:\n{}",
        rendered
    )
}

/// Build the system prompt for judging one expert answer
pub fn step_prompt(input: &StepInput, conversation: &str) -> String {
    let choice = input
        .preferred_answer
        .as_ref()
        .map(AnswerChoice::as_str)
        .unwrap_or("None selected yet");

    format!(
        r#"You are an expert AI system analysis tool that evaluates interview responses.

Analyze this expert interview transcript where an expert evaluates two answers to a technical question.

QUESTION: {question}

ANSWER A: {answer_a}

ANSWER B: {answer_b}

EXPERT'S CHOICE: {choice}

INTERVIEW TRANSCRIPT:
{conversation}

Analyze this expert feedback and determine:

1. WINNER_FLAG: Simply output the expert's selection (A or B) based on their explicit choice.

2. SEVERITY_SCORE: On a scale from 0.0 to 1.0, how much better is the chosen answer?
   - 0.0 means both answers are equally valid
   - 1.0 means the chosen answer is significantly better and the other answer contains critical errors

3. RATIONALE_DIGEST: Summarize the expert's reasoning for their preference in 1-2 sentences.

4. KNOWLEDGE_GAPS: Identify 2-3 specific knowledge areas where improvement would lead to better answers.

5. PROMPT_SUGGESTIONS: Instead of specific facts, provide 2-3 general principles or approaches for improving prompts related to this type of question. Focus on structural or methodological improvements rather than adding specific domain knowledge.

{instructions}
"#,
        question = input.question_text,
        answer_a = input.answer_a,
        answer_b = input.answer_b,
        choice = choice,
        conversation = conversation,
        instructions = format_instructions(&step_schema().schema),
    )
}

/// Build the system prompt for the cross-question synthesis
pub fn summary_prompt(results: &[AnalysisResult]) -> String {
    let analyses = results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "Question {}:\nWinner: {}\nSeverity: {}\nRationale: {}\nKnowledge Gaps: {}\nPrompt Suggestions: {}\n",
                index + 1,
                result.winner_flag,
                result.severity_score,
                result.rationale_digest,
                result.knowledge_gaps.join(", "),
                result.prompt_suggestions.join(", "),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an AI analysis tool that evaluates patterns across multiple interview questions.

Review the following analysis results from {count} questions in an expert interview session:

{analyses}

Based on these analyses, identify:

1. TOP_KNOWLEDGE_GAPS: Identify 3-5 key knowledge areas that appear as gaps across multiple questions or represent the most critical gaps.

2. CROSS_QUESTION_PROMPT_SUGGESTIONS: Create 3-5 general prompt improvement suggestions that would apply across all questions, not just individual ones. Focus on structural improvements, methodological approaches, or general principles rather than specific facts.

3. SUMMARY: Provide a brief overall assessment of this interview session (2-3 sentences).

{instructions}
"#,
        count = results.len(),
        analyses = analyses,
        instructions = format_instructions(&summary_schema().schema),
    )
}
