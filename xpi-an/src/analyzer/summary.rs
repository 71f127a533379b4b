//! Session-level aggregation
//!
//! Statistics (question count, mean severity) are always computed locally.
//! Gaps, suggestions and feedback text come from a model synthesis when it
//! succeeds, otherwise from frequency ranking of the per-step lists.

use serde::Deserialize;
use tracing::warn;
use xpi_common::db::{AggregatedInsights, GapCount, SuggestionCount};
use xpi_common::Message;

use super::prompts;
use super::step::AnalysisResult;
use crate::llm::{parse_structured, ChatModel, ChatRequest, LlmError};

/// Number of entries kept by the frequency ranking
pub const TOP_N: usize = 5;

pub const NO_RESULTS_FEEDBACK: &str = "No analysis results available.";
pub const STATISTICAL_HEADER: &str = "Interview session analysis summary (statistical aggregation):";

/// Where the summary's gaps, suggestions and feedback came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Model,
    Statistical,
    Empty,
}

/// Summary ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDraft {
    pub insights: AggregatedInsights,
    pub overall_feedback: String,
    pub source: SummarySource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SessionSynthesis {
    top_knowledge_gaps: Vec<String>,
    cross_question_prompt_suggestions: Vec<String>,
    summary: String,
}

/// Mean severity, 0 for an empty slice
pub fn average_severity(results: &[AnalysisResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.severity_score).sum::<f64>() / results.len() as f64
}

/// Matching key for gap and suggestion labels
fn label_key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Rank labels by occurrence count, descending, matching case-insensitively
///
/// Each entry keeps the first-seen spelling; ties keep first-seen order.
pub fn rank_by_frequency<'a, I>(items: I, limit: usize) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut counts: Vec<(String, String, usize)> = Vec::new();
    for item in items {
        let key = label_key(item);
        if key.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(seen, _, _)| *seen == key) {
            Some((_, _, count)) => *count += 1,
            None => counts.push((key, item.trim().to_string(), 1)),
        }
    }
    // Stable sort keeps insertion order among equal counts
    counts.sort_by(|a, b| b.2.cmp(&a.2));
    counts
        .into_iter()
        .take(limit)
        .map(|(_, label, count)| (label, count))
        .collect()
}

/// Occurrences of `label` among the raw per-step entries (case-insensitive), at least 1
fn occurrences<'a, I>(label: &str, raw: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    let needle = label_key(label);
    raw.into_iter()
        .filter(|entry| label_key(entry) == needle)
        .count()
        .max(1)
}

fn statistical_feedback(insights: &AggregatedInsights) -> String {
    let gaps = insights
        .top_knowledge_gaps
        .iter()
        .map(|g| g.gap.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let suggestions = insights
        .top_prompt_suggestions
        .iter()
        .map(|s| s.suggestion.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\n- Total questions analyzed: {}\n- Average severity score: {:.2}\n- Top knowledge gaps: {}\n- Top prompt improvement suggestions: {}",
        STATISTICAL_HEADER,
        insights.question_count,
        insights.average_severity_score,
        gaps,
        suggestions
    )
}

/// Build the summary from frequency ranking alone
pub fn statistical_summary(results: &[AnalysisResult]) -> SummaryDraft {
    let insights = AggregatedInsights {
        question_count: results.len(),
        average_severity_score: average_severity(results),
        top_knowledge_gaps: rank_by_frequency(results.iter().flat_map(|r| &r.knowledge_gaps), TOP_N)
            .into_iter()
            .map(|(gap, count)| GapCount { gap, count })
            .collect(),
        top_prompt_suggestions: rank_by_frequency(
            results.iter().flat_map(|r| &r.prompt_suggestions),
            TOP_N,
        )
        .into_iter()
        .map(|(suggestion, count)| SuggestionCount { suggestion, count })
        .collect(),
    };

    let overall_feedback = statistical_feedback(&insights);
    SummaryDraft {
        insights,
        overall_feedback,
        source: SummarySource::Statistical,
    }
}

async fn request_synthesis(
    model: &dyn ChatModel,
    results: &[AnalysisResult],
) -> Result<SessionSynthesis, LlmError> {
    let request = ChatRequest {
        messages: vec![Message::new("system", prompts::summary_prompt(results))],
        schema: prompts::summary_schema(),
    };
    let reply = model.complete(request).await?;
    let synthesis: SessionSynthesis = parse_structured(&reply)?;
    if synthesis.summary.trim().is_empty() {
        return Err(LlmError::Parse("SUMMARY is empty".to_string()));
    }
    Ok(synthesis)
}

/// Summarize a session's step results
///
/// Makes no model call when `results` is empty.
pub async fn summarize(model: &dyn ChatModel, results: &[AnalysisResult]) -> SummaryDraft {
    if results.is_empty() {
        return SummaryDraft {
            insights: AggregatedInsights::empty(),
            overall_feedback: NO_RESULTS_FEEDBACK.to_string(),
            source: SummarySource::Empty,
        };
    }

    let synthesis = match request_synthesis(model, results).await {
        Ok(synthesis) => synthesis,
        Err(e) => {
            warn!(error = %e, "Session synthesis failed, using statistical aggregation");
            return statistical_summary(results);
        }
    };

    let raw_gaps: Vec<&String> = results.iter().flat_map(|r| &r.knowledge_gaps).collect();
    let raw_suggestions: Vec<&String> = results.iter().flat_map(|r| &r.prompt_suggestions).collect();

    let insights = AggregatedInsights {
        question_count: results.len(),
        average_severity_score: average_severity(results),
        top_knowledge_gaps: synthesis
            .top_knowledge_gaps
            .into_iter()
            .map(|gap| {
                let count = occurrences(&gap, raw_gaps.iter().copied());
                GapCount { gap, count }
            })
            .collect(),
        top_prompt_suggestions: synthesis
            .cross_question_prompt_suggestions
            .into_iter()
            .map(|suggestion| {
                let count = occurrences(&suggestion, raw_suggestions.iter().copied());
                SuggestionCount { suggestion, count }
            })
            .collect(),
    };

    SummaryDraft {
        insights,
        overall_feedback: synthesis.summary,
        source: SummarySource::Model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xpi_common::db::WinnerFlag;

    fn result(severity: f64, gaps: &[&str], suggestions: &[&str]) -> AnalysisResult {
        AnalysisResult {
            winner_flag: WinnerFlag::A,
            severity_score: severity,
            rationale_digest: "r".to_string(),
            knowledge_gaps: gaps.iter().map(|s| s.to_string()).collect(),
            prompt_suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_rank_ties_keep_first_seen_order() {
        let items: Vec<String> = ["b", "a", "c", "a", "b", "d"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_by_frequency(&items, 5);
        assert_eq!(
            ranked,
            vec![
                ("b".to_string(), 2),
                ("a".to_string(), 2),
                ("c".to_string(), 1),
                ("d".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_rank_merges_case_variants() {
        let items: Vec<String> = ["Caching", "indexing", "caching", " CACHING "]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            rank_by_frequency(&items, TOP_N),
            vec![("Caching".to_string(), 3), ("indexing".to_string(), 1)]
        );
    }

    #[test]
    fn test_rank_truncates() {
        let items: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        assert_eq!(rank_by_frequency(&items, TOP_N).len(), 5);
    }

    #[test]
    fn test_average_severity() {
        assert_eq!(average_severity(&[]), 0.0);
        let results = vec![result(0.2, &[], &[]), result(0.6, &[], &[])];
        assert!((average_severity(&results) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_statistical_summary_text() {
        let results = vec![
            result(0.25, &["caching", "indexes"], &["ask for steps"]),
            result(0.75, &["caching"], &["ask for steps", "cite sources"]),
        ];
        let draft = statistical_summary(&results);

        assert_eq!(draft.source, SummarySource::Statistical);
        assert_eq!(draft.insights.question_count, 2);
        assert_eq!(draft.insights.top_knowledge_gaps[0], GapCount { gap: "caching".to_string(), count: 2 });
        assert_eq!(draft.insights.top_prompt_suggestions[0].count, 2);
        assert!(draft.overall_feedback.starts_with(STATISTICAL_HEADER));
        assert!(draft.overall_feedback.contains("- Total questions analyzed: 2"));
        assert!(draft.overall_feedback.contains("- Average severity score: 0.50"));
        assert!(draft.overall_feedback.contains("caching, indexes"));
    }

    #[test]
    fn test_occurrences_case_insensitive_minimum_one() {
        let raw: Vec<String> = vec!["Caching".to_string(), "caching ".to_string(), "other".to_string()];
        assert_eq!(occurrences("caching", &raw), 2);
        assert_eq!(occurrences("unseen", &raw), 1);
    }
}
