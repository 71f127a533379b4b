//! Interview flow: link validation, starting a session, serving questions,
//! recording answers and completing the session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;
use xpi_common::db::{
    AnswerChoice, InterviewLink, InterviewSession, LinkStatus, Project, QuestionPair, SessionStatus,
    SessionSummary, StepRecord,
};
use xpi_common::transcript::TranscriptInput;
use xpi_common::{Error, Result};

use crate::db::links::{advance_link_status, get_link};
use crate::db::projects::{find_question_pair, list_question_pairs, require_project};
use crate::db::sessions;
use crate::db::steps::{self, NewStep, StepDetail};
use crate::services::trigger::AnalysisTrigger;

pub const LINK_EXPIRED_MESSAGE: &str = "This interview link has expired";

/// Link together with its project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    #[serde(flatten)]
    pub link: InterviewLink,
    pub project: Project,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedInterview {
    pub session: InterviewSession,
    pub link: InterviewLink,
    /// The interview's questions: the first `row_quota` pairs in sort order
    pub questions: Vec<QuestionPair>,
}

/// Next unanswered question, or completion once every quota question is answered
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestion {
    pub complete: bool,
    pub answered: usize,
    pub total_steps: usize,
    /// Zero-based position of `question` within the interview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionPair>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    /// External key from the CSV
    pub question_id: String,
    pub preferred_answer: AnswerChoice,
    pub transcript: TranscriptInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: InterviewSession,
    pub summary: Option<SessionSummary>,
    pub step_records: Vec<StepDetail>,
}

/// Load a link that exists and has not expired at `now`
pub async fn require_valid_link(pool: &SqlitePool, link_id: &str, now: DateTime<Utc>) -> Result<InterviewLink> {
    let link = get_link(pool, link_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Interview link {}", link_id)))?;

    if link.is_expired_at(now) {
        return Err(Error::InvalidInput(LINK_EXPIRED_MESSAGE.to_string()));
    }
    Ok(link)
}

pub async fn link_view(pool: &SqlitePool, link_id: &str) -> Result<LinkView> {
    let link = require_valid_link(pool, link_id, Utc::now()).await?;
    let project = require_project(pool, link.project_id).await?;
    Ok(LinkView { link, project })
}

pub async fn require_session(pool: &SqlitePool, session_id: Uuid) -> Result<InterviewSession> {
    sessions::get_session(pool, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Interview session {}", session_id)))
}

async fn session_link(pool: &SqlitePool, session: &InterviewSession) -> Result<InterviewLink> {
    get_link(pool, &session.interview_link_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Interview link {} missing", session.interview_link_id)))
}

/// Start (or resume) the interview behind a link
pub async fn start_interview(pool: &SqlitePool, link_id: &str) -> Result<StartedInterview> {
    let link = require_valid_link(pool, link_id, Utc::now()).await?;
    if link.status == LinkStatus::Completed {
        return Err(Error::Conflict(format!("Interview link {} is already completed", link_id)));
    }

    let mut tx = pool.begin().await?;
    let session = match sessions::find_in_progress_session(&mut tx, &link.id).await? {
        Some(session) => session,
        None => sessions::create_session(&mut tx, &link.id).await?,
    };
    advance_link_status(&mut tx, &link.id, LinkStatus::InProgress).await?;
    tx.commit().await?;

    info!(link_id = %link.id, session_id = %session.id, "Interview started");

    let questions = list_question_pairs(pool, link.project_id, Some(link.row_quota)).await?;
    let link = get_link(pool, &link.id).await?.unwrap_or(link);

    Ok(StartedInterview {
        session,
        link,
        questions,
    })
}

pub async fn next_question(pool: &SqlitePool, session_id: Uuid) -> Result<NextQuestion> {
    let session = require_session(pool, session_id).await?;
    let link = session_link(pool, &session).await?;
    let questions = list_question_pairs(pool, link.project_id, Some(link.row_quota)).await?;
    let answered_ids = steps::answered_question_pairs(pool, session_id).await?;

    let answered = questions.iter().filter(|q| answered_ids.contains(&q.id)).count();
    let total_steps = questions.len();
    let next = questions
        .into_iter()
        .enumerate()
        .find(|(_, q)| !answered_ids.contains(&q.id));

    Ok(match next {
        Some((index, question)) => NextQuestion {
            complete: false,
            answered,
            total_steps,
            step_index: Some(index),
            question: Some(question),
        },
        None => NextQuestion {
            complete: true,
            answered,
            total_steps,
            step_index: None,
            question: None,
        },
    })
}

/// Record the expert's choice and transcript for one question
pub async fn submit_answer(pool: &SqlitePool, session_id: Uuid, answer: SubmitAnswer) -> Result<StepRecord> {
    let session = require_session(pool, session_id).await?;
    if session.status != SessionStatus::InProgress {
        return Err(Error::Conflict(format!(
            "Interview session {} is already completed",
            session_id
        )));
    }

    let link = session_link(pool, &session).await?;
    let question = find_question_pair(pool, link.project_id, &answer.question_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question with ID {} not found", answer.question_id)))?;

    let interview_questions = list_question_pairs(pool, link.project_id, Some(link.row_quota)).await?;
    if !interview_questions.iter().any(|q| q.id == question.id) {
        return Err(Error::InvalidInput(format!(
            "Question with ID {} is not part of this interview",
            answer.question_id
        )));
    }

    let record = steps::insert_step(
        pool,
        NewStep {
            session_id,
            project_id: link.project_id,
            question_pair_id: question.id,
            preferred_answer: answer.preferred_answer,
            transcript: answer.transcript.into(),
        },
    )
    .await?;

    info!(
        session_id = %session_id,
        question_id = %answer.question_id,
        preferred = %record.preferred_answer,
        transcript_kind = %record.transcript.kind(),
        "Answer recorded"
    );
    Ok(record)
}

/// Complete a session and trigger its analysis
///
/// Completing an already completed session changes nothing and sends no trigger.
pub async fn complete_session(
    pool: &SqlitePool,
    trigger: &AnalysisTrigger,
    session_id: Uuid,
) -> Result<InterviewSession> {
    let session = require_session(pool, session_id).await?;
    if session.status == SessionStatus::Completed {
        return Ok(session);
    }

    let mut tx = pool.begin().await?;
    let completed = sessions::mark_completed(&mut tx, session_id).await?;
    if completed {
        advance_link_status(&mut tx, &session.interview_link_id, LinkStatus::Completed).await?;
    }
    tx.commit().await?;

    if completed {
        info!(session_id = %session_id, "Interview session completed");
        trigger.fire(session_id);
    }

    require_session(pool, session_id).await
}

pub async fn session_detail(pool: &SqlitePool, session_id: Uuid) -> Result<SessionDetail> {
    let session = require_session(pool, session_id).await?;
    let summary = sessions::get_summary(pool, session_id).await?;
    let step_records = steps::list_step_details(pool, session_id).await?;

    Ok(SessionDetail {
        session,
        summary,
        step_records,
    })
}

pub async fn sessions_for_link(pool: &SqlitePool, link_id: &str) -> Result<Vec<InterviewSession>> {
    get_link(pool, link_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Interview link {}", link_id)))?;
    sessions::list_sessions_by_link(pool, link_id).await
}

pub async fn latest_completed_for_link(pool: &SqlitePool, link_id: &str) -> Result<InterviewSession> {
    sessions::latest_completed_session(pool, link_id)
        .await?
        .ok_or_else(|| Error::NotFound("No completed sessions found for this interview link".to_string()))
}
