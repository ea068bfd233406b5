// src/engine/grading.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    engine::scheduler::refresh_statuses,
    error::AppError,
    models::{
        exam::Exam,
        question::{Question, QuestionKind},
        session::{
            Answer, ExamSession, GradeOverride, GradedSubmission, ManualReview, SessionStatus,
            SubmitExamResponse, SubmittedAnswer,
        },
    },
    store::ExamStore,
};

/// Grades one answer. All-or-nothing: a correct answer earns the question's
/// points, anything else earns zero.
pub fn auto_grade(question: &Question, submitted: &Value) -> (bool, i64) {
    let is_correct = match &question.kind {
        // `2` and `2.0` are the same JSON number.
        QuestionKind::Quiz { correct_index, .. } => match submitted.as_u64() {
            Some(index) => index == *correct_index as u64,
            None => submitted
                .as_f64()
                .is_some_and(|f| f.fract() == 0.0 && f == *correct_index as f64),
        },
        QuestionKind::FillBlank { blanks, .. } => match submitted.as_array() {
            Some(given) if given.len() == blanks.len() => {
                given.iter().zip(blanks).all(|(g, expected)| {
                    g.as_str().is_some_and(|g| {
                        g.trim().to_lowercase() == expected.trim().to_lowercase()
                    })
                })
            }
            _ => false,
        },
        // Positional on purpose: pair i must match expected pair i.
        QuestionKind::MatchWords { pairs } => match submitted.as_array() {
            Some(given) if given.len() == pairs.len() => {
                given.iter().zip(pairs).all(|(g, expected)| {
                    g.get("left").and_then(Value::as_str) == Some(expected.left.as_str())
                        && g.get("right").and_then(Value::as_str) == Some(expected.right.as_str())
                })
            }
            _ => false,
        },
        QuestionKind::ScratchBlocks { blocks, .. } => {
            let mut expected: Vec<_> = blocks.iter().collect();
            expected.sort_by_key(|b| b.order);
            match submitted.as_array() {
                Some(given) if given.len() == expected.len() => given
                    .iter()
                    .zip(expected)
                    .all(|(g, block)| g.as_str() == Some(block.text.as_str())),
                _ => false,
            }
        }
        // Needs a human (or a sandbox we don't have).
        QuestionKind::CodeChallenge { .. } => false,
    };

    let points = if is_correct { question.points } else { 0 };
    (is_correct, points)
}

/// round(100 * total / exam_total), or 0 for an exam worth nothing.
pub fn percentage(total_score: i64, exam_total: i64) -> i64 {
    if exam_total <= 0 {
        return 0;
    }
    ((total_score as f64 / exam_total as f64) * 100.0).round() as i64
}

/// Grades a whole submission against the exam.
///
/// Dangling or unparsable question ids score zero instead of failing the
/// submission. A second answer to an already-answered question also scores
/// zero so the total can't exceed the exam's points.
pub fn grade_answers(exam: &Exam, submitted: &[SubmittedAnswer]) -> Vec<Answer> {
    let mut seen: HashSet<Uuid> = HashSet::new();

    submitted
        .iter()
        .map(|ans| {
            let question = Uuid::parse_str(ans.question_id.trim())
                .ok()
                .filter(|id| seen.insert(*id))
                .and_then(|id| exam.question(id));

            let (is_correct, points_earned) = match question {
                Some(q) => auto_grade(q, &ans.answer),
                None => (false, 0),
            };

            Answer {
                // Resolved answers keep the canonical id so overrides can find them.
                question_id: question
                    .map(|q| q.id.to_string())
                    .unwrap_or_else(|| ans.question_id.clone()),
                answer: ans.answer.clone(),
                is_correct,
                points_earned,
            }
        })
        .collect()
}

/// Hyphenated lowercase form of a uuid id; anything unparsable is only trimmed.
fn canonical_id(raw: &str) -> String {
    let raw = raw.trim();
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn total_score(answers: &[Answer]) -> i64 {
    answers
        .iter()
        .fold(0i64, |acc, a| acc.saturating_add(a.points_earned))
}

/// Finalizes a student's in-progress session.
pub async fn submit_session(
    store: &dyn ExamStore,
    exam_id: i64,
    student_id: i64,
    answers: &[SubmittedAnswer],
    now: DateTime<Utc>,
) -> Result<SubmitExamResponse, AppError> {
    refresh_statuses(store, now).await?;

    let session = store
        .find_session(exam_id, student_id)
        .await?
        .ok_or(AppError::NotFound("Exam not started".to_string()))?;

    if session.status != SessionStatus::InProgress {
        return Err(AppError::AlreadySubmitted);
    }

    let exam = store
        .get_exam(exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    let graded = grade_answers(&exam, answers);
    let total = total_score(&graded);
    let submission = GradedSubmission {
        percentage: percentage(total, exam.total_points()),
        total_score: total,
        answers: graded,
        submitted_at: now,
    };

    // Conditional on still being in progress: a duplicate submit racing us loses here.
    let session = store
        .finish_submission(session.id, submission)
        .await?
        .ok_or(AppError::AlreadySubmitted)?;

    tracing::info!(
        "Student {} submitted exam {}: {}/{} ({}%)",
        student_id,
        exam_id,
        session.total_score,
        exam.total_points(),
        session.percentage
    );

    Ok(SubmitExamResponse {
        passed: session.percentage >= i64::from(exam.settings.passing_score),
        needs_manual_review: exam.has_code_challenge(),
        session,
    })
}

/// Applies reviewer overrides in place and recomputes totals from all answers.
/// Pure overwrite, so applying the same overrides twice gives the same result.
pub fn apply_manual_grade(
    session: &mut ExamSession,
    exam_total: i64,
    overrides: &[GradeOverride],
    reviewer_id: i64,
    comments: &str,
) {
    for o in overrides {
        let target = canonical_id(&o.question_id);
        if let Some(answer) = session
            .answers
            .iter_mut()
            .find(|a| canonical_id(&a.question_id) == target)
        {
            answer.is_correct = o.is_correct;
            answer.points_earned = o.points_earned;
        }
    }

    session.total_score = total_score(&session.answers);
    session.percentage = percentage(session.total_score, exam_total);
    session.manual_review = ManualReview {
        reviewed: true,
        reviewer_id: Some(reviewer_id),
        comments: comments.to_string(),
    };
    session.status = SessionStatus::Graded;
}

/// Loads, regrades and persists a submitted session.
pub async fn manual_grade(
    store: &dyn ExamStore,
    session_id: i64,
    overrides: &[GradeOverride],
    reviewer_id: i64,
    comments: &str,
) -> Result<ExamSession, AppError> {
    let mut session = store
        .get_session(session_id)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    if !session.status.is_finished() {
        return Err(AppError::Validation(
            "Session has not been submitted yet".to_string(),
        ));
    }

    let exam = store
        .get_exam(session.exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    apply_manual_grade(
        &mut session,
        exam.total_points(),
        overrides,
        reviewer_id,
        comments,
    );

    let saved = store
        .save_manual_grade(&session)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    tracing::info!(
        "Reviewer {} graded session {}: {} points ({}%)",
        reviewer_id,
        saved.id,
        saved.total_score,
        saved.percentage
    );

    Ok(saved)
}
