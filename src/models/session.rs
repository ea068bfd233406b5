// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{exam::PublicExam, question::MAX_QUESTION_POINTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Submitted,
    Graded,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Graded => "graded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(SessionStatus::InProgress),
            "submitted" => Some(SessionStatus::Submitted),
            "graded" => Some(SessionStatus::Graded),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

/// A graded answer as stored on the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Question id exactly as the client sent it; may not resolve to a question.
    pub question_id: String,
    pub answer: serde_json::Value,
    pub is_correct: bool,
    pub points_earned: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualReview {
    pub reviewed: bool,
    pub reviewer_id: Option<i64>,
    pub comments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    TabSwitch,
    FullscreenExit,
    CopyAttempt,
    PasteAttempt,
    RightClick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// One student's attempt at one exam. Unique per (exam_id, student_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub answers: Vec<Answer>,
    pub total_score: i64,
    pub percentage: i64,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub manual_review: ManualReview,
    pub violations: Vec<Violation>,
    /// Always equal to `violations.len()`.
    pub violation_count: i64,
}

impl ExamSession {
    pub fn new(id: i64, exam_id: i64, student_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            exam_id,
            student_id,
            answers: Vec::new(),
            total_score: 0,
            percentage: 0,
            status: SessionStatus::InProgress,
            started_at,
            submitted_at: None,
            manual_review: ManualReview::default(),
            violations: Vec::new(),
            violation_count: 0,
        }
    }

    /// Appends a violation and keeps the denormalized counter in step.
    pub fn push_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
        self.violation_count = self.violations.len() as i64;
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            id: self.id,
            status: self.status,
            total_score: self.total_score,
            percentage: self.percentage,
        }
    }
}

/// Graded totals handed to the store when a submission is finalized.
#[derive(Debug, Clone)]
pub struct GradedSubmission {
    pub answers: Vec<Answer>,
    pub total_score: i64,
    pub percentage: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Compact result attached to each exam in a student's exam list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub id: i64,
    pub status: SessionStatus,
    pub total_score: i64,
    pub percentage: i64,
}

/// DTO for one submitted answer.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    #[serde(default)]
    pub answer: serde_json::Value,
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

/// DTO for a client-reported integrity event.
#[derive(Debug, Deserialize, Validate)]
pub struct ReportViolationRequest {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeOverride {
    pub question_id: String,
    pub is_correct: bool,
    pub points_earned: i64,
}

/// DTO for an admin's manual grade.
#[derive(Debug, Deserialize, Validate)]
pub struct ManualGradeRequest {
    #[serde(default)]
    #[validate(custom(function = validate_overrides))]
    pub answers: Vec<GradeOverride>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub comments: String,
}

fn validate_overrides(overrides: &[GradeOverride]) -> Result<(), validator::ValidationError> {
    if overrides.iter().any(|o| o.points_earned < 0) {
        return Err(validator::ValidationError::new("points_earned_cannot_be_negative"));
    }
    if overrides.iter().any(|o| o.points_earned > MAX_QUESTION_POINTS) {
        return Err(validator::ValidationError::new("too_many_points"));
    }
    Ok(())
}

/// Response for a successful start: the stripped exam and the student's session.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartExamResponse {
    pub exam: PublicExam,
    pub result: ExamSession,
}

/// Response for a submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitExamResponse {
    #[serde(flatten)]
    pub session: ExamSession,
    pub needs_manual_review: bool,
    pub passed: bool,
}

/// One row of the admin violation monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    pub session_id: i64,
    pub student_id: i64,
    pub status: SessionStatus,
    pub violation_count: i64,
    pub violations: Vec<Violation>,
}

impl From<ExamSession> for ViolationReport {
    fn from(session: ExamSession) -> Self {
        Self {
            session_id: session.id,
            student_id: session.student_id,
            status: session.status,
            violation_count: session.violation_count,
            violations: session.violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manual_grade_request_rejects_negative_points() {
        let ok: ManualGradeRequest = serde_json::from_value(json!({
            "answers": [{"question_id": "q1", "is_correct": true, "points_earned": 5}],
            "comments": "fine"
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let negative: ManualGradeRequest = serde_json::from_value(json!({
            "answers": [{"question_id": "q1", "is_correct": false, "points_earned": -1}]
        }))
        .unwrap();
        assert!(negative.validate().is_err());

        let huge: ManualGradeRequest = serde_json::from_value(json!({
            "answers": [{"question_id": "q1", "is_correct": true, "points_earned": i64::MAX}]
        }))
        .unwrap();
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_push_violation_keeps_count() {
        let mut session = ExamSession::new(1, 1, 1, Utc::now());
        for _ in 0..3 {
            session.push_violation(Violation {
                violation_type: ViolationType::TabSwitch,
                timestamp: Utc::now(),
                details: String::new(),
            });
        }
        assert_eq!(session.violation_count, 3);
        assert_eq!(session.violation_count, session.violations.len() as i64);
    }
}
