// src/store/mod.rs

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam},
        session::{ExamSession, GradedSubmission, Violation},
    },
};

/// Persistence seam for exam definitions and sessions.
///
/// Every method is a single-record (or set-based) atomic operation; the
/// engine never needs a lock spanning two calls.
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn create_exam(&self, exam: NewExam, now: DateTime<Utc>) -> Result<Exam, AppError>;

    async fn get_exam(&self, id: i64) -> Result<Option<Exam>, AppError>;

    /// All exams, newest first.
    async fn list_exams(&self) -> Result<Vec<Exam>, AppError>;

    /// Overwrites a definition. Returns `false` if it no longer exists.
    async fn save_exam(&self, exam: &Exam) -> Result<bool, AppError>;

    /// Deletes an exam together with all of its sessions.
    async fn delete_exam(&self, id: i64) -> Result<bool, AppError>;

    /// Moves `scheduled`/`active` exams along according to `now`.
    /// Returns how many definitions changed.
    async fn refresh_statuses(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Inserts a fresh `in_progress` session unless one already exists for the
    /// pair. The boolean is `true` when this call created the session.
    async fn insert_session_if_absent(
        &self,
        exam_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(ExamSession, bool), AppError>;

    async fn find_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamSession>, AppError>;

    async fn get_session(&self, id: i64) -> Result<Option<ExamSession>, AppError>;

    /// Sessions of one exam, highest score first.
    async fn list_sessions(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError>;

    async fn list_student_sessions(&self, student_id: i64) -> Result<Vec<ExamSession>, AppError>;

    /// Appends to an `in_progress` session; `None` if there is no such session.
    async fn append_violation(
        &self,
        exam_id: i64,
        student_id: i64,
        violation: Violation,
    ) -> Result<Option<ExamSession>, AppError>;

    /// Stores graded answers and flips the session to `submitted`, only if it
    /// is still `in_progress`. `None` means someone else finished it first.
    async fn finish_submission(
        &self,
        session_id: i64,
        graded: GradedSubmission,
    ) -> Result<Option<ExamSession>, AppError>;

    /// Persists a manually graded session, only if it was already submitted or graded.
    async fn save_manual_grade(&self, session: &ExamSession)
    -> Result<Option<ExamSession>, AppError>;

    /// Sessions of one exam with at least one violation, most violations first.
    async fn sessions_with_violations(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError>;

    /// Groups the student belongs to.
    async fn groups_for_student(&self, student_id: i64) -> Result<Vec<i64>, AppError>;
}
