// src/store/pg.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::ExamStore;
use crate::{
    error::AppError,
    models::{
        exam::{Assignment, AssignmentType, Exam, ExamSettings, ExamStatus, NewExam},
        question::Question,
        session::{
            Answer, ExamSession, GradedSubmission, ManualReview, SessionStatus, Violation,
        },
    },
};

const EXAM_COLUMNS: &str = "id, title, description, created_by, assignment_type, \
    assigned_groups, assigned_grade, assigned_students, questions, start_time, end_time, \
    shuffle_questions, show_results, max_attempts, passing_score, status, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, exam_id, student_id, answers, total_score, percentage, \
    status, started_at, submitted_at, manual_review, violations, violation_count";

/// Row shape of the `exams` table.
#[derive(FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    description: String,
    created_by: i64,
    assignment_type: String,
    assigned_groups: Vec<i64>,
    assigned_grade: Option<String>,
    assigned_students: Vec<i64>,
    questions: Json<Vec<Question>>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    shuffle_questions: bool,
    show_results: bool,
    max_attempts: i32,
    passing_score: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExamRow> for Exam {
    type Error = AppError;

    fn try_from(row: ExamRow) -> Result<Self, Self::Error> {
        let assignment_type = AssignmentType::parse(&row.assignment_type).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "exam {} has unknown assignment type '{}'",
                row.id, row.assignment_type
            ))
        })?;
        let status = ExamStatus::parse(&row.status).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "exam {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Exam {
            id: row.id,
            title: row.title,
            description: row.description,
            created_by: row.created_by,
            assignment: Assignment {
                assignment_type,
                assigned_groups: row.assigned_groups,
                assigned_grade: row.assigned_grade,
                assigned_students: row.assigned_students,
            },
            questions: row.questions.0,
            settings: ExamSettings {
                start_time: row.start_time,
                end_time: row.end_time,
                shuffle_questions: row.shuffle_questions,
                show_results: row.show_results,
                max_attempts: row.max_attempts,
                passing_score: row.passing_score,
            },
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row shape of the `exam_sessions` table.
#[derive(FromRow)]
struct SessionRow {
    id: i64,
    exam_id: i64,
    student_id: i64,
    answers: Json<Vec<Answer>>,
    total_score: i64,
    percentage: i64,
    status: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    manual_review: Json<ManualReview>,
    violations: Json<Vec<Violation>>,
    violation_count: i64,
}

impl TryFrom<SessionRow> for ExamSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::parse(&row.status).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "session {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(ExamSession {
            id: row.id,
            exam_id: row.exam_id,
            student_id: row.student_id,
            answers: row.answers.0,
            total_score: row.total_score,
            percentage: row.percentage,
            status,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            manual_review: row.manual_review.0,
            violations: row.violations.0,
            violation_count: row.violation_count,
        })
    }
}

fn sessions(rows: Vec<SessionRow>) -> Result<Vec<ExamSession>, AppError> {
    rows.into_iter().map(ExamSession::try_from).collect()
}

/// Postgres-backed store. The `(exam_id, student_id)` unique constraint on
/// `exam_sessions` arbitrates concurrent session creation.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn create_exam(&self, exam: NewExam, now: DateTime<Utc>) -> Result<Exam, AppError> {
        let sql = format!(
            "INSERT INTO exams
             (title, description, created_by, assignment_type, assigned_groups, assigned_grade,
              assigned_students, questions, start_time, end_time, shuffle_questions,
              show_results, max_attempts, passing_score, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
             RETURNING {EXAM_COLUMNS}"
        );
        let row: ExamRow = sqlx::query_as(&sql)
            .bind(&exam.title)
            .bind(&exam.description)
            .bind(exam.created_by)
            .bind(exam.assignment.assignment_type.as_str())
            .bind(&exam.assignment.assigned_groups)
            .bind(&exam.assignment.assigned_grade)
            .bind(&exam.assignment.assigned_students)
            .bind(Json(&exam.questions))
            .bind(exam.settings.start_time)
            .bind(exam.settings.end_time)
            .bind(exam.settings.shuffle_questions)
            .bind(exam.settings.show_results)
            .bind(exam.settings.max_attempts)
            .bind(exam.settings.passing_score)
            .bind(exam.status.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1");
        let row: Option<ExamRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Exam::try_from).transpose()
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams ORDER BY created_at DESC, id DESC");
        let rows: Vec<ExamRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Exam::try_from).collect()
    }

    async fn save_exam(&self, exam: &Exam) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE exams SET
                title = $2, description = $3, assignment_type = $4, assigned_groups = $5,
                assigned_grade = $6, assigned_students = $7, questions = $8, start_time = $9,
                end_time = $10, shuffle_questions = $11, show_results = $12, max_attempts = $13,
                passing_score = $14, status = $15, updated_at = $16
             WHERE id = $1",
        )
        .bind(exam.id)
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(exam.assignment.assignment_type.as_str())
        .bind(&exam.assignment.assigned_groups)
        .bind(&exam.assignment.assigned_grade)
        .bind(&exam.assignment.assigned_students)
        .bind(Json(&exam.questions))
        .bind(exam.settings.start_time)
        .bind(exam.settings.end_time)
        .bind(exam.settings.shuffle_questions)
        .bind(exam.settings.show_results)
        .bind(exam.settings.max_attempts)
        .bind(exam.settings.passing_score)
        .bind(exam.status.as_str())
        .bind(exam.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_exam(&self, id: i64) -> Result<bool, AppError> {
        // exam_sessions.exam_id is ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn refresh_statuses(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let opened = sqlx::query(
            "UPDATE exams SET status = 'active'
             WHERE status = 'scheduled' AND start_time <= $1 AND end_time > $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let closed = sqlx::query(
            "UPDATE exams SET status = 'completed'
             WHERE status IN ('scheduled', 'active') AND end_time <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(opened.rows_affected() + closed.rows_affected())
    }

    async fn insert_session_if_absent(
        &self,
        exam_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(ExamSession, bool), AppError> {
        let sql = format!(
            "INSERT INTO exam_sessions (exam_id, student_id, status, started_at)
             VALUES ($1, $2, 'in_progress', $3)
             ON CONFLICT (exam_id, student_id) DO NOTHING
             RETURNING {SESSION_COLUMNS}"
        );
        let inserted: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(exam_id)
            .bind(student_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        // Lost the race (or the session already existed): adopt the stored row.
        let existing = self.find_session(exam_id, student_id).await?.ok_or_else(|| {
            AppError::InternalServerError(format!(
                "session for exam {exam_id} / student {student_id} vanished after conflict"
            ))
        })?;
        Ok((existing, false))
    }

    async fn find_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE exam_id = $1 AND student_id = $2"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(exam_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExamSession::try_from).transpose()
    }

    async fn get_session(&self, id: i64) -> Result<Option<ExamSession>, AppError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE id = $1");
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExamSession::try_from).transpose()
    }

    async fn list_sessions(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE exam_id = $1
             ORDER BY total_score DESC, id"
        );
        let rows: Vec<SessionRow> = sqlx::query_as(&sql)
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await?;
        sessions(rows)
    }

    async fn list_student_sessions(&self, student_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE student_id = $1");
        let rows: Vec<SessionRow> = sqlx::query_as(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        sessions(rows)
    }

    async fn append_violation(
        &self,
        exam_id: i64,
        student_id: i64,
        violation: Violation,
    ) -> Result<Option<ExamSession>, AppError> {
        // Counter is derived from the appended array in the same statement.
        let sql = format!(
            "UPDATE exam_sessions SET
                violations = violations || $3,
                violation_count = jsonb_array_length(violations || $3)
             WHERE exam_id = $1 AND student_id = $2 AND status = 'in_progress'
             RETURNING {SESSION_COLUMNS}"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(exam_id)
            .bind(student_id)
            .bind(Json(vec![violation]))
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExamSession::try_from).transpose()
    }

    async fn finish_submission(
        &self,
        session_id: i64,
        graded: GradedSubmission,
    ) -> Result<Option<ExamSession>, AppError> {
        let sql = format!(
            "UPDATE exam_sessions SET
                answers = $2, total_score = $3, percentage = $4,
                status = 'submitted', submitted_at = $5
             WHERE id = $1 AND status = 'in_progress'
             RETURNING {SESSION_COLUMNS}"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(Json(&graded.answers))
            .bind(graded.total_score)
            .bind(graded.percentage)
            .bind(graded.submitted_at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExamSession::try_from).transpose()
    }

    async fn save_manual_grade(
        &self,
        session: &ExamSession,
    ) -> Result<Option<ExamSession>, AppError> {
        let sql = format!(
            "UPDATE exam_sessions SET
                answers = $2, total_score = $3, percentage = $4,
                manual_review = $5, status = $6
             WHERE id = $1 AND status IN ('submitted', 'graded')
             RETURNING {SESSION_COLUMNS}"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(session.id)
            .bind(Json(&session.answers))
            .bind(session.total_score)
            .bind(session.percentage)
            .bind(Json(&session.manual_review))
            .bind(session.status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExamSession::try_from).transpose()
    }

    async fn sessions_with_violations(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM exam_sessions
             WHERE exam_id = $1 AND violation_count > 0
             ORDER BY violation_count DESC, id"
        );
        let rows: Vec<SessionRow> = sqlx::query_as(&sql)
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await?;
        sessions(rows)
    }

    async fn groups_for_student(&self, student_id: i64) -> Result<Vec<i64>, AppError> {
        let groups: Vec<(i64,)> =
            sqlx::query_as("SELECT group_id FROM group_members WHERE student_id = $1")
                .bind(student_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(groups.into_iter().map(|(id,)| id).collect())
    }
}
