// src/handlers/student.rs
//
// Every handler here acts on the caller's own identity only.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    engine::{
        assignment::{StudentIdentity, is_visible},
        grading,
        scheduler::refresh_statuses,
        sessions, violations,
    },
    error::AppError,
    models::{
        exam::{ExamStatus, PublicExam},
        session::{
            ExamSession, ReportViolationRequest, ResultSummary, SessionStatus, SubmitExamRequest,
        },
    },
    store::ExamStore,
    utils::{extract::AppJson, jwt::Claims},
};

/// Resolves the caller into the identity facts assignment rules look at.
async fn identity(store: &dyn ExamStore, claims: &Claims) -> Result<StudentIdentity, AppError> {
    let id = claims.user_id()?;
    let groups = store.groups_for_student(id).await?;
    Ok(StudentIdentity {
        id,
        grade: claims.grade.clone(),
        groups,
    })
}

/// An exam in the student's list, with their own result if they have one.
#[derive(Debug, Serialize, Deserialize)]
pub struct MyExamEntry {
    #[serde(flatten)]
    pub exam: PublicExam,
    pub my_result: Option<ResultSummary>,
}

/// Lists published exams assigned to the caller, latest start first.
pub async fn list_my_exams(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    refresh_statuses(store.as_ref(), Utc::now()).await?;
    let student = identity(store.as_ref(), &claims).await?;

    let mut exams: Vec<_> = store
        .list_exams()
        .await?
        .into_iter()
        .filter(|e| e.status != ExamStatus::Draft && is_visible(&e.assignment, &student))
        .collect();
    exams.sort_by(|a, b| b.settings.start_time.cmp(&a.settings.start_time));

    let results: HashMap<i64, ResultSummary> = store
        .list_student_sessions(student.id)
        .await?
        .into_iter()
        .map(|s| (s.exam_id, s.summary()))
        .collect();

    let entries: Vec<MyExamEntry> = exams
        .into_iter()
        .map(|exam| MyExamEntry {
            my_result: results.get(&exam.id).cloned(),
            exam: exam.to_public(),
        })
        .collect();

    Ok(Json(entries))
}

/// Starts the exam, or resumes the caller's in-progress session.
pub async fn start_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student = identity(store.as_ref(), &claims).await?;
    let started = sessions::start_session(store.as_ref(), id, &student, Utc::now()).await?;
    Ok(Json(started))
}

/// Grades and closes the caller's session.
pub async fn submit_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let submitted =
        grading::submit_session(store.as_ref(), id, student_id, &payload.answers, Utc::now())
            .await?;
    Ok(Json(submitted))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViolationAck {
    pub violation_count: i64,
}

/// Records a client-side integrity event.
pub async fn report_violation(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<ReportViolationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let session = violations::record_violation(
        store.as_ref(),
        id,
        claims.user_id()?,
        payload.violation_type,
        payload.details,
        Utc::now(),
    )
    .await?;

    Ok(Json(ViolationAck {
        violation_count: session.violation_count,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyResultResponse {
    #[serde(flatten)]
    pub result: ExamSession,
    pub total_points: i64,
    pub passed: bool,
}

/// The caller's own result. Hidden when the exam doesn't show results, and
/// until the session is finished or the window has closed.
pub async fn get_my_result(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = store
        .get_exam(id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if !exam.settings.show_results {
        return Err(AppError::Unauthorized(
            "Results are hidden for this exam".to_string(),
        ));
    }

    let result = store
        .find_session(id, claims.user_id()?)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    if result.status == SessionStatus::InProgress && Utc::now() < exam.settings.end_time {
        return Err(AppError::Unauthorized(
            "Results are available after submission".to_string(),
        ));
    }

    Ok(Json(MyResultResponse {
        passed: result.percentage >= i64::from(exam.settings.passing_score),
        total_points: exam.total_points(),
        result,
    }))
}
