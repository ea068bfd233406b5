// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use crate::{
    engine::{grading, scheduler::refresh_statuses, violations},
    error::AppError,
    models::{
        exam::{CreateExamRequest, ExamResponse, ExamStatus, NewExam, UpdateExamRequest},
        question::validate_questions,
        session::{ExamSession, ManualGradeRequest},
    },
    store::ExamStore,
    utils::{extract::AppJson, jwt::Claims},
};

/// Lists all exams, newest first.
/// Admin only.
pub async fn list_exams(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    refresh_statuses(store.as_ref(), Utc::now()).await?;
    let exams = store.list_exams().await?;
    let exams: Vec<ExamResponse> = exams.into_iter().map(ExamResponse::from).collect();
    Ok(Json(exams))
}

/// Fetches one exam including solutions.
/// Admin only.
pub async fn get_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    refresh_statuses(store.as_ref(), Utc::now()).await?;
    let exam = store
        .get_exam(id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;
    Ok(Json(ExamResponse::from(exam)))
}

/// Creates an exam. Status defaults to `scheduled`; only `draft` may be
/// requested instead, the rest is the scheduler's job.
/// Admin only.
pub async fn create_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.settings.check()?;

    let status = match payload.status {
        None | Some(ExamStatus::Scheduled) => ExamStatus::Scheduled,
        Some(ExamStatus::Draft) => ExamStatus::Draft,
        Some(other) => {
            return Err(AppError::Validation(format!(
                "A new exam can't be created as '{}'",
                other.as_str()
            )));
        }
    };

    let now = Utc::now();
    let exam = store
        .create_exam(
            NewExam {
                title: payload.title,
                description: payload.description,
                created_by: claims.user_id()?,
                assignment: payload.assignment,
                questions: payload.questions,
                settings: payload.settings,
                status,
            },
            now,
        )
        .await?;

    tracing::info!(
        "Exam {} '{}' created with {} question(s)",
        exam.id,
        exam.title,
        exam.questions.len()
    );

    // Pick up the right status straight away if the window is already open.
    refresh_statuses(store.as_ref(), now).await?;
    let exam = store.get_exam(exam.id).await?.unwrap_or(exam);

    Ok((StatusCode::CREATED, Json(ExamResponse::from(exam))))
}

/// Updates an exam. Fields are optional; `status` acts as an admin override.
/// Admin only.
pub async fn update_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut exam = store
        .get_exam(id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title is required.".to_string()));
        }
    }

    let now = Utc::now();
    exam.apply_update(payload, now);
    exam.settings.check()?;
    validate_questions(&exam.questions)
        .map_err(|e| AppError::Validation(format!("questions: {}", e.code)))?;

    if !store.save_exam(&exam).await? {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    refresh_statuses(store.as_ref(), now).await?;
    let exam = store
        .get_exam(id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(ExamResponse::from(exam)))
}

/// Deletes an exam and every session recorded against it.
/// Admin only.
pub async fn delete_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_exam(id).await? {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }
    tracing::info!("Exam {} deleted with its sessions", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Lists all sessions of an exam, highest score first.
/// Admin only.
pub async fn list_results(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if store.get_exam(id).await?.is_none() {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }
    let sessions = store.list_sessions(id).await?;
    Ok(Json(sessions))
}

#[derive(Debug, Serialize)]
pub struct ResultDetail {
    pub result: ExamSession,
    pub exam: ExamResponse,
}

/// Fetches one session together with the full exam it was taken against.
/// Admin only.
pub async fn get_result(
    State(store): State<Arc<dyn ExamStore>>,
    Path(result_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = store
        .get_session(result_id)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;
    let exam = store
        .get_exam(result.exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(ResultDetail {
        result,
        exam: ExamResponse::from(exam),
    }))
}

/// Applies per-question overrides and marks the session graded.
/// Admin only.
pub async fn grade_result(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    Path(result_id): Path<i64>,
    AppJson(payload): AppJson<ManualGradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let session = grading::manual_grade(
        store.as_ref(),
        result_id,
        &payload.answers,
        claims.user_id()?,
        &payload.comments,
    )
    .await?;
    Ok(Json(session))
}

/// Sessions of an exam with at least one violation, most violations first.
/// Admin only; polled by the live monitor.
pub async fn list_violations(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let reports = violations::list_violations(store.as_ref(), id).await?;
    Ok(Json(reports))
}
