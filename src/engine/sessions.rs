// src/engine/sessions.rs

use chrono::{DateTime, Utc};

use crate::{
    engine::{
        assignment::{StudentIdentity, is_visible},
        scheduler::{check_window, refresh_statuses},
    },
    error::{AppError, WindowState},
    models::{
        exam::ExamStatus,
        session::{SessionStatus, StartExamResponse},
    },
    store::ExamStore,
};

/// Starts (or resumes) the student's session for an exam.
///
/// Re-entry is idempotent: an in-progress session is handed back untouched.
/// Concurrent first starts all end up with the single stored session.
pub async fn start_session(
    store: &dyn ExamStore,
    exam_id: i64,
    student: &StudentIdentity,
    now: DateTime<Utc>,
) -> Result<StartExamResponse, AppError> {
    refresh_statuses(store, now).await?;

    let exam = store
        .get_exam(exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if !is_visible(&exam.assignment, student) {
        return Err(AppError::Unauthorized(
            "This exam is not assigned to you".to_string(),
        ));
    }

    if exam.status == ExamStatus::Draft {
        return Err(AppError::ExamNotOpen(WindowState::NotYetOpen));
    }
    check_window(&exam.settings, now).map_err(AppError::ExamNotOpen)?;

    if let Some(existing) = store.find_session(exam_id, student.id).await? {
        if existing.status != SessionStatus::InProgress {
            return Err(AppError::AlreadySubmitted);
        }
        return Ok(StartExamResponse {
            exam: exam.to_public(),
            result: existing,
        });
    }

    let (session, created) = store
        .insert_session_if_absent(exam_id, student.id, now)
        .await?;

    if created {
        tracing::info!("Student {} started exam {}", student.id, exam_id);
    } else if session.status != SessionStatus::InProgress {
        // Another request created and finished it between our lookup and insert.
        return Err(AppError::AlreadySubmitted);
    }

    Ok(StartExamResponse {
        exam: exam.to_public(),
        result: session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::grading::submit_session,
        models::{
            exam::{Assignment, AssignmentType, ExamSettings, NewExam},
            session::SubmittedAnswer,
        },
        store::MemoryStore,
    };
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap()
    }

    fn student() -> StudentIdentity {
        StudentIdentity {
            id: 42,
            grade: Some("8".to_string()),
            groups: vec![],
        }
    }

    async fn seed_exam(store: &MemoryStore, status: ExamStatus) -> i64 {
        let exam = NewExam {
            title: "Algebra".to_string(),
            description: String::new(),
            created_by: 1,
            assignment: Assignment {
                assignment_type: AssignmentType::Grade,
                assigned_groups: vec![],
                assigned_grade: Some("8".to_string()),
                assigned_students: vec![],
            },
            questions: vec![
                serde_json::from_value(json!({
                    "type": "quiz", "options": ["1", "2", "3"], "correct_index": 2
                }))
                .unwrap(),
            ],
            settings: ExamSettings {
                start_time: start(),
                end_time: start() + Duration::minutes(45),
                shuffle_questions: false,
                show_results: true,
                max_attempts: 1,
                passing_score: 60,
            },
            status,
        };
        store.create_exam(exam, start() - Duration::days(1)).await.unwrap().id
    }

    #[tokio::test]
    async fn test_window_boundaries() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;

        // Cases run in clock order: the sweep never moves a completed exam back.
        let early = start_session(&store, exam_id, &student(), start() - Duration::seconds(1)).await;
        assert!(matches!(early, Err(AppError::ExamNotOpen(WindowState::NotYetOpen))));

        let on_time = start_session(&store, exam_id, &student(), start()).await.unwrap();
        assert_eq!(on_time.result.status, SessionStatus::InProgress);
        assert_eq!(on_time.result.started_at, start());
        assert_eq!(on_time.exam.status, ExamStatus::Active);

        let other = StudentIdentity { id: 43, ..student() };
        let last_moment = start() + Duration::minutes(45) - Duration::milliseconds(1);
        let just_in = start_session(&store, exam_id, &other, last_moment).await.unwrap();
        assert_eq!(just_in.result.started_at, last_moment);

        let latecomer = StudentIdentity { id: 44, ..student() };
        let late = start_session(&store, exam_id, &latecomer, start() + Duration::minutes(45)).await;
        assert!(matches!(late, Err(AppError::ExamNotOpen(WindowState::Closed))));
        assert_eq!(
            store.get_exam(exam_id).await.unwrap().unwrap().status,
            ExamStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_start_exactly_at_end_is_closed_on_fresh_exam() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;
        let res = start_session(&store, exam_id, &student(), start() + Duration::minutes(45)).await;
        assert!(matches!(res, Err(AppError::ExamNotOpen(WindowState::Closed))));
    }

    #[tokio::test]
    async fn test_start_strips_answers() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;
        let started = start_session(&store, exam_id, &student(), start()).await.unwrap();
        let value = serde_json::to_value(&started.exam).unwrap();
        assert!(value["questions"][0].get("correct_index").is_none());
        assert_eq!(value["questions"][0]["options"], json!(["1", "2", "3"]));
    }

    #[tokio::test]
    async fn test_reentry_returns_same_session() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;
        let first = start_session(&store, exam_id, &student(), start()).await.unwrap();
        let again = start_session(&store, exam_id, &student(), start() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(first.result.id, again.result.id);
        assert_eq!(again.result.started_at, start());
    }

    #[tokio::test]
    async fn test_start_after_submit_is_rejected() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;
        start_session(&store, exam_id, &student(), start()).await.unwrap();
        submit_session(&store, exam_id, 42, &[], start() + Duration::minutes(1))
            .await
            .unwrap();

        let again = start_session(&store, exam_id, &student(), start() + Duration::minutes(2)).await;
        assert!(matches!(again, Err(AppError::AlreadySubmitted)));
    }

    #[tokio::test]
    async fn test_unassigned_student_cannot_start() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;
        let outsider = StudentIdentity {
            id: 9,
            grade: Some("3".to_string()),
            groups: vec![],
        };
        let res = start_session(&store, exam_id, &outsider, start()).await;
        assert!(matches!(res, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_draft_exam_is_not_open() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Draft).await;
        let res = start_session(&store, exam_id, &student(), start()).await;
        assert!(matches!(res, Err(AppError::ExamNotOpen(WindowState::NotYetOpen))));
    }

    #[tokio::test]
    async fn test_concurrent_starts_share_one_session() {
        let store = Arc::new(MemoryStore::new());
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.spawn(async move {
                start_session(store.as_ref(), exam_id, &student(), start())
                    .await
                    .map(|r| r.result.id)
            });
        }

        let mut ids = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            ids.push(joined.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.list_sessions(exam_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_double_submit_keeps_first_scores() {
        let store = MemoryStore::new();
        let exam_id = seed_exam(&store, ExamStatus::Scheduled).await;
        let started = start_session(&store, exam_id, &student(), start()).await.unwrap();
        let qid = started.exam.questions[0].id.to_string();

        let right = vec![SubmittedAnswer {
            question_id: qid.clone(),
            answer: json!(2),
        }];
        let wrong = vec![SubmittedAnswer {
            question_id: qid,
            answer: json!(0),
        }];

        let first = submit_session(&store, exam_id, 42, &right, start() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(first.session.total_score, 10);
        assert_eq!(first.session.percentage, 100);
        assert!(first.passed);

        let second = submit_session(&store, exam_id, 42, &wrong, start() + Duration::minutes(6)).await;
        assert!(matches!(second, Err(AppError::AlreadySubmitted)));

        let stored = store.find_session(exam_id, 42).await.unwrap().unwrap();
        assert_eq!(stored.total_score, 10);
        assert_eq!(stored.submitted_at, Some(start() + Duration::minutes(5)));
    }
}
