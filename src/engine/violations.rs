// src/engine/violations.rs

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::session::{ExamSession, Violation, ViolationReport, ViolationType},
    store::ExamStore,
};

/// Logs an integrity event against the student's in-progress session.
pub async fn record_violation(
    store: &dyn ExamStore,
    exam_id: i64,
    student_id: i64,
    violation_type: ViolationType,
    details: String,
    now: DateTime<Utc>,
) -> Result<ExamSession, AppError> {
    let violation = Violation {
        violation_type,
        timestamp: now,
        details,
    };

    let session = store
        .append_violation(exam_id, student_id, violation)
        .await?
        .ok_or(AppError::SessionNotActive)?;

    tracing::warn!(
        "Violation {:?} on exam {} by student {} (total {})",
        violation_type,
        exam_id,
        student_id,
        session.violation_count
    );

    Ok(session)
}

/// Sessions of an exam that have violations, worst first.
pub async fn list_violations(
    store: &dyn ExamStore,
    exam_id: i64,
) -> Result<Vec<ViolationReport>, AppError> {
    let sessions = store.sessions_with_violations(exam_id).await?;
    Ok(sessions.into_iter().map(ViolationReport::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{assignment::StudentIdentity, grading::submit_session, sessions::start_session},
        models::exam::{Assignment, AssignmentType, ExamSettings, ExamStatus, NewExam},
        store::MemoryStore,
    };
    use chrono::Duration;

    async fn running_exam(store: &MemoryStore, now: DateTime<Utc>, students: &[i64]) -> i64 {
        let exam = NewExam {
            title: "Quiz".to_string(),
            description: String::new(),
            created_by: 1,
            assignment: Assignment {
                assignment_type: AssignmentType::Individual,
                assigned_groups: vec![],
                assigned_grade: None,
                assigned_students: students.to_vec(),
            },
            questions: vec![],
            settings: ExamSettings {
                start_time: now - Duration::minutes(5),
                end_time: now + Duration::minutes(55),
                shuffle_questions: false,
                show_results: true,
                max_attempts: 1,
                passing_score: 60,
            },
            status: ExamStatus::Scheduled,
        };
        let id = store.create_exam(exam, now).await.unwrap().id;
        for s in students {
            let student = StudentIdentity {
                id: *s,
                ..Default::default()
            };
            start_session(store, id, &student, now).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn test_count_tracks_list() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let exam_id = running_exam(&store, now, &[5]).await;

        for (i, kind) in [ViolationType::TabSwitch, ViolationType::CopyAttempt, ViolationType::RightClick]
            .into_iter()
            .enumerate()
        {
            let session = record_violation(&store, exam_id, 5, kind, format!("#{i}"), now)
                .await
                .unwrap();
            assert_eq!(session.violation_count, session.violations.len() as i64);
            assert_eq!(session.violation_count, i as i64 + 1);
        }
    }

    #[tokio::test]
    async fn test_rejected_without_active_session() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let exam_id = running_exam(&store, now, &[5]).await;

        let none = record_violation(&store, exam_id, 6, ViolationType::TabSwitch, String::new(), now).await;
        assert!(matches!(none, Err(AppError::SessionNotActive)));

        submit_session(&store, exam_id, 5, &[], now).await.unwrap();
        let done = record_violation(&store, exam_id, 5, ViolationType::PasteAttempt, String::new(), now).await;
        assert!(matches!(done, Err(AppError::SessionNotActive)));

        let stored = store.find_session(exam_id, 5).await.unwrap().unwrap();
        assert_eq!(stored.violation_count, 0);
    }

    #[tokio::test]
    async fn test_reports_sorted_by_count() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let exam_id = running_exam(&store, now, &[1, 2, 3]).await;

        record_violation(&store, exam_id, 1, ViolationType::TabSwitch, String::new(), now).await.unwrap();
        for _ in 0..3 {
            record_violation(&store, exam_id, 2, ViolationType::FullscreenExit, String::new(), now)
                .await
                .unwrap();
        }

        let reports = list_violations(&store, exam_id).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].student_id, 2);
        assert_eq!(reports[0].violation_count, 3);
        assert_eq!(reports[1].student_id, 1);
    }
}
