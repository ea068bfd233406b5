// src/store/memory.rs

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::ExamStore;
use crate::{
    engine::scheduler::advance_status,
    error::AppError,
    models::{
        exam::{Exam, NewExam},
        session::{ExamSession, GradedSubmission, SessionStatus, Violation},
    },
};

#[derive(Debug, Default)]
struct Data {
    exams: BTreeMap<i64, Exam>,
    sessions: BTreeMap<i64, ExamSession>,
    // (exam_id, student_id) -> session id; plays the role of the unique index
    session_index: HashMap<(i64, i64), i64>,
    // student_id -> group ids
    memberships: HashMap<i64, BTreeSet<i64>>,
    next_exam_id: i64,
    next_session_id: i64,
}

/// Process-local store used when no database is configured, and by the tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a group membership (the group directory is owned elsewhere).
    pub fn add_group_member(&self, group_id: i64, student_id: i64) {
        self.data
            .lock()
            .memberships
            .entry(student_id)
            .or_default()
            .insert(group_id);
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn create_exam(&self, exam: NewExam, now: DateTime<Utc>) -> Result<Exam, AppError> {
        let mut data = self.data.lock();
        data.next_exam_id += 1;
        let exam = Exam {
            id: data.next_exam_id,
            title: exam.title,
            description: exam.description,
            created_by: exam.created_by,
            assignment: exam.assignment,
            questions: exam.questions,
            settings: exam.settings,
            status: exam.status,
            created_at: now,
            updated_at: now,
        };
        data.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn get_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.data.lock().exams.get(&id).cloned())
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        let data = self.data.lock();
        let mut exams: Vec<Exam> = data.exams.values().cloned().collect();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(exams)
    }

    async fn save_exam(&self, exam: &Exam) -> Result<bool, AppError> {
        let mut data = self.data.lock();
        match data.exams.get_mut(&exam.id) {
            Some(stored) => {
                *stored = exam.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_exam(&self, id: i64) -> Result<bool, AppError> {
        let mut data = self.data.lock();
        if data.exams.remove(&id).is_none() {
            return Ok(false);
        }
        data.sessions.retain(|_, s| s.exam_id != id);
        data.session_index.retain(|(exam_id, _), _| *exam_id != id);
        Ok(true)
    }

    async fn refresh_statuses(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut data = self.data.lock();
        let mut changed = 0;
        for exam in data.exams.values_mut() {
            let next = advance_status(exam.status, &exam.settings, now);
            if next != exam.status {
                exam.status = next;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_session_if_absent(
        &self,
        exam_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(ExamSession, bool), AppError> {
        let mut data = self.data.lock();
        if let Some(id) = data.session_index.get(&(exam_id, student_id)).copied() {
            if let Some(existing) = data.sessions.get(&id) {
                return Ok((existing.clone(), false));
            }
        }
        data.next_session_id += 1;
        let session = ExamSession::new(data.next_session_id, exam_id, student_id, now);
        data.session_index.insert((exam_id, student_id), session.id);
        data.sessions.insert(session.id, session.clone());
        Ok((session, true))
    }

    async fn find_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        let data = self.data.lock();
        Ok(data
            .session_index
            .get(&(exam_id, student_id))
            .and_then(|id| data.sessions.get(id))
            .cloned())
    }

    async fn get_session(&self, id: i64) -> Result<Option<ExamSession>, AppError> {
        Ok(self.data.lock().sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let data = self.data.lock();
        let mut sessions: Vec<ExamSession> = data
            .sessions
            .values()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        Ok(sessions)
    }

    async fn list_student_sessions(&self, student_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let data = self.data.lock();
        Ok(data
            .sessions
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn append_violation(
        &self,
        exam_id: i64,
        student_id: i64,
        violation: Violation,
    ) -> Result<Option<ExamSession>, AppError> {
        let mut data = self.data.lock();
        let Some(id) = data.session_index.get(&(exam_id, student_id)).copied() else {
            return Ok(None);
        };
        match data.sessions.get_mut(&id) {
            Some(session) if session.status == SessionStatus::InProgress => {
                session.push_violation(violation);
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finish_submission(
        &self,
        session_id: i64,
        graded: GradedSubmission,
    ) -> Result<Option<ExamSession>, AppError> {
        let mut data = self.data.lock();
        match data.sessions.get_mut(&session_id) {
            Some(session) if session.status == SessionStatus::InProgress => {
                session.answers = graded.answers;
                session.total_score = graded.total_score;
                session.percentage = graded.percentage;
                session.submitted_at = Some(graded.submitted_at);
                session.status = SessionStatus::Submitted;
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn save_manual_grade(
        &self,
        session: &ExamSession,
    ) -> Result<Option<ExamSession>, AppError> {
        let mut data = self.data.lock();
        match data.sessions.get_mut(&session.id) {
            Some(stored) if stored.status.is_finished() => {
                stored.answers = session.answers.clone();
                stored.total_score = session.total_score;
                stored.percentage = session.percentage;
                stored.manual_review = session.manual_review.clone();
                stored.status = session.status;
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn sessions_with_violations(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let data = self.data.lock();
        let mut sessions: Vec<ExamSession> = data
            .sessions
            .values()
            .filter(|s| s.exam_id == exam_id && s.violation_count > 0)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.violation_count.cmp(&a.violation_count));
        Ok(sessions)
    }

    async fn groups_for_student(&self, student_id: i64) -> Result<Vec<i64>, AppError> {
        let data = self.data.lock();
        Ok(data
            .memberships
            .get(&student_id)
            .map(|groups| groups.iter().copied().collect())
            .unwrap_or_default())
    }
}
