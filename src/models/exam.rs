// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{PublicQuestion, Question, validate_questions},
};

/// Lifecycle of an exam definition.
/// Everything except `draft` is kept in line with the clock by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    Draft,
    Scheduled,
    Active,
    Completed,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::Draft => "draft",
            ExamStatus::Scheduled => "scheduled",
            ExamStatus::Active => "active",
            ExamStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ExamStatus::Draft),
            "scheduled" => Some(ExamStatus::Scheduled),
            "active" => Some(ExamStatus::Active),
            "completed" => Some(ExamStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Group,
    Grade,
    Individual,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Group => "group",
            AssignmentType::Grade => "grade",
            AssignmentType::Individual => "individual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "group" => Some(AssignmentType::Group),
            "grade" => Some(AssignmentType::Grade),
            "individual" => Some(AssignmentType::Individual),
            _ => None,
        }
    }
}

/// Which students an exam targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_type: AssignmentType,
    #[serde(default)]
    pub assigned_groups: Vec<i64>,
    #[serde(default)]
    pub assigned_grade: Option<String>,
    #[serde(default)]
    pub assigned_students: Vec<i64>,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> i32 {
    1
}

fn default_passing_score() -> i32 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ExamSettings {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub show_results: bool,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: i32,
    #[serde(default = "default_passing_score")]
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
}

impl ExamSettings {
    /// Field ranges plus the window ordering.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        if self.end_time <= self.start_time {
            return Err(AppError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
        Ok(())
    }
}

/// An exam definition as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_by: i64,
    #[serde(flatten)]
    pub assignment: Assignment,
    pub questions: Vec<Question>,
    pub settings: ExamSettings,
    pub status: ExamStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    /// Sum of question points. Never stored, so it can't drift from the question list.
    pub fn total_points(&self) -> i64 {
        self.questions
            .iter()
            .fold(0i64, |acc, q| acc.saturating_add(q.points))
    }

    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn has_code_challenge(&self) -> bool {
        self.questions.iter().any(Question::is_code_challenge)
    }

    /// Student-facing view: solutions stripped, questions in display order.
    pub fn to_public(&self) -> PublicExam {
        let mut questions: Vec<PublicQuestion> =
            self.questions.iter().map(Question::to_public).collect();
        questions.sort_by_key(|q| q.order);

        PublicExam {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            questions,
            settings: self.settings.clone(),
            status: self.status,
            total_points: self.total_points(),
        }
    }

    /// Merges a partial admin update into the definition.
    pub fn apply_update(&mut self, patch: UpdateExamRequest, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(assignment_type) = patch.assignment_type {
            self.assignment.assignment_type = assignment_type;
        }
        if let Some(groups) = patch.assigned_groups {
            self.assignment.assigned_groups = groups;
        }
        if let Some(grade) = patch.assigned_grade {
            self.assignment.assigned_grade = Some(grade);
        }
        if let Some(students) = patch.assigned_students {
            self.assignment.assigned_students = students;
        }
        if let Some(questions) = patch.questions {
            self.questions = questions;
        }
        if let Some(settings) = patch.settings {
            let s = &mut self.settings;
            if let Some(v) = settings.start_time {
                s.start_time = v;
            }
            if let Some(v) = settings.end_time {
                s.end_time = v;
            }
            if let Some(v) = settings.shuffle_questions {
                s.shuffle_questions = v;
            }
            if let Some(v) = settings.show_results {
                s.show_results = v;
            }
            if let Some(v) = settings.max_attempts {
                s.max_attempts = v;
            }
            if let Some(v) = settings.passing_score {
                s.passing_score = v;
            }
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

/// Admin view: the stored definition plus its computed point total.
#[derive(Debug, Serialize)]
pub struct ExamResponse {
    #[serde(flatten)]
    pub exam: Exam,
    pub total_points: i64,
}

impl From<Exam> for ExamResponse {
    fn from(exam: Exam) -> Self {
        let total_points = exam.total_points();
        Self { exam, total_points }
    }
}

/// DTO for sending an exam to a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicExam {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub questions: Vec<PublicQuestion>,
    pub settings: ExamSettings,
    pub status: ExamStatus,
    pub total_points: i64,
}

/// DTO for creating an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[serde(flatten)]
    pub assignment: Assignment,
    #[serde(default)]
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<Question>,
    #[validate(nested)]
    pub settings: ExamSettings,
    /// `draft` or `scheduled`; defaults to `scheduled`.
    #[serde(default)]
    pub status: Option<ExamStatus>,
}

/// Fields the store needs to insert a new exam.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: String,
    pub created_by: i64,
    pub assignment: Assignment,
    pub questions: Vec<Question>,
    pub settings: ExamSettings,
    pub status: ExamStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub shuffle_questions: Option<bool>,
    pub show_results: Option<bool>,
    pub max_attempts: Option<i32>,
    pub passing_score: Option<i32>,
}

/// DTO for updating an exam. Fields are optional; `status` is the admin override.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExamRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignment_type: Option<AssignmentType>,
    pub assigned_groups: Option<Vec<i64>>,
    pub assigned_grade: Option<String>,
    pub assigned_students: Option<Vec<i64>>,
    pub questions: Option<Vec<Question>>,
    pub settings: Option<SettingsPatch>,
    pub status: Option<ExamStatus>,
}
