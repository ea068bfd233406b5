// src/models/question.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for a single question's points.
pub const MAX_QUESTION_POINTS: i64 = 10_000;

fn default_points() -> i64 {
    10
}

/// One question embedded in an exam definition.
///
/// The variant payload is flattened next to the common fields, so the JSON
/// shape is `{"id": .., "points": .., "type": "quiz", "options": [..], ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Stable id, generated when an admin submits a question without one.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(default = "default_points")]
    pub points: i64,

    /// Display order inside the exam.
    #[serde(default)]
    pub order: i32,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub hint: Option<String>,

    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Quiz {
        options: Vec<String>,
        correct_index: usize,
    },
    CodeChallenge {
        #[serde(default)]
        code_template: String,
        #[serde(default)]
        expected_output: String,
        #[serde(default)]
        language: CodeLanguage,
    },
    FillBlank {
        #[serde(default)]
        blank_text: String,
        blanks: Vec<String>,
    },
    MatchWords {
        pairs: Vec<MatchPair>,
    },
    ScratchBlocks {
        #[serde(default)]
        instruction: String,
        blocks: Vec<ScratchBlock>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    Javascript,
    Python,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchBlock {
    pub text: String,
    pub order: i32,
}

impl Question {
    pub fn is_code_challenge(&self) -> bool {
        matches!(self.kind, QuestionKind::CodeChallenge { .. })
    }

    /// Student-facing copy with every answer-revealing field removed.
    pub fn to_public(&self) -> PublicQuestion {
        let kind = match &self.kind {
            QuestionKind::Quiz { options, .. } => PublicQuestionKind::Quiz {
                options: options.clone(),
            },
            QuestionKind::CodeChallenge {
                code_template,
                language,
                ..
            } => PublicQuestionKind::CodeChallenge {
                code_template: code_template.clone(),
                language: *language,
            },
            QuestionKind::FillBlank { blank_text, blanks } => PublicQuestionKind::FillBlank {
                blank_text: blank_text.clone(),
                blank_count: blanks.len(),
            },
            QuestionKind::MatchWords { pairs } => {
                // Right-hand words are sorted so their position no longer
                // lines up with the matching left-hand word.
                let mut right: Vec<String> = pairs.iter().map(|p| p.right.clone()).collect();
                right.sort();
                PublicQuestionKind::MatchWords {
                    left: pairs.iter().map(|p| p.left.clone()).collect(),
                    right,
                }
            }
            QuestionKind::ScratchBlocks {
                instruction,
                blocks,
            } => {
                // Sorted so the stored sequence can't give the solution away.
                let mut texts: Vec<String> = blocks.iter().map(|b| b.text.clone()).collect();
                texts.sort();
                PublicQuestionKind::ScratchBlocks {
                    instruction: instruction.clone(),
                    blocks: texts,
                }
            }
        };

        PublicQuestion {
            id: self.id,
            points: self.points,
            order: self.order,
            prompt: self.prompt.clone(),
            hint: self.hint.clone(),
            kind,
        }
    }

    /// Structural checks applied when an admin creates or edits an exam.
    pub fn check(&self) -> Result<(), validator::ValidationError> {
        if self.points < 0 {
            return Err(validator::ValidationError::new("negative_points"));
        }
        if self.points > MAX_QUESTION_POINTS {
            return Err(validator::ValidationError::new("too_many_points"));
        }
        match &self.kind {
            QuestionKind::Quiz {
                options,
                correct_index,
            } => {
                if options.is_empty() {
                    return Err(validator::ValidationError::new("options_cannot_be_empty"));
                }
                if *correct_index >= options.len() {
                    return Err(validator::ValidationError::new("correct_index_out_of_range"));
                }
            }
            QuestionKind::FillBlank { blanks, .. } if blanks.is_empty() => {
                return Err(validator::ValidationError::new("blanks_cannot_be_empty"));
            }
            QuestionKind::MatchWords { pairs } if pairs.is_empty() => {
                return Err(validator::ValidationError::new("pairs_cannot_be_empty"));
            }
            QuestionKind::ScratchBlocks { blocks, .. } if blocks.is_empty() => {
                return Err(validator::ValidationError::new("blocks_cannot_be_empty"));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Validator hook for a whole question list.
pub fn validate_questions(questions: &[Question]) -> Result<(), validator::ValidationError> {
    for question in questions {
        question.check()?;
    }
    Ok(())
}

/// DTO for sending a question to a student (no solutions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub points: i64,
    pub order: i32,
    pub prompt: Option<String>,
    pub hint: Option<String>,
    #[serde(flatten)]
    pub kind: PublicQuestionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicQuestionKind {
    Quiz {
        options: Vec<String>,
    },
    CodeChallenge {
        code_template: String,
        language: CodeLanguage,
    },
    FillBlank {
        blank_text: String,
        blank_count: usize,
    },
    MatchWords {
        left: Vec<String>,
        right: Vec<String>,
    },
    ScratchBlocks {
        instruction: String,
        blocks: Vec<String>,
    },
}
