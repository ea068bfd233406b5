// src/engine/assignment.rs

use crate::models::exam::{Assignment, AssignmentType};

/// The identity facts visibility depends on.
#[derive(Debug, Clone, Default)]
pub struct StudentIdentity {
    pub id: i64,
    pub grade: Option<String>,
    pub groups: Vec<i64>,
}

/// Whether an exam's assignment rule targets this student.
/// Independent of exam status and window.
pub fn is_visible(assignment: &Assignment, student: &StudentIdentity) -> bool {
    match assignment.assignment_type {
        AssignmentType::Individual => assignment.assigned_students.contains(&student.id),
        AssignmentType::Group => student
            .groups
            .iter()
            .any(|g| assignment.assigned_groups.contains(g)),
        AssignmentType::Grade => match (&assignment.assigned_grade, &student.grade) {
            (Some(assigned), Some(grade)) => assigned == grade,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> StudentIdentity {
        StudentIdentity {
            id: 7,
            grade: Some("5".to_string()),
            groups: vec![100, 200],
        }
    }

    fn rule(assignment_type: AssignmentType) -> Assignment {
        Assignment {
            assignment_type,
            assigned_groups: vec![],
            assigned_grade: None,
            assigned_students: vec![],
        }
    }

    #[test]
    fn test_individual() {
        let mut a = rule(AssignmentType::Individual);
        assert!(!is_visible(&a, &student()));
        a.assigned_students = vec![3, 7];
        assert!(is_visible(&a, &student()));
    }

    #[test]
    fn test_group_intersection() {
        let mut a = rule(AssignmentType::Group);
        a.assigned_groups = vec![300];
        assert!(!is_visible(&a, &student()));
        a.assigned_groups = vec![300, 200];
        assert!(is_visible(&a, &student()));
    }

    #[test]
    fn test_grade_match() {
        let mut a = rule(AssignmentType::Grade);
        a.assigned_grade = Some("6".to_string());
        assert!(!is_visible(&a, &student()));
        a.assigned_grade = Some("5".to_string());
        assert!(is_visible(&a, &student()));

        let no_grade = StudentIdentity {
            grade: None,
            ..student()
        };
        assert!(!is_visible(&a, &no_grade));
    }

    #[test]
    fn test_rule_type_decides_which_list_counts() {
        // Student is listed individually, but the rule is by grade.
        let mut a = rule(AssignmentType::Grade);
        a.assigned_students = vec![7];
        a.assigned_grade = Some("9".to_string());
        assert!(!is_visible(&a, &student()));
    }
}
