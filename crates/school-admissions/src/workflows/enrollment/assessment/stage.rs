use std::fmt;

use serde::Serialize;

use super::super::domain::{AssessmentData, Stage};
use super::catalog::ASSESSMENT_DAYS;
use super::scoring::round2;

pub const TEACHER_WEIGHT: f64 = 0.6;
pub const PARENT_WEIGHT: f64 = 0.4;
pub const STAGE_THREE_THRESHOLD: f64 = 3.8;
pub const STAGE_TWO_THRESHOLD: f64 = 2.4;

/// Result of closing an observation window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub teacher_average: f64,
    pub parent_score: f64,
    pub final_average: f64,
    pub stage: Stage,
    pub assigned_class: String,
}

/// Inputs still missing before a stage can be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentIncomplete {
    pub missing_days: Vec<u8>,
    pub parent_self_care_missing: bool,
}

impl fmt::Display for AssessmentIncomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_days.is_empty() {
            let days = self
                .missing_days
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!(
                "{} of {} observation days are not completed (days {})",
                self.missing_days.len(),
                ASSESSMENT_DAYS,
                days
            ));
        }
        if self.parent_self_care_missing {
            parts.push("the parent self-care questionnaire has not been submitted".to_string());
        }
        write!(f, "assessment cannot be finalized: {}", parts.join("; "))
    }
}

impl std::error::Error for AssessmentIncomplete {}

/// Thresholds are inclusive lower bounds.
pub fn stage_for(final_average: f64) -> Stage {
    if final_average >= STAGE_THREE_THRESHOLD {
        Stage::Three
    } else if final_average >= STAGE_TWO_THRESHOLD {
        Stage::Two
    } else {
        Stage::One
    }
}

pub fn assigned_class(base_level: &str, stage: Stage) -> String {
    format!("{base_level} - {stage}")
}

/// Combine the 14 teacher days with the parent score.
pub fn resolve_stage(
    assessment: &AssessmentData,
    base_level: &str,
) -> Result<StageOutcome, AssessmentIncomplete> {
    let missing_days: Vec<u8> = (1..=ASSESSMENT_DAYS)
        .filter(|day| {
            !assessment
                .teacher_assessments
                .get(day)
                .map(|record| record.completed)
                .unwrap_or(false)
        })
        .collect();

    let parent = assessment.parent_self_care.as_ref();
    let parent_score = match (missing_days.is_empty(), parent) {
        (true, Some(parent)) => parent.calculated_score,
        _ => {
            return Err(AssessmentIncomplete {
                missing_days,
                parent_self_care_missing: parent.is_none(),
            })
        }
    };

    let teacher_total: f64 = (1..=ASSESSMENT_DAYS)
        .filter_map(|day| assessment.teacher_assessments.get(&day))
        .map(|record| record.daily_total_score)
        .sum();
    let teacher_average = teacher_total / f64::from(ASSESSMENT_DAYS);

    let final_average = round2(teacher_average * TEACHER_WEIGHT + parent_score * PARENT_WEIGHT);
    let stage = stage_for(final_average);

    Ok(StageOutcome {
        teacher_average: round2(teacher_average),
        parent_score,
        final_average,
        stage,
        assigned_class: assigned_class(base_level, stage),
    })
}
