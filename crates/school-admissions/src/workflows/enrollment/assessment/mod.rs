//! Scoring of observation days and the parent questionnaire, and stage resolution.

mod catalog;
mod scoring;
mod stage;

pub use catalog::{task_for_day, thinking_tasks, ThinkingTaskDefinition, ASSESSMENT_DAYS};
pub use scoring::{
    abc_score, daily_total_score, day_percentage, round2, score_day, score_self_care,
    thinking_score, MAX_RAW_SCORE, NEUTRAL_ABC_SCORE,
};
pub use stage::{
    assigned_class, resolve_stage, stage_for, AssessmentIncomplete, StageOutcome,
    PARENT_WEIGHT, STAGE_THREE_THRESHOLD, STAGE_TWO_THRESHOLD, TEACHER_WEIGHT,
};

/// Raw teacher input rejected before scoring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentInputError {
    #[error("assessment day {0} is outside the 1-{} observation window", ASSESSMENT_DAYS)]
    DayOutOfRange(u8),
    #[error("{field} score {value} is outside the 0-{} range", MAX_RAW_SCORE)]
    ScoreOutOfRange { field: &'static str, value: u8 },
}
