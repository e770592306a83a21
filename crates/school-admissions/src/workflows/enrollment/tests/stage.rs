use super::common::*;
use crate::workflows::enrollment::assessment::{
    assigned_class, resolve_stage, score_day, score_self_care, stage_for,
};
use crate::workflows::enrollment::domain::{AssessmentData, Response, Stage};

fn full_window(daily_rating: u8, parent: Option<Response>) -> AssessmentData {
    let mut data = AssessmentData::default();
    for day in 1..=14 {
        let mut input = steady_day(day);
        input.scores = scores(daily_rating);
        let record = score_day(day, input).expect("valid day");
        data.teacher_assessments.insert(day, record);
    }
    data.parent_self_care = parent.map(|response| score_self_care(self_care(response)));
    data
}

#[test]
fn thresholds_are_inclusive_lower_bounds() {
    assert_eq!(stage_for(3.8), Stage::Three);
    assert_eq!(stage_for(3.79), Stage::Two);
    assert_eq!(stage_for(2.4), Stage::Two);
    assert_eq!(stage_for(2.39), Stage::One);
    assert_eq!(stage_for(0.0), Stage::One);
    assert_eq!(stage_for(5.0), Stage::Three);
}

#[test]
fn assigned_class_joins_level_and_stage() {
    assert_eq!(assigned_class("Level 2", Stage::Three), "Level 2 - Stage 3");
    assert_eq!(assigned_class("Level 1", Stage::One), "Level 1 - Stage 1");
}

#[test]
fn resolves_weighted_average() {
    let data = full_window(4, Some(Response::Yes));
    let outcome = resolve_stage(&data, "Level 2").expect("window complete");

    assert_eq!(outcome.teacher_average, 4.0);
    assert_eq!(outcome.parent_score, 5.0);
    assert_eq!(outcome.final_average, 4.4);
    assert_eq!(outcome.stage, Stage::Three);
    assert_eq!(outcome.assigned_class, "Level 2 - Stage 3");
}

#[test]
fn exact_threshold_average_lands_in_upper_stage() {
    // ratings 2, Yes, neutral ABC: (10 + 5 + 3) / 7 = 2.57 per day
    let data = full_window(2, Some(Response::YesWithHelp));
    let outcome = resolve_stage(&data, "Level 1").expect("window complete");
    assert_eq!(outcome.final_average, 2.54);
    assert_eq!(outcome.stage, Stage::Two);

    let mut boundary = full_window(4, Some(Response::No));
    for record in boundary.teacher_assessments.values_mut() {
        record.daily_total_score = 4.0;
    }
    let outcome = resolve_stage(&boundary, "Level 1").expect("window complete");
    assert_eq!(outcome.final_average, 2.4);
    assert_eq!(outcome.stage, Stage::Two);
}

#[test]
fn resolution_is_deterministic() {
    let data = full_window(3, Some(Response::YesWithHelp));
    let first = resolve_stage(&data, "Level 3").expect("window complete");
    let second = resolve_stage(&data, "Level 3").expect("window complete");
    assert_eq!(first, second);
}

#[test]
fn missing_days_block_resolution() {
    let mut data = full_window(4, Some(Response::Yes));
    data.teacher_assessments.remove(&7);
    if let Some(record) = data.teacher_assessments.get_mut(&12) {
        record.completed = false;
    }

    let incomplete = resolve_stage(&data, "Level 2").expect_err("window incomplete");
    assert_eq!(incomplete.missing_days, vec![7, 12]);
    assert!(!incomplete.parent_self_care_missing);
    assert!(incomplete.to_string().contains("days 7, 12"));
}

#[test]
fn missing_parent_questionnaire_blocks_resolution() {
    let data = full_window(4, None);
    let incomplete = resolve_stage(&data, "Level 2").expect_err("parent missing");
    assert!(incomplete.missing_days.is_empty());
    assert!(incomplete.parent_self_care_missing);
}
