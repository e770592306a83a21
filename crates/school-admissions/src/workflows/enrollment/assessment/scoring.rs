use super::super::domain::{
    AbcLog, AssessmentDay, AssessmentDayInput, Response, SelfCareAssessment, SelfCareInput,
    ThinkingTask,
};
use super::catalog::task_for_day;
use super::AssessmentInputError;

pub const MAX_SCORE: f64 = 5.0;
pub const MAX_RAW_SCORE: u8 = 5;
/// ABC score used when a day has no logged observations.
pub const NEUTRAL_ABC_SCORE: f64 = 3.0;
const SELF_CARE_ITEMS: f64 = 9.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn thinking_score(response: Option<Response>) -> f64 {
    match response {
        Some(Response::Yes) => 5.0,
        Some(Response::YesWithHelp) => 2.5,
        Some(Response::No) | None => 0.0,
    }
}

/// Only polarity counts; log content and severity are not weighted.
pub fn abc_score(logs: &[AbcLog]) -> f64 {
    if logs.is_empty() {
        return NEUTRAL_ABC_SCORE;
    }
    let positive = logs.iter().filter(|log| log.is_positive).count() as f64;
    positive * MAX_SCORE / logs.len() as f64
}

/// Equal-weight mean of the five raw ratings, the thinking score and the ABC score.
pub fn daily_total_score(raw: [u8; 5], thinking: f64, abc: f64) -> f64 {
    let raw_sum: f64 = raw.iter().map(|score| f64::from(*score)).sum();
    let mean = (raw_sum + thinking + abc) / 7.0;
    round2(mean).clamp(0.0, MAX_SCORE)
}

pub fn day_percentage(daily_total_score: f64) -> u8 {
    (daily_total_score / MAX_SCORE * 100.0).round().clamp(0.0, 100.0) as u8
}

fn self_care_points(response: Response) -> f64 {
    match response {
        Response::Yes => 1.0,
        Response::YesWithHelp => 0.5,
        Response::No => 0.0,
    }
}

/// Validate and score one observation day.
pub fn score_day(day: u8, input: AssessmentDayInput) -> Result<AssessmentDay, AssessmentInputError> {
    let task = task_for_day(day).ok_or(AssessmentInputError::DayOutOfRange(day))?;

    for (field, value) in input.scores.fields() {
        if value > MAX_RAW_SCORE {
            return Err(AssessmentInputError::ScoreOutOfRange { field, value });
        }
    }

    let raw = input.scores.fields().map(|(_, value)| value);
    let thinking = thinking_score(input.thinking_response);
    let abc = abc_score(&input.abc_logs);
    let total = daily_total_score(raw, thinking, abc);

    Ok(AssessmentDay {
        day,
        scores: input.scores,
        thinking_task: ThinkingTask {
            task_id: task.task_id,
            description: task.description.to_string(),
            response: input.thinking_response,
        },
        thinking_score: thinking,
        abc_logs: input.abc_logs,
        abc_score: abc,
        daily_total_score: total,
        completed: input.completed,
        date: input.date,
    })
}

/// Score the parent questionnaire on the 0–5 scale.
pub fn score_self_care(input: SelfCareInput) -> SelfCareAssessment {
    let points: f64 = input
        .responses
        .items()
        .into_iter()
        .map(self_care_points)
        .sum();
    let calculated_score = round2(points / SELF_CARE_ITEMS * MAX_SCORE).clamp(0.0, MAX_SCORE);

    SelfCareAssessment {
        responses: input.responses,
        comments: input.comments.trim().to_string(),
        calculated_score,
        completed_date: input.completed_date,
        amendments: 0,
    }
}
