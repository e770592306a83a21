use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::lifecycle::StudentStatus;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier issued by the student sequence when an application is approved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Ledger identifier for a prepaid receipt, distinct from the printed receipt number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReceiptId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Track a learner follows after admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Division {
    Mainstream,
    SpecialNeeds,
}

impl Division {
    pub const fn label(self) -> &'static str {
        match self {
            Division::Mainstream => "mainstream",
            Division::SpecialNeeds => "special_needs",
        }
    }
}

/// Parent or guardian contact captured at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Intake form as submitted by the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub learner_name: String,
    pub date_of_birth: NaiveDate,
    pub division: Division,
    /// Grade applied for; required on the mainstream track.
    #[serde(default)]
    pub applied_grade: Option<String>,
    pub guardians: Vec<GuardianContact>,
    #[serde(default)]
    pub previous_school: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ApplicationSubmission {
    /// Age in whole years on `on`.
    pub fn age_on(&self, on: NaiveDate) -> u32 {
        let dob = self.date_of_birth;
        let mut age = on.year() - dob.year();
        if (on.month(), on.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }
}

/// Office review state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// Stored application plus review metadata. The submission is never edited after intake;
/// `version` is bumped by the store on every accepted review write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub submission: ApplicationSubmission,
    pub submitted_on: NaiveDate,
    pub status: ApplicationStatus,
    pub review_note: Option<String>,
    pub student_id: Option<StudentId>,
    #[serde(default)]
    pub version: u64,
}

/// Age band boundaries for the special-needs levels.
const LEVEL_ONE_MAX_AGE: u32 = 7;
const LEVEL_TWO_MAX_AGE: u32 = 12;

/// Special-needs level for a learner of `age` whole years at application time.
pub fn level_for_age(age: u32) -> &'static str {
    if age <= LEVEL_ONE_MAX_AGE {
        "Level 1"
    } else if age <= LEVEL_TWO_MAX_AGE {
        "Level 2"
    } else {
        "Level 3"
    }
}

/// Placement tier assigned once the observation window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Stage {
    One,
    Two,
    Three,
}

impl Stage {
    pub const fn number(self) -> u8 {
        match self {
            Stage::One => 1,
            Stage::Two => 2,
            Stage::Three => 3,
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Stage::One),
            2 => Ok(Stage::Two),
            3 => Ok(Stage::Three),
            other => Err(format!("stage must be 1, 2 or 3 (found {other})")),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {}", self.number())
    }
}

/// Categorical answer used by thinking tasks and the parent questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Yes,
    No,
    #[serde(rename = "Yes with help", alias = "yes_with_help")]
    YesWithHelp,
}

/// Five raw teacher ratings for one observation day, each 0–5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScores {
    pub numbers: u8,
    pub reading: u8,
    pub self_care: u8,
    pub behaviour: u8,
    pub senses: u8,
}

impl DailyScores {
    pub fn fields(&self) -> [(&'static str, u8); 5] {
        [
            ("numbers", self.numbers),
            ("reading", self.reading),
            ("self_care", self.self_care),
            ("behaviour", self.behaviour),
            ("senses", self.senses),
        ]
    }
}

/// Antecedent, behaviour, consequence observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbcLog {
    pub antecedent: String,
    pub behaviour: String,
    pub consequence: String,
    pub is_positive: bool,
    pub time: NaiveTime,
}

/// The day's scripted task with the teacher's recorded response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingTask {
    pub task_id: u8,
    pub description: String,
    pub response: Option<Response>,
}

/// Teacher input for one observation day before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentDayInput {
    pub scores: DailyScores,
    #[serde(default)]
    pub thinking_response: Option<Response>,
    #[serde(default)]
    pub abc_logs: Vec<AbcLog>,
    #[serde(default = "default_completed")]
    pub completed: bool,
    pub date: NaiveDate,
}

fn default_completed() -> bool {
    true
}

/// Scored observation day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDay {
    pub day: u8,
    pub scores: DailyScores,
    pub thinking_task: ThinkingTask,
    pub thinking_score: f64,
    pub abc_logs: Vec<AbcLog>,
    pub abc_score: f64,
    pub daily_total_score: f64,
    pub completed: bool,
    pub date: NaiveDate,
}

/// The nine parent questionnaire items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfCareResponses {
    pub uses_toilet: Response,
    pub washes_hands: Response,
    pub dresses_self: Response,
    pub undresses_self: Response,
    pub feeds_self: Response,
    pub drinks_from_cup: Response,
    pub brushes_teeth: Response,
    pub puts_on_shoes: Response,
    pub tidies_belongings: Response,
}

impl SelfCareResponses {
    pub fn uniform(response: Response) -> Self {
        Self {
            uses_toilet: response,
            washes_hands: response,
            dresses_self: response,
            undresses_self: response,
            feeds_self: response,
            drinks_from_cup: response,
            brushes_teeth: response,
            puts_on_shoes: response,
            tidies_belongings: response,
        }
    }

    pub fn items(&self) -> [Response; 9] {
        [
            self.uses_toilet,
            self.washes_hands,
            self.dresses_self,
            self.undresses_self,
            self.feeds_self,
            self.drinks_from_cup,
            self.brushes_teeth,
            self.puts_on_shoes,
            self.tidies_belongings,
        ]
    }
}

/// Parent submission before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfCareInput {
    pub responses: SelfCareResponses,
    #[serde(default)]
    pub comments: String,
    pub completed_date: NaiveDate,
}

/// Scored parent questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCareAssessment {
    pub responses: SelfCareResponses,
    pub comments: String,
    pub calculated_score: f64,
    pub completed_date: NaiveDate,
    #[serde(default)]
    pub amendments: u32,
}

/// Observation window state carried by special-needs students.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentData {
    pub teacher_assessments: BTreeMap<u8, AssessmentDay>,
    pub parent_self_care: Option<SelfCareAssessment>,
    pub teacher_average: Option<f64>,
    pub final_average: Option<f64>,
    pub stage: Option<Stage>,
    pub is_complete: bool,
}

impl AssessmentData {
    pub fn completed_days(&self) -> usize {
        self.teacher_assessments
            .values()
            .filter(|day| day.completed)
            .count()
    }
}

/// Mutable student aggregate. `version` is bumped by the store on every accepted write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub application_id: ApplicationId,
    pub learner_name: String,
    pub division: Division,
    pub level: Option<String>,
    pub grade: Option<String>,
    pub status: StudentStatus,
    pub receipt_number: Option<String>,
    pub payment_rejected: bool,
    pub rejection_reason: Option<String>,
    pub assessment: Option<AssessmentData>,
    pub stage: Option<Stage>,
    pub assigned_class: Option<String>,
    pub version: u64,
}

impl StudentRecord {
    /// Level for special-needs learners, grade otherwise.
    pub fn base_level(&self) -> Option<&str> {
        match self.division {
            Division::SpecialNeeds => self.level.as_deref(),
            Division::Mainstream => self.grade.as_deref(),
        }
    }

    pub fn status_view(&self) -> StudentStatusView {
        let assessment = self.assessment.as_ref();
        StudentStatusView {
            student_id: self.id.clone(),
            learner_name: self.learner_name.clone(),
            division: self.division.label(),
            status: self.status.label(),
            base_level: self.base_level().map(str::to_string),
            payment_rejected: self.payment_rejected,
            rejection_reason: self.rejection_reason.clone(),
            completed_days: assessment.map(AssessmentData::completed_days),
            parent_self_care_submitted: assessment.map(|data| data.parent_self_care.is_some()),
            final_average: assessment.and_then(|data| data.final_average),
            stage: self.stage.map(Stage::number),
            assigned_class: self.assigned_class.clone(),
        }
    }
}

/// Read-only projection handed to views and exporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStatusView {
    pub student_id: StudentId,
    pub learner_name: String,
    pub division: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_level: Option<String>,
    pub payment_rejected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_days: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_self_care_submitted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_class: Option<String>,
}

/// Prepaid registration fee receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub number: String,
    pub amount: u32,
    pub issued_on: NaiveDate,
    pub is_used: bool,
    pub used_by_student_id: Option<StudentId>,
}

/// Outstanding work per queue, for the staff dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingActionCounts {
    pub pending_applications: usize,
    pub awaiting_payment: usize,
    pub payment_verification: usize,
    pub in_assessment: usize,
    pub ready_to_finalize: usize,
}
