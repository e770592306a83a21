use crate::infra::{in_memory_service, InMemoryService};
use chrono::{Days, Local, NaiveDate};
use clap::Args;
use school_admissions::config::AdmissionsConfig;
use school_admissions::error::AppError;
use school_admissions::workflows::enrollment::assessment::{day_percentage, thinking_tasks};
use school_admissions::workflows::enrollment::{
    ApplicationSubmission, AssessmentDayInput, DailyScores, Division, GuardianContact,
    PaymentVerification, Response, SelfCareInput, SelfCareResponses, StudentRecord,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Application date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Rating (0-5) given on every teacher observation field.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=5))]
    pub(crate) daily_rating: u8,
    /// Skip the mainstream learner and the rejected receipt walkthrough.
    #[arg(long)]
    pub(crate) skip_mainstream: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        daily_rating,
        skip_mainstream,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let service = in_memory_service(&AdmissionsConfig::default());

    println!("School admissions demo ({today})");
    for number in ["R-1001", "R-1002"] {
        let receipt = service.add_receipt(number, 150, today)?;
        println!("- Registered receipt {} as {}", receipt.number, receipt.id);
    }

    println!("\nSpecial-needs learner");
    let student = admit(&service, special_needs_learner(today), today)?;
    pay(&service, &student, "R-1001")?;

    for day in 1..=14u8 {
        let input = observation(today, day, daily_rating);
        let record = service.save_assessment_day(&student.id, day, input)?;
        if day == 1 || day == 14 {
            println!(
                "  Day {:>2}: total {:.2} ({}%) | task: {}",
                day,
                record.daily_total_score,
                day_percentage(record.daily_total_score),
                record.thinking_task.description
            );
        }
    }
    let parent = service.save_parent_self_care(&student.id, questionnaire(today))?;
    println!("  Parent self-care score: {:.2}", parent.calculated_score);

    let finalized = service.finalize_assessment(&student.id)?;
    println!(
        "  Teacher average {:.2} | final average {:.2} -> {} in {}",
        finalized.outcome.teacher_average,
        finalized.outcome.final_average,
        finalized.outcome.stage,
        finalized.outcome.assigned_class
    );

    if !skip_mainstream {
        println!("\nMainstream learner");
        let student = admit(&service, mainstream_learner(today), today)?;
        pay(&service, &student, "R-1001")?;
        service.submit_receipt(&student.id, "R-1002")?;
        pay(&service, &student, "R-1002")?;
    }

    let counts = service.pending_action_counts()?;
    println!(
        "\nQueues: {} pending applications | {} awaiting payment | {} to verify | {} in assessment",
        counts.pending_applications,
        counts.awaiting_payment,
        counts.payment_verification,
        counts.in_assessment
    );
    for student in service.students()? {
        match serde_json::to_string(&student.status_view()) {
            Ok(json) => println!("  {json}"),
            Err(err) => println!("  Status view unavailable: {err}"),
        }
    }

    Ok(())
}

pub(crate) fn print_thinking_tasks() {
    for task in thinking_tasks() {
        println!("Day {:>2}: {}", task.task_id, task.description);
    }
}

fn admit(
    service: &InMemoryService,
    submission: ApplicationSubmission,
    today: NaiveDate,
) -> Result<StudentRecord, AppError> {
    let application = service.submit_application(submission, today)?;
    let student = service.enroll(&application.id)?;
    println!(
        "- Application {} approved as {} ({})",
        application.id,
        student.id,
        student.base_level().unwrap_or("no level")
    );
    service.submit_receipt(&student.id, "R-1001")?;
    Ok(student)
}

fn pay(service: &InMemoryService, student: &StudentRecord, number: &str) -> Result<(), AppError> {
    match service.verify_receipt(&student.id, number)? {
        PaymentVerification::Verified { student, receipt_id } => println!(
            "  Receipt {} ({}) verified -> {}",
            number,
            receipt_id,
            student.status.label()
        ),
        PaymentVerification::Rejected { student, reason } => println!(
            "  Receipt {} rejected: {} -> {}",
            number,
            reason,
            student.status.label()
        ),
    }
    Ok(())
}

fn guardians() -> Vec<GuardianContact> {
    vec![GuardianContact {
        name: "Demo Parent".to_string(),
        relationship: "parent".to_string(),
        phone: "000-0000".to_string(),
        email: None,
    }]
}

fn born_years_before(today: NaiveDate, years: u32) -> NaiveDate {
    today
        .checked_sub_months(chrono::Months::new(years * 12))
        .unwrap_or(today)
}

fn special_needs_learner(today: NaiveDate) -> ApplicationSubmission {
    ApplicationSubmission {
        learner_name: "Demo Learner A".to_string(),
        date_of_birth: born_years_before(today, 10),
        division: Division::SpecialNeeds,
        applied_grade: None,
        guardians: guardians(),
        previous_school: None,
        notes: None,
    }
}

fn mainstream_learner(today: NaiveDate) -> ApplicationSubmission {
    ApplicationSubmission {
        learner_name: "Demo Learner B".to_string(),
        date_of_birth: born_years_before(today, 8),
        division: Division::Mainstream,
        applied_grade: Some("Grade 3".to_string()),
        guardians: guardians(),
        previous_school: None,
        notes: None,
    }
}

fn observation(today: NaiveDate, day: u8, rating: u8) -> AssessmentDayInput {
    AssessmentDayInput {
        scores: DailyScores {
            numbers: rating,
            reading: rating,
            self_care: rating,
            behaviour: rating,
            senses: rating,
        },
        thinking_response: Some(Response::Yes),
        abc_logs: Vec::new(),
        completed: true,
        date: today + Days::new(u64::from(day)),
    }
}

fn questionnaire(today: NaiveDate) -> SelfCareInput {
    SelfCareInput {
        responses: SelfCareResponses::uniform(Response::Yes),
        comments: String::new(),
        completed_date: today + Days::new(14),
    }
}
