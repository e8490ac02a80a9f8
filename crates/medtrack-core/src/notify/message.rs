//! Mail templates.
//!
//! One function per message kind, each returning `(subject, body)`. The
//! bodies are plain text; every backend delivers them verbatim.

use chrono::NaiveDate;
use indoc::formatdoc;

use crate::treatment::{Patient, Step};

/// Sent when an active step's duration has elapsed.
///
/// Tells the patient which step just finished and, when the treatment has a
/// successor, its name, duration, and start date. The final step gets a
/// completion paragraph instead.
pub fn step_finished(
    patient: &Patient,
    step: &Step,
    next: Option<&Step>,
    today: NaiveDate,
) -> (String, String) {
    let subject = format!("Treatment step '{}' completed", step.name);

    let next_section = match next {
        Some(next) => formatdoc! {r#"
            Your next step is: "{name}"
            Duration: {days} days
            Start date: {start}
        "#,
            name = next.name,
            days = next.duration_days,
            start = today,
        },
        None => "Congratulations! This was your final treatment step.\n".to_string(),
    };

    let body = formatdoc! {r#"
        Hello {patient},

        You have completed the treatment step: "{step}"

        Your current step is now finished and your treatment plan is moving
        on. Progress photos are optional but encouraged for tracking.

        Next step:
        {next_section}
        Follow your treatment plan carefully and contact your doctor if you
        have any questions.

        Best regards,
        Your Medical Treatment Team
    "#,
        patient = patient.name,
        step = step.name,
    };

    (subject, body)
}

/// Sent when a new step is activated through the manual completion path.
pub fn step_started(patient: &Patient, step: &Step) -> (String, String) {
    let subject = format!("New treatment step started: '{}'", step.name);

    let description = if step.description.is_empty() {
        String::new()
    } else {
        format!("\nDescription:\n{}\n", step.description)
    };

    let body = formatdoc! {r#"
        Hello {patient},

        Great job completing your previous treatment step!

        Your new treatment step has started:
        Step: "{step}"
        Duration: {days} days
        Start date: {start}
        {description}
        You'll receive another notification when this step is completed.

        Best regards,
        Your Medical Treatment Team
    "#,
        patient = patient.name,
        step = step.name,
        days = step.duration_days,
        start = step.start_date,
    };

    (subject, body)
}

/// Operational test message for verifying the delivery configuration.
pub fn delivery_check(to: &str) -> (String, String) {
    let subject = "Medtrack delivery check".to_string();
    let body = formatdoc! {"
        This is a test message sent to {to}.

        If you are reading it, the notification settings are working.
    "};
    (subject, body)
}
