use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::data_model::{DocumentUpdate, Task, TaskType};
use crate::error::Result;
use crate::executor::{IngestionContext, ProcessingStep, StepReport};
use crate::utils::text::contains_any;

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{1,2}[/\-][0-9]{1,2}[/\-][0-9]{2,4}(?-u:\b)").expect("date pattern must compile")
});

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[0-9,]+\.?[0-9]*").expect("amount pattern must compile"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u:\b)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}(?-u:\b)")
        .expect("email pattern must compile")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{3}[-.]?[0-9]{3}[-.]?[0-9]{4}(?-u:\b)").expect("phone pattern must compile")
});

static DUE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:due date|deadline)[:\s]+([0-9]{1,2}[/\-][0-9]{1,2}[/\-][0-9]{2,4})")
        .expect("due date pattern must compile")
});

const DEADLINE_PHRASES: &[&str] = &["due date", "deadline"];
const REVIEW_KEYWORDS: &[&str] = &["review", "approval"];

/// Everything the metadata scan derives from one text.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMetadata {
    pub metadata: Map<String, Value>,
    pub deadline: Option<DateTime<Utc>>,
    pub tasks: Vec<Task>,
}

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Parses a month-first date token such as `12/31/2024` or `1-5-24`.
///
/// Two-digit years below 50 are read as 20xx, the rest as 19xx. Tokens naming
/// an impossible calendar day yield `None`.
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let mut parts = token.split(['/', '-']);
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let mut year: i32 = year_part.parse().ok()?;
    if year_part.len() == 2 {
        year += if year < 50 { 2000 } else { 1900 };
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Only texts mentioning a due date or deadline get one: the date right after
/// the phrase when it parses, else the latest parseable date anywhere.
fn derive_deadline(text: &str, dates: &[String]) -> Option<DateTime<Utc>> {
    if !contains_any(text, DEADLINE_PHRASES) {
        return None;
    }

    let following = DUE_DATE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_date_token(m.as_str()));

    following
        .or_else(|| dates.iter().filter_map(|d| parse_date_token(d)).max())
        .and_then(midnight_utc)
}

pub fn extract_metadata(text: &str, document_id: &str) -> ExtractedMetadata {
    let dates = find_all(&DATE_RE, text);
    let amounts = find_all(&AMOUNT_RE, text);
    let emails = find_all(&EMAIL_RE, text);
    let phones = find_all(&PHONE_RE, text);

    let deadline = derive_deadline(text, &dates);

    let mut tasks = Vec::new();
    if contains_any(text, REVIEW_KEYWORDS) {
        let mut task = Task::new(
            "Document Review Required",
            format!("Review and process document: {}", document_id),
            TaskType::Review,
            2,
        );
        task.document_id = Some(document_id.to_string());
        task.due_date = deadline;
        tasks.push(task);
    }
    if deadline.is_some() {
        let mut task = Task::new(
            "Deadline Reminder",
            "Document has an upcoming deadline",
            TaskType::Deadline,
            3,
        );
        task.document_id = Some(document_id.to_string());
        task.due_date = deadline;
        tasks.push(task);
    }

    let mut metadata = Map::new();
    metadata.insert("extracted_dates".into(), json!(dates));
    metadata.insert("extracted_amounts".into(), json!(amounts));
    metadata.insert("extracted_emails".into(), json!(emails));
    metadata.insert("extracted_phones".into(), json!(phones));

    ExtractedMetadata {
        metadata,
        deadline,
        tasks,
    }
}

/// Scans the extracted text for dates, amounts, emails and phone numbers and
/// derives the deadline and follow-up tasks.
#[derive(Debug, Default)]
pub struct MetadataExtractionStep;

impl MetadataExtractionStep {
    pub fn new() -> Self {
        MetadataExtractionStep
    }
}

#[async_trait]
impl ProcessingStep for MetadataExtractionStep {
    fn name(&self) -> &'static str {
        "metadata_extraction"
    }

    async fn process(&self, context: &mut IngestionContext) -> Result<StepReport> {
        let extracted = extract_metadata(&context.ocr_text, &context.document_id);

        let count = |key: &str| {
            extracted
                .metadata
                .get(key)
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        };
        let details = json!({
            "dates_found": count("extracted_dates"),
            "amounts_found": count("extracted_amounts"),
            "emails_found": count("extracted_emails"),
            "phones_found": count("extracted_phones"),
            "deadline": extracted.deadline,
            "tasks_created": extracted.tasks.len(),
        });

        Ok(StepReport {
            update: DocumentUpdate {
                extracted_metadata: Some(extracted.metadata),
                deadline: Some(extracted.deadline),
                ..Default::default()
            },
            tasks: extracted.tasks,
            details,
        })
    }
}
