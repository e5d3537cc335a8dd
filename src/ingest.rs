//! Tabular parsers for the mastery and submission datasets.
//!
//! The two inputs follow different conventions: mastery rows are read by
//! column position, submission rows by header name. Malformed rows are
//! dropped individually and never fail the whole table.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MASTERY_CLASS_COL: usize = 1;
const MASTERY_STUDENT_COL: usize = 2;
const MASTERY_KP_COL: usize = 3;
const MASTERY_SCORE_COL: usize = 6;
const MASTERY_MIN_COLUMNS: usize = 7;

/// One score measurement for a student on a knowledge point.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryRow {
    pub class_id: String,
    pub student_id: String,
    pub knowledge_point: String,
    pub score: f64,
}

/// One question submission event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRow {
    pub class_id: String,
    pub student_id: String,
    pub question_id: String,
    pub date: NaiveDate,
    pub timestamp: NaiveDateTime,
}

/// Header names of the submission export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionColumns {
    pub class: String,
    pub student_id: String,
    pub question_id: String,
    pub date: String,
    pub time: String,
}

impl Default for SubmissionColumns {
    fn default() -> Self {
        Self {
            class: "班级".to_string(),
            student_id: "学生ID".to_string(),
            question_id: "题目编号".to_string(),
            date: "提交时间(年月日)".to_string(),
            time: "提交时间(时分秒)".to_string(),
        }
    }
}

/// Column positions resolved from a submission header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    pub class: Option<usize>,
    pub student_id: Option<usize>,
    pub question_id: Option<usize>,
    pub date: Option<usize>,
    pub time: Option<usize>,
}

impl HeaderIndex {
    pub fn resolve(headers: &StringRecord, columns: &SubmissionColumns) -> Self {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        Self {
            class: position(&columns.class),
            student_id: position(&columns.student_id),
            question_id: position(&columns.question_id),
            date: position(&columns.date),
            time: position(&columns.time),
        }
    }
}

/// Parses the positional mastery table. The first line is a header and is skipped.
///
/// Quotes carry no meaning here: every line splits on `,`, so a stray `"`
/// only damages its own row.
pub fn parse_mastery_table(text: &str) -> Vec<MasteryRow> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for result in reader.records() {
        match result.ok().and_then(|record| parse_mastery_record(&record)) {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }

    debug!(rows = rows.len(), dropped, "Parsed mastery table");
    rows
}

fn parse_mastery_record(record: &StringRecord) -> Option<MasteryRow> {
    if record.len() < MASTERY_MIN_COLUMNS {
        return None;
    }

    let student_id = record.get(MASTERY_STUDENT_COL)?.trim();
    let knowledge_point = record.get(MASTERY_KP_COL)?.trim();
    if student_id.is_empty() || knowledge_point.is_empty() {
        return None;
    }

    let score: f64 = record.get(MASTERY_SCORE_COL)?.trim().parse().ok()?;
    if !score.is_finite() {
        return None;
    }

    Some(MasteryRow {
        class_id: record.get(MASTERY_CLASS_COL)?.trim().to_string(),
        student_id: student_id.to_string(),
        knowledge_point: knowledge_point.to_string(),
        score,
    })
}

/// Parses the header-keyed submission table.
pub fn parse_submission_table(text: &str, columns: &SubmissionColumns) -> Vec<SubmissionRow> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let index = match reader.headers() {
        Ok(headers) => HeaderIndex::resolve(headers, columns),
        Err(e) => {
            debug!(error = %e, "Submission table has no readable header");
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for result in reader.records() {
        match result
            .ok()
            .and_then(|record| parse_submission_record(&record, &index))
        {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }

    debug!(rows = rows.len(), dropped, "Parsed submission table");
    rows
}

/// Converts one submission record, or `None` if the student id or date is unusable.
pub fn parse_submission_record(record: &StringRecord, index: &HeaderIndex) -> Option<SubmissionRow> {
    let field = |pos: Option<usize>| field_at(record, pos);

    let student_id = field(index.student_id);
    if student_id.is_empty() {
        return None;
    }

    let date = parse_date(field(index.date))?;
    let time = parse_time(field(index.time));

    Some(SubmissionRow {
        class_id: field(index.class).to_string(),
        student_id: student_id.to_string(),
        question_id: field(index.question_id).to_string(),
        date,
        timestamp: date.and_time(time),
    })
}

fn field_at(record: &StringRecord, pos: Option<usize>) -> &str {
    pos.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
}

/// Accepts `Y/M/D` or `Y-M-D`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split(['/', '-']);
    let year = parts.next()?.trim().parse().ok()?;
    let month = parts.next()?.trim().parse().ok()?;
    let day = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses `H[:M[:S]]`; anything absent or unusable is midnight.
pub fn parse_time(s: &str) -> NaiveTime {
    let s = s.trim();
    if s.is_empty() {
        return NaiveTime::MIN;
    }

    let mut hms = [0u32; 3];
    for (i, part) in s.split(':').enumerate() {
        if i >= hms.len() {
            return NaiveTime::MIN;
        }
        match part.trim().parse() {
            Ok(v) => hms[i] = v,
            Err(_) => return NaiveTime::MIN,
        }
    }

    NaiveTime::from_hms_opt(hms[0], hms[1], hms[2]).unwrap_or(NaiveTime::MIN)
}
