//! Submission indexing and the hourly-radial and calendar bucket views.

use crate::analyzers::types::{CalendarDayCount, CalendarRange, HourlyBucket, StudentActivity};
use crate::ingest::SubmissionRow;
use chrono::{Datelike, NaiveDate, Timelike};
use std::collections::{BTreeMap, HashMap};

/// Frozen result of one submission dataset load.
#[derive(Debug, Clone, Default)]
pub struct SubmissionIndex {
    by_student: HashMap<String, Vec<SubmissionRow>>,
    calendar_range: Option<CalendarRange>,
    total_records: usize,
}

impl SubmissionIndex {
    /// Groups rows per student and records the global date span of all rows.
    pub fn build(rows: Vec<SubmissionRow>) -> Self {
        let total_records = rows.len();
        let calendar_range = rows
            .iter()
            .map(|r| r.date)
            .min()
            .zip(rows.iter().map(|r| r.date).max())
            .map(|(start, end)| CalendarRange { start, end });

        let mut by_student: HashMap<String, Vec<SubmissionRow>> = HashMap::new();
        for row in rows {
            by_student.entry(row.student_id.clone()).or_default().push(row);
        }

        Self {
            by_student,
            calendar_range,
            total_records,
        }
    }

    pub fn calendar_range(&self) -> Option<CalendarRange> {
        self.calendar_range
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn student_count(&self) -> usize {
        self.by_student.len()
    }

    /// All records of one student; empty for an unknown id.
    pub fn records(&self, student_id: &str) -> &[SubmissionRow] {
        self.by_student
            .get(student_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn activity(&self, student_id: &str) -> StudentActivity {
        let records = self.records(student_id);
        StudentActivity {
            student_id: student_id.to_string(),
            hourly: build_hourly(records),
            calendar: build_calendar(records, self.calendar_range),
        }
    }
}

fn month_ordinal(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Counts submissions per (month layer, hour of day).
///
/// Layer 0 is the month of this student's earliest submission; each later
/// calendar month adds one. Buckets are ordered by layer, then hour.
pub fn build_hourly(records: &[SubmissionRow]) -> Vec<HourlyBucket> {
    let Some(first) = records.iter().map(|r| r.timestamp).min() else {
        return Vec::new();
    };
    let min_month = month_ordinal(first.date());

    let mut counts: BTreeMap<(u32, u32), usize> = BTreeMap::new();
    for r in records {
        let layer = (month_ordinal(r.timestamp.date()) - min_month) as u32;
        *counts.entry((layer, r.timestamp.hour())).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((layer, hour), count)| HourlyBucket { hour, layer, count })
        .collect()
}

/// One entry per day of the global range with this student's count for that day.
///
/// Without a range nothing is produced; the output length never depends on
/// the student's own activity span.
pub fn build_calendar(
    records: &[SubmissionRow],
    range: Option<CalendarRange>,
) -> Vec<CalendarDayCount> {
    let Some(range) = range else {
        return Vec::new();
    };

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for r in records {
        *per_day.entry(r.date).or_default() += 1;
    }

    range
        .start
        .iter_days()
        .take_while(|d| *d <= range.end)
        .map(|date| CalendarDayCount {
            date,
            count: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}
