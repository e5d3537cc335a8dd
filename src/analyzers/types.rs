//! Data types shared by the mastery and submission aggregators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Knowledge-point codes in axis order.
pub const DEFAULT_KNOWLEDGE_ORDER: [&str; 8] = [
    "t5V9e", "m3D1v", "g7R2j", "y9W5d", "b3C9s", "r8S3g", "s8Y2f", "k4W1c",
];

/// The fixed, ordered set of knowledge points every derived series is aligned to.
///
/// `labels` maps a code to its display name; codes without an entry are
/// displayed as themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeOrder {
    pub codes: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Default for KnowledgeOrder {
    fn default() -> Self {
        Self {
            codes: DEFAULT_KNOWLEDGE_ORDER.iter().map(|c| c.to_string()).collect(),
            labels: HashMap::new(),
        }
    }
}

impl KnowledgeOrder {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Display labels in axis order.
    pub fn labels(&self) -> Vec<String> {
        self.codes
            .iter()
            .map(|code| self.labels.get(code).unwrap_or(code).clone())
            .collect()
    }
}

/// Per-student mastery summary built from all of that student's rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub id: String,
    pub class_id: String,
    /// Mean score per knowledge point; only points with at least one measurement.
    pub kp_average: HashMap<String, f64>,
    /// Mean of the per-knowledge-point means.
    pub overall_average: f64,
}

/// Radar chart input: labels plus two series on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarSeries {
    pub labels: Vec<String>,
    pub personal: Vec<f64>,
    pub class_average: Vec<f64>,
}

impl RadarSeries {
    /// Labels for every knowledge point with both series all zero.
    pub fn empty(order: &KnowledgeOrder) -> Self {
        Self {
            labels: order.labels(),
            personal: vec![0.0; order.len()],
            class_average: vec![0.0; order.len()],
        }
    }
}

/// Submission count for one hour of day on one month ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourlyBucket {
    pub hour: u32,
    pub layer: u32,
    pub count: usize,
}

/// Submission count for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDayCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Inclusive date span covered by the whole submission dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CalendarRange {
    /// Number of days in the range, both ends included.
    pub fn days(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }
}

/// Both submission-derived views for a single student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentActivity {
    pub student_id: String,
    pub hourly: Vec<HourlyBucket>,
    pub calendar: Vec<CalendarDayCount>,
}
