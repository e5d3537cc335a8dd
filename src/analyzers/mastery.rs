//! Mastery aggregation: per-student knowledge-point averages and class comparisons.

use crate::analyzers::types::{KnowledgeOrder, RadarSeries, StudentProfile};
use crate::analyzers::utility::{mean, to_percent};
use crate::ingest::MasteryRow;
use std::collections::HashMap;

/// Groups rows by student, then by knowledge point, and averages each group.
///
/// A student's class is taken from the first row seen for that student.
/// `overall_average` gives every knowledge point equal weight regardless of
/// how many measurements it has.
pub fn aggregate_by_student(rows: &[MasteryRow]) -> HashMap<String, StudentProfile> {
    let mut grouped: HashMap<&str, (&str, HashMap<&str, Vec<f64>>)> = HashMap::new();

    for row in rows {
        let (_, scores) = grouped
            .entry(row.student_id.as_str())
            .or_insert_with(|| (row.class_id.as_str(), HashMap::new()));
        scores
            .entry(row.knowledge_point.as_str())
            .or_default()
            .push(row.score);
    }

    grouped
        .into_iter()
        .map(|(student_id, (class_id, scores))| {
            let kp_average: HashMap<String, f64> = scores
                .into_iter()
                .map(|(kp, values)| (kp.to_string(), mean(&values)))
                .collect();
            let per_kp: Vec<f64> = kp_average.values().copied().collect();

            let profile = StudentProfile {
                id: student_id.to_string(),
                class_id: class_id.to_string(),
                overall_average: mean(&per_kp),
                kp_average,
            };
            (student_id.to_string(), profile)
        })
        .collect()
}

/// Average of each knowledge point over the students of `class_id` that have it.
///
/// Values stay on the 0–1 scale. A point nobody in the class has is 0.
pub fn class_average<'a, I>(profiles: I, class_id: &str, order: &KnowledgeOrder) -> Vec<f64>
where
    I: IntoIterator<Item = &'a StudentProfile>,
{
    let mut sums = vec![0.0; order.len()];
    let mut counts = vec![0usize; order.len()];

    for profile in profiles.into_iter().filter(|p| p.class_id == class_id) {
        for (i, kp) in order.iter().enumerate() {
            if let Some(v) = profile.kp_average.get(kp) {
                sums[i] += v;
                counts[i] += 1;
            }
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect()
}

/// `class_average` on the 0–100 display scale.
pub fn class_series<'a, I>(profiles: I, class_id: &str, order: &KnowledgeOrder) -> Vec<f64>
where
    I: IntoIterator<Item = &'a StudentProfile>,
{
    class_average(profiles, class_id, order)
        .into_iter()
        .map(to_percent)
        .collect()
}

/// The student's own averages on the 0–100 display scale, 0 where absent.
pub fn personal_series(profile: &StudentProfile, order: &KnowledgeOrder) -> Vec<f64> {
    order
        .iter()
        .map(|kp| to_percent(profile.kp_average.get(kp).copied().unwrap_or(0.0)))
        .collect()
}

/// Frozen result of one mastery dataset load.
#[derive(Debug, Clone, Default)]
pub struct MasteryIndex {
    profiles: HashMap<String, StudentProfile>,
    classes: HashMap<String, Vec<String>>,
}

impl MasteryIndex {
    pub fn build(rows: &[MasteryRow]) -> Self {
        let profiles = aggregate_by_student(rows);

        // Roster order follows first appearance in the input.
        let mut classes: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let Some(profile) = profiles.get(&row.student_id) else {
                continue;
            };
            let roster = classes.entry(profile.class_id.clone()).or_default();
            if !roster.contains(&profile.id) {
                roster.push(profile.id.clone());
            }
        }

        Self { profiles, classes }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn contains(&self, student_id: &str) -> bool {
        self.profiles.contains_key(student_id)
    }

    pub fn profile(&self, student_id: &str) -> Option<&StudentProfile> {
        self.profiles.get(student_id)
    }

    /// Students of one class in first-seen order.
    pub fn class_roster(&self, class_id: &str) -> &[String] {
        self.classes.get(class_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Class ids ordered by their numeric part, then by name.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_by(|a, b| class_number(a).cmp(&class_number(b)).then(a.cmp(b)));
        names
    }

    /// Radar input for one student, or `None` if the student is not in the roster.
    pub fn radar(&self, student_id: &str, order: &KnowledgeOrder) -> Option<RadarSeries> {
        let profile = self.profiles.get(student_id)?;
        let classmates = self
            .class_roster(&profile.class_id)
            .iter()
            .filter_map(|id| self.profiles.get(id));

        Some(RadarSeries {
            labels: order.labels(),
            personal: personal_series(profile, order),
            class_average: class_series(classmates, &profile.class_id, order),
        })
    }
}

fn class_number(name: &str) -> u64 {
    name.chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}
