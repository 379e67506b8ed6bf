use crate::flat::FlatDiff;
use serde::Serialize;
use std::collections::BTreeMap;

pub const MS_PER_DAY: i64 = 86_400_000;

/// Default outlier bound for [`trimmed`], in standard deviations.
pub const TRIM_SIGMAS: f64 = 3.0;

/// Group key for diffs whose first file carries no classification.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Rebases dates onto the earliest one and buckets them into whole days.
pub fn scaled_dates(diffs: &[FlatDiff]) -> Vec<FlatDiff> {
    let Some(min_date) = diffs.iter().map(FlatDiff::date).min() else {
        return Vec::new();
    };
    diffs
        .iter()
        .map(|d| d.with_date((d.date() - min_date).div_euclid(MS_PER_DAY)))
        .collect()
}

/// Folds diffs sharing a date, keyed by that date.
///
/// Within a date, each diff merges into the first compatible accumulator
/// entry in insertion order, or starts a new entry. The result therefore
/// depends on input order when several entries could accept a diff.
pub fn merged_groups(diffs: &[FlatDiff]) -> BTreeMap<i64, Vec<FlatDiff>> {
    let mut groups: BTreeMap<i64, Vec<FlatDiff>> = BTreeMap::new();
    for diff in diffs {
        let acc = groups.entry(diff.date()).or_default();
        if !acc.iter_mut().any(|entry| entry.merge(diff)) {
            acc.push(diff.clone());
        }
    }
    groups
}

/// [`merged_groups`] concatenated in ascending date order.
pub fn merged(diffs: &[FlatDiff]) -> Vec<FlatDiff> {
    merged_groups(diffs).into_values().flatten().collect()
}

/// Population statistics of `additions + deletions`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChangeStats {
    pub count: usize,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
    pub variance: f64,
    pub standard_deviation: f64,
}

impl ChangeStats {
    pub fn of(diffs: &[FlatDiff]) -> Option<Self> {
        if diffs.is_empty() {
            return None;
        }
        let values: Vec<u64> = diffs.iter().map(FlatDiff::changes).collect();
        let count = values.len();
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count as f64;
        let variance = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Some(Self {
            count,
            mean,
            min: values.iter().copied().min().unwrap_or(0),
            max: values.iter().copied().max().unwrap_or(0),
            variance,
            standard_deviation: variance.sqrt(),
        })
    }
}

/// Drops diffs whose change size lies [`TRIM_SIGMAS`] or more standard
/// deviations from the mean.
pub fn trimmed(diffs: &[FlatDiff]) -> Vec<FlatDiff> {
    trimmed_within(diffs, TRIM_SIGMAS)
}

pub fn trimmed_within(diffs: &[FlatDiff], sigmas: f64) -> Vec<FlatDiff> {
    let Some(stats) = ChangeStats::of(diffs) else {
        return diffs.to_vec();
    };
    if stats.standard_deviation == 0.0 {
        return diffs.to_vec();
    }
    let bound = stats.standard_deviation * sigmas;
    diffs
        .iter()
        .filter(|d| (d.changes() as f64 - stats.mean).abs() < bound)
        .cloned()
        .collect()
}

/// A diff mapped into the unit square. Larger changes sit closer to `y = 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

/// Maps `value` from `[lo, hi]` onto `[0, 1]`, clamping outside values.
/// An empty domain maps everything to 0.
pub fn lerp_unit(value: f64, lo: f64, hi: f64) -> f64 {
    if value > hi {
        1.0
    } else if value < lo {
        0.0
    } else if hi <= lo {
        0.0
    } else {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    }
}

/// Plot points per classification, with both axes normalized over the
/// whole input rather than per group.
pub fn normalized(diffs: &[FlatDiff]) -> BTreeMap<String, Vec<PlotPoint>> {
    let mut groups: BTreeMap<String, Vec<PlotPoint>> = BTreeMap::new();
    if diffs.is_empty() {
        return groups;
    }

    let (mut min_x, mut max_x) = (f64::MAX, f64::MIN);
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for d in diffs {
        let (x, y) = (d.date() as f64, d.changes() as f64);
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    for d in diffs {
        let key = d.merged_criteria().unwrap_or(UNCLASSIFIED).to_string();
        groups.entry(key).or_default().push(PlotPoint {
            x: lerp_unit(d.date() as f64, min_x, max_x),
            y: 1.0 - lerp_unit(d.changes() as f64, min_y, max_y),
            label: point_label(d),
        });
    }
    groups
}

fn point_label(diff: &FlatDiff) -> String {
    let shas: Vec<&str> = diff.shas().iter().map(String::as_str).collect();
    format!("{} ({} lines changed)", shas.join(" + "), diff.changes())
}
