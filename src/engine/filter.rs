//! Post-standardization removal of study statistics masquerading as
//! measurable variables.
//!
//! Extraction sometimes returns "Hazard Ratio" or "95% CI" as if they were
//! things a cohort could measure. Two signals identify them: the name
//! matches a statistics vocabulary, or the value range sits in the narrow
//! envelope typical of ratio estimates.

use std::collections::BTreeMap;

use crate::models::Variable;

const STAT_KEYWORDS: &[&str] = &[
    "hazard ratio",
    "odds ratio",
    "relative risk",
    "risk ratio",
    "p-value",
    "p value",
    "confidence interval",
    "effect size",
    "correlation coefficient",
];

// Short forms only disqualify when they stand alone as a token, so
// "HR variability" style names survive.
const STAT_ABBREVIATIONS: &[&str] = &["hr", "or", "rr", "ci"];

// Names that never describe a generable variable regardless of range.
const ALWAYS_STATISTIC: &[&str] = &["mortality", "survival"];

/// Whether a variable looks like a reported study statistic rather than a
/// measurable quantity.
pub fn is_study_statistic(variable: &Variable) -> bool {
    let name = variable.name.to_lowercase();

    if ALWAYS_STATISTIC.iter().any(|term| name.contains(term)) {
        return true;
    }
    if STAT_KEYWORDS.iter().any(|term| name.contains(term)) {
        return true;
    }
    if name
        .split_whitespace()
        .any(|token| STAT_ABBREVIATIONS.contains(&token))
    {
        return true;
    }

    // Ratio envelope: min in [0.3, 1.0], max in [1.0, 3.0], mean in
    // [0.7, 1.5]. All three must be present and inside the envelope.
    if let Some(range) = variable.range {
        if let (Some(min), Some(max), Some(mean)) = (range.min, range.max, range.mean) {
            if (0.3..=1.0).contains(&min)
                && (1.0..=3.0).contains(&max)
                && (0.7..=1.5).contains(&mean)
            {
                return true;
            }
        }
    }

    false
}

/// Drop study statistics from the canonical pool, returning the names
/// removed.
pub fn filter_statistics(pool: &mut BTreeMap<String, Variable>) -> Vec<String> {
    let removed: Vec<String> = pool
        .iter()
        .filter(|(_, var)| is_study_statistic(var))
        .map(|(name, _)| name.clone())
        .collect();
    for name in &removed {
        pool.remove(name);
        tracing::debug!(name = %name, "filtered study statistic");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ValueRange, Variable};

    fn named(name: &str) -> Variable {
        Variable::cited_by(name, "PMID:1")
    }

    fn ranged(name: &str, min: f64, max: f64, mean: f64) -> Variable {
        let mut v = named(name);
        v.range = Some(ValueRange {
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            sd: None,
        });
        v
    }

    #[test]
    fn test_keyword_names_are_statistics() {
        assert!(is_study_statistic(&named("Hazard Ratio")));
        assert!(is_study_statistic(&named("adjusted odds ratio")));
        assert!(is_study_statistic(&named("95% confidence interval")));
        assert!(is_study_statistic(&named("all-cause mortality")));
    }

    #[test]
    fn test_standalone_abbreviations_disqualify() {
        assert!(is_study_statistic(&named("HR")));
        assert!(is_study_statistic(&named("adjusted OR")));
        assert!(!is_study_statistic(&named("HRV index")));
    }

    #[test]
    fn test_ratio_envelope() {
        assert!(is_study_statistic(&ranged("mystery estimate", 0.8, 1.9, 1.2)));
        // mean outside the envelope
        assert!(!is_study_statistic(&ranged("mystery estimate", 0.8, 1.9, 1.7)));
        // ordinary biomarker range
        assert!(!is_study_statistic(&ranged("CRP", 0.5, 15.0, 3.2)));
    }

    #[test]
    fn test_envelope_needs_all_three_bounds() {
        let mut v = named("partial estimate");
        v.range = Some(ValueRange {
            min: Some(0.8),
            max: Some(1.9),
            mean: None,
            sd: None,
        });
        assert!(!is_study_statistic(&v));
    }

    #[test]
    fn test_filter_removes_from_pool() {
        let mut pool = BTreeMap::new();
        pool.insert("CRP".to_string(), ranged("CRP", 0.5, 15.0, 3.2));
        pool.insert("Hazard Ratio".to_string(), named("Hazard Ratio"));

        let removed = filter_statistics(&mut pool);
        assert_eq!(removed, vec!["Hazard Ratio".to_string()]);
        assert_eq!(pool.len(), 1);
        assert!(pool.contains_key("CRP"));
    }
}
