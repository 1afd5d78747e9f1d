//! Population aggregation and statistics.
//!
//! This module turns a collection of patient records into the population
//! summary shown on the clinician dashboard, plus the small helpers the
//! presentation layer and prompt builder need on top of it.

use crate::models::{
    AggregationSummary, HealthTier, Nutrient, NutrientAverage, PatientHealthRecord, Sex,
};
use tracing::debug;

/// Compute population statistics from a set of records.
///
/// Missing entries are dropped before anything else. Records whose sex is
/// neither male nor female count towards `total_patients` only. Averages are
/// means over the raw active scores truncated toward zero; the overall
/// average is taken over all male and female scores together, not over the
/// two group averages. Never fails: empty input yields the all-zero summary.
pub fn compute_summary(records: &[Option<PatientHealthRecord>]) -> AggregationSummary {
    let present: Vec<&PatientHealthRecord> = records.iter().flatten().collect();

    let male_scores: Vec<f64> = present
        .iter()
        .filter(|r| r.sex == Sex::Male)
        .map(|r| r.heifa_total_score_male)
        .collect();
    let female_scores: Vec<f64> = present
        .iter()
        .filter(|r| r.sex == Sex::Female)
        .map(|r| r.heifa_total_score_female)
        .collect();

    let combined: Vec<f64> = male_scores
        .iter()
        .chain(female_scores.iter())
        .copied()
        .collect();

    let mut summary = AggregationSummary {
        total_patients: present.len(),
        male_count: male_scores.len(),
        female_count: female_scores.len(),
        male_average_score: truncated_mean(&male_scores),
        female_average_score: truncated_mean(&female_scores),
        overall_average_score: truncated_mean(&combined),
        ..Default::default()
    };

    for score in &combined {
        match HealthTier::from_score(truncate_score(*score)) {
            HealthTier::Healthy => summary.healthy_count += 1,
            HealthTier::AtRisk => summary.at_risk_count += 1,
            HealthTier::Unhealthy => summary.unhealthy_count += 1,
        }
    }

    debug!(
        "Aggregated {} records ({} missing): {} male, {} female, overall avg {}",
        summary.total_patients,
        records.len() - present.len(),
        summary.male_count,
        summary.female_count,
        summary.overall_average_score
    );

    summary
}

/// Convert a score to an integer, truncating toward zero.
pub fn truncate_score(score: f64) -> i64 {
    // `as` truncates, saturates at the bounds and maps NaN to 0.
    score as i64
}

fn truncated_mean(scores: &[f64]) -> i64 {
    if scores.is_empty() {
        return 0;
    }
    truncate_score(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Integer percentage of `count` in `total`, rounded down.
///
/// Multiplies before dividing so that 2 of 7 is 28, not 0.
pub fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count * 100) / total) as u32
}

/// Fill fraction for a percentage bar, `0.0` when there is nothing to show.
pub fn bar_fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

/// Compute the population mean of every HEIFA component.
///
/// Only male and female records contribute, each through its own
/// sex-specific fields.
pub fn compute_nutrient_averages(records: &[Option<PatientHealthRecord>]) -> Vec<NutrientAverage> {
    let scored: Vec<&PatientHealthRecord> = records
        .iter()
        .flatten()
        .filter(|r| r.active_total().is_some())
        .collect();

    Nutrient::ALL
        .iter()
        .map(|&nutrient| {
            let values: Vec<f64> = scored
                .iter()
                .filter_map(|r| r.active_component(nutrient))
                .collect();
            let average = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };
            NutrientAverage {
                nutrient,
                average,
                max_score: nutrient.max_score(),
            }
        })
        .collect()
}

/// Components whose population average is furthest below its maximum.
pub fn weakest_nutrients(averages: &[NutrientAverage], n: usize) -> Vec<&NutrientAverage> {
    let mut sorted: Vec<&NutrientAverage> = averages.iter().collect();
    sorted.sort_by(|a, b| {
        let ra = a.average / a.max_score;
        let rb = b.average / b.max_score;
        ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

/// Generate a plain-text digest of the summary.
///
/// Tier percentages are relative to `total_patients`.
pub fn build_digest(summary: &AggregationSummary) -> String {
    let total = summary.total_patients;
    let mut lines = Vec::new();

    lines.push(format!("Total patients: {}", total));
    lines.push(format!(
        "Male: {} | Female: {}",
        summary.male_count, summary.female_count
    ));
    for tier in [HealthTier::Healthy, HealthTier::AtRisk, HealthTier::Unhealthy] {
        let count = summary.tier_count(tier);
        lines.push(format!(
            "{} patients: {} ({}%)",
            tier,
            count,
            percentage(count, total)
        ));
    }
    lines.push(format!(
        "Average HEIFA score: male {}, female {}, overall {}",
        summary.male_average_score, summary.female_average_score, summary.overall_average_score
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn male(score: f64) -> Option<PatientHealthRecord> {
        Some(PatientHealthRecord {
            sex: Sex::Male,
            heifa_total_score_male: score,
            // Deliberately different so mixing fields would show up.
            heifa_total_score_female: 0.0,
            ..Default::default()
        })
    }

    fn female(score: f64) -> Option<PatientHealthRecord> {
        Some(PatientHealthRecord {
            sex: Sex::Female,
            heifa_total_score_male: 100.0,
            heifa_total_score_female: score,
            ..Default::default()
        })
    }

    fn with_sex(sex: &str, score: f64) -> Option<PatientHealthRecord> {
        Some(PatientHealthRecord {
            sex: Sex::from(sex),
            heifa_total_score_male: score,
            heifa_total_score_female: score,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let summary = compute_summary(&[]);
        assert_eq!(summary, AggregationSummary::default());
        assert_eq!(summary.total_patients, 0);
        assert_eq!(summary.overall_average_score, 0);
    }

    #[test]
    fn test_only_missing_entries_is_all_zero() {
        let summary = compute_summary(&[None, None]);
        assert_eq!(summary, AggregationSummary::default());
    }

    #[test]
    fn test_overall_average_uses_concatenation() {
        let records = vec![male(90.0), male(70.0), female(50.0)];
        let summary = compute_summary(&records);

        assert_eq!(summary.male_average_score, 80);
        assert_eq!(summary.female_average_score, 50);
        assert_eq!(summary.overall_average_score, 70);
    }

    #[test]
    fn test_average_truncates() {
        assert_eq!(compute_summary(&[male(81.0), male(82.0)]).male_average_score, 81);
        assert_eq!(compute_summary(&[male(81.0), male(83.0)]).male_average_score, 82);
        assert_eq!(compute_summary(&[female(64.9)]).female_average_score, 64);
    }

    #[test]
    fn test_tier_boundaries() {
        let records = vec![male(80.0), male(79.0), female(50.0), female(49.0)];
        let summary = compute_summary(&records);

        assert_eq!(summary.healthy_count, 1);
        assert_eq!(summary.at_risk_count, 2);
        assert_eq!(summary.unhealthy_count, 1);
    }

    #[test]
    fn test_tier_uses_truncated_score() {
        // 79.99 truncates to 79, 49.5 to 49
        let summary = compute_summary(&[male(79.99), female(49.5)]);
        assert_eq!(summary.healthy_count, 0);
        assert_eq!(summary.at_risk_count, 1);
        assert_eq!(summary.unhealthy_count, 1);
    }

    #[test]
    fn test_sex_match_is_case_insensitive() {
        let records = vec![with_sex("male", 60.0), with_sex("MALE", 70.0), with_sex("Male", 80.0)];
        let summary = compute_summary(&records);
        assert_eq!(summary.male_count, 3);
        assert_eq!(summary.female_count, 0);
        assert_eq!(summary.male_average_score, 70);
    }

    #[test]
    fn test_other_sex_counts_only_in_total() {
        let records = vec![male(90.0), with_sex("Other", 10.0), None, female(60.0)];
        let summary = compute_summary(&records);

        assert_eq!(summary.total_patients, 3);
        assert_eq!(summary.male_count, 1);
        assert_eq!(summary.female_count, 1);
        assert_eq!(summary.unhealthy_count, 0);
        assert_eq!(summary.overall_average_score, 75);
    }

    #[test]
    fn test_counts_invariants() {
        let records = vec![
            male(12.0),
            female(99.0),
            with_sex("unknown", 55.0),
            None,
            female(55.5),
            male(80.0),
        ];
        let summary = compute_summary(&records);

        assert!(summary.male_count + summary.female_count <= summary.total_patients);
        assert_eq!(
            summary.healthy_count + summary.at_risk_count + summary.unhealthy_count,
            summary.scored_count()
        );
    }

    #[test]
    fn test_partitions_cover_total_without_other_sex() {
        let mut records = vec![
            male(12.0),
            with_sex("FEMALE", 99.0),
            None,
            with_sex("male", 55.5),
            female(80.0),
        ];
        let summary = compute_summary(&records);
        assert_eq!(summary.total_patients, 4);
        assert_eq!(summary.male_count + summary.female_count, summary.total_patients);

        records.push(with_sex("unknown", 70.0));
        let summary = compute_summary(&records);
        assert_eq!(summary.total_patients, 5);
        assert!(summary.male_count + summary.female_count < summary.total_patients);
    }

    #[test]
    fn test_percentage_integer_division() {
        assert_eq!(percentage(2, 7), 28);
        assert_eq!(percentage(7, 7), 100);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(3, 0), 0);
    }

    #[test]
    fn test_bar_fraction_clamps_empty_total() {
        assert_eq!(bar_fraction(1, 0), 0.0);
        assert_eq!(bar_fraction(1, 4), 0.25);
    }

    #[test]
    fn test_nutrient_averages_use_active_fields() {
        let m = PatientHealthRecord {
            sex: Sex::Male,
            water_male: 4.0,
            water_female: 0.0,
            vegetables_male: 6.0,
            ..Default::default()
        };
        let f = PatientHealthRecord {
            sex: Sex::Female,
            water_male: 0.0,
            water_female: 2.0,
            vegetables_female: 10.0,
            ..Default::default()
        };
        let other = PatientHealthRecord {
            sex: Sex::from("Other"),
            water_male: 5.0,
            water_female: 5.0,
            ..Default::default()
        };

        let averages = compute_nutrient_averages(&[Some(m), None, Some(f), Some(other)]);
        assert_eq!(averages.len(), Nutrient::ALL.len());

        let water = averages
            .iter()
            .find(|a| a.nutrient == Nutrient::Water)
            .unwrap();
        assert_eq!(water.average, 3.0);
        assert_eq!(water.max_score, 5.0);

        let veg = averages
            .iter()
            .find(|a| a.nutrient == Nutrient::Vegetables)
            .unwrap();
        assert_eq!(veg.average, 8.0);
    }

    #[test]
    fn test_nutrient_averages_empty() {
        let averages = compute_nutrient_averages(&[]);
        assert!(averages.iter().all(|a| a.average == 0.0));
    }

    #[test]
    fn test_weakest_nutrients_relative_to_max() {
        let averages = vec![
            NutrientAverage {
                nutrient: Nutrient::Fruit,
                average: 4.0,
                max_score: 10.0,
            },
            NutrientAverage {
                nutrient: Nutrient::Water,
                average: 1.0,
                max_score: 5.0,
            },
            NutrientAverage {
                nutrient: Nutrient::Sodium,
                average: 9.0,
                max_score: 10.0,
            },
        ];
        let weakest = weakest_nutrients(&averages, 2);
        assert_eq!(weakest[0].nutrient, Nutrient::Water);
        assert_eq!(weakest[1].nutrient, Nutrient::Fruit);
    }

    #[test]
    fn test_build_digest() {
        let summary = AggregationSummary {
            total_patients: 7,
            male_count: 3,
            female_count: 4,
            healthy_count: 2,
            at_risk_count: 4,
            unhealthy_count: 1,
            male_average_score: 61,
            female_average_score: 70,
            overall_average_score: 66,
        };
        let digest = build_digest(&summary);

        assert!(digest.contains("Total patients: 7"));
        assert!(digest.contains("Healthy patients: 2 (28%)"));
        assert!(digest.contains("At Risk patients: 4 (57%)"));
        assert!(digest.contains("Unhealthy patients: 1 (14%)"));
        assert!(digest.contains("overall 66"));
    }
}
