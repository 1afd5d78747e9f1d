//! Data models for the nutrition dashboard.
//!
//! This module contains the patient record shape consumed from the record
//! source, the closed enums used to select sex-specific fields, and the
//! summary/report structures produced from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sex of a patient as recorded in the source data.
///
/// Parsed case-insensitively; anything that is not "male" or "female" is
/// kept verbatim as `Other` so it can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sex {
    Male,
    Female,
    Other(String),
}

impl Default for Sex {
    fn default() -> Self {
        Sex::Other(String::new())
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
            Sex::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Sex {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("male") {
            Sex::Male
        } else if s.eq_ignore_ascii_case("female") {
            Sex::Female
        } else {
            Sex::Other(s.to_string())
        }
    }
}

impl From<String> for Sex {
    fn from(s: String) -> Self {
        Sex::from(s.as_str())
    }
}

impl From<Sex> for String {
    fn from(sex: Sex) -> Self {
        sex.to_string()
    }
}

/// A HEIFA diet-quality component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Vegetables,
    Fruit,
    GrainsAndCereals,
    WholeGrains,
    MeatAndAlternatives,
    DairyAndAlternatives,
    Sodium,
    Alcohol,
    Water,
    Sugar,
    SaturatedFat,
    UnsaturatedFat,
    Discretionary,
}

impl Nutrient {
    /// Every component, in reporting order.
    pub const ALL: [Nutrient; 13] = [
        Nutrient::Vegetables,
        Nutrient::Fruit,
        Nutrient::GrainsAndCereals,
        Nutrient::WholeGrains,
        Nutrient::MeatAndAlternatives,
        Nutrient::DairyAndAlternatives,
        Nutrient::Sodium,
        Nutrient::Alcohol,
        Nutrient::Water,
        Nutrient::Sugar,
        Nutrient::SaturatedFat,
        Nutrient::UnsaturatedFat,
        Nutrient::Discretionary,
    ];

    /// Maximum attainable score for this component.
    pub fn max_score(&self) -> f64 {
        match self {
            Nutrient::Alcohol | Nutrient::Water => 5.0,
            _ => 10.0,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Nutrient::Vegetables => "Vegetables",
            Nutrient::Fruit => "Fruit",
            Nutrient::GrainsAndCereals => "Grains & Cereals",
            Nutrient::WholeGrains => "Whole Grains",
            Nutrient::MeatAndAlternatives => "Meat & Alternatives",
            Nutrient::DairyAndAlternatives => "Dairy & Alternatives",
            Nutrient::Sodium => "Sodium",
            Nutrient::Alcohol => "Alcohol",
            Nutrient::Water => "Water",
            Nutrient::Sugar => "Sugar",
            Nutrient::SaturatedFat => "Saturated Fat",
            Nutrient::UnsaturatedFat => "Unsaturated Fat",
            Nutrient::Discretionary => "Discretionary Foods",
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One patient's HEIFA scores.
///
/// Every score exists in a male and a female variant; only the variant
/// matching `sex` is meaningful for a given record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientHealthRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub sex: Sex,
    pub heifa_total_score_male: f64,
    pub heifa_total_score_female: f64,
    pub vegetables_male: f64,
    pub vegetables_female: f64,
    pub fruit_male: f64,
    pub fruit_female: f64,
    pub grains_and_cereals_male: f64,
    pub grains_and_cereals_female: f64,
    pub whole_grains_male: f64,
    pub whole_grains_female: f64,
    pub meat_and_alternatives_male: f64,
    pub meat_and_alternatives_female: f64,
    pub dairy_and_alternatives_male: f64,
    pub dairy_and_alternatives_female: f64,
    pub sodium_male: f64,
    pub sodium_female: f64,
    pub alcohol_male: f64,
    pub alcohol_female: f64,
    pub water_male: f64,
    pub water_female: f64,
    pub sugar_male: f64,
    pub sugar_female: f64,
    pub saturated_fat_male: f64,
    pub saturated_fat_female: f64,
    pub unsaturated_fat_male: f64,
    pub unsaturated_fat_female: f64,
    pub discretionary_male: f64,
    pub discretionary_female: f64,
}

impl PatientHealthRecord {
    /// The HEIFA total matching this record's sex, or `None` for `Other`.
    pub fn active_total(&self) -> Option<f64> {
        match self.sex {
            Sex::Male => Some(self.heifa_total_score_male),
            Sex::Female => Some(self.heifa_total_score_female),
            Sex::Other(_) => None,
        }
    }

    /// The component score matching this record's sex, or `None` for `Other`.
    pub fn active_component(&self, nutrient: Nutrient) -> Option<f64> {
        let (male, female) = self.component_pair(nutrient);
        match self.sex {
            Sex::Male => Some(male),
            Sex::Female => Some(female),
            Sex::Other(_) => None,
        }
    }

    fn component_pair(&self, nutrient: Nutrient) -> (f64, f64) {
        match nutrient {
            Nutrient::Vegetables => (self.vegetables_male, self.vegetables_female),
            Nutrient::Fruit => (self.fruit_male, self.fruit_female),
            Nutrient::GrainsAndCereals => {
                (self.grains_and_cereals_male, self.grains_and_cereals_female)
            }
            Nutrient::WholeGrains => (self.whole_grains_male, self.whole_grains_female),
            Nutrient::MeatAndAlternatives => (
                self.meat_and_alternatives_male,
                self.meat_and_alternatives_female,
            ),
            Nutrient::DairyAndAlternatives => (
                self.dairy_and_alternatives_male,
                self.dairy_and_alternatives_female,
            ),
            Nutrient::Sodium => (self.sodium_male, self.sodium_female),
            Nutrient::Alcohol => (self.alcohol_male, self.alcohol_female),
            Nutrient::Water => (self.water_male, self.water_female),
            Nutrient::Sugar => (self.sugar_male, self.sugar_female),
            Nutrient::SaturatedFat => (self.saturated_fat_male, self.saturated_fat_female),
            Nutrient::UnsaturatedFat => (self.unsaturated_fat_male, self.unsaturated_fat_female),
            Nutrient::Discretionary => (self.discretionary_male, self.discretionary_female),
        }
    }
}

/// Population health tier of a single (truncated) total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTier {
    /// 80 and above
    Healthy,
    /// 50 to 79
    AtRisk,
    /// Below 50
    Unhealthy,
}

impl HealthTier {
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            HealthTier::Healthy
        } else if score >= 50 {
            HealthTier::AtRisk
        } else {
            HealthTier::Unhealthy
        }
    }

    /// Returns an emoji representation of the tier.
    pub fn emoji(&self) -> &'static str {
        match self {
            HealthTier::Healthy => "🟢",
            HealthTier::AtRisk => "🟡",
            HealthTier::Unhealthy => "🔴",
        }
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthTier::Healthy => write!(f, "Healthy"),
            HealthTier::AtRisk => write!(f, "At Risk"),
            HealthTier::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Population statistics derived from a set of patient records.
///
/// `male_count + female_count` may be lower than `total_patients` when some
/// records carry a sex other than male or female. The three tier counts
/// always sum to `male_count + female_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub total_patients: usize,
    pub male_count: usize,
    pub female_count: usize,
    pub healthy_count: usize,
    pub at_risk_count: usize,
    pub unhealthy_count: usize,
    pub male_average_score: i64,
    pub female_average_score: i64,
    pub overall_average_score: i64,
}

impl AggregationSummary {
    /// Number of records that contributed a score.
    pub fn scored_count(&self) -> usize {
        self.male_count + self.female_count
    }

    /// Count for a single tier.
    pub fn tier_count(&self, tier: HealthTier) -> usize {
        match tier {
            HealthTier::Healthy => self.healthy_count,
            HealthTier::AtRisk => self.at_risk_count,
            HealthTier::Unhealthy => self.unhealthy_count,
        }
    }
}

/// Population mean of one component score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientAverage {
    pub nutrient: Nutrient,
    pub average: f64,
    pub max_score: f64,
}

/// Outcome of asking the model for insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightOutcome {
    /// Insight generation was not requested.
    Skipped,
    Generated { insights: Vec<String> },
    Failed { message: String },
}

/// Metadata about the dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path the records were loaded from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Name of the LLM model used, if insights were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Entries read from the source, including missing ones.
    pub records_read: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete population dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub summary: AggregationSummary,
    pub nutrient_averages: Vec<NutrientAverage>,
    pub insights: InsightOutcome,
    /// Dietary tip for a single patient, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_tip: Option<PatientTip>,
}

/// A generated tip for one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientTip {
    pub user_id: String,
    pub outcome: InsightOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_from_str_case_insensitive() {
        assert_eq!(Sex::from("Male"), Sex::Male);
        assert_eq!(Sex::from("male"), Sex::Male);
        assert_eq!(Sex::from("MALE"), Sex::Male);
        assert_eq!(Sex::from("fEmAlE"), Sex::Female);
        assert_eq!(Sex::from("Other"), Sex::Other("Other".to_string()));
    }

    #[test]
    fn test_sex_serde_keeps_unknown_text() {
        let sex: Sex = serde_json::from_str("\"Non-binary\"").unwrap();
        assert_eq!(sex, Sex::Other("Non-binary".to_string()));
        assert_eq!(serde_json::to_string(&sex).unwrap(), "\"Non-binary\"");
        assert_eq!(serde_json::to_string(&Sex::Male).unwrap(), "\"Male\"");
    }

    #[test]
    fn test_nutrient_max_scores() {
        assert_eq!(Nutrient::Alcohol.max_score(), 5.0);
        assert_eq!(Nutrient::Water.max_score(), 5.0);
        assert_eq!(Nutrient::Vegetables.max_score(), 10.0);
        assert_eq!(Nutrient::Discretionary.max_score(), 10.0);
    }

    #[test]
    fn test_active_fields_follow_sex() {
        let mut record = PatientHealthRecord {
            sex: Sex::Female,
            heifa_total_score_male: 40.0,
            heifa_total_score_female: 72.5,
            fruit_male: 1.0,
            fruit_female: 8.0,
            ..Default::default()
        };
        assert_eq!(record.active_total(), Some(72.5));
        assert_eq!(record.active_component(Nutrient::Fruit), Some(8.0));

        record.sex = Sex::Male;
        assert_eq!(record.active_total(), Some(40.0));
        assert_eq!(record.active_component(Nutrient::Fruit), Some(1.0));

        record.sex = Sex::from("Other");
        assert_eq!(record.active_total(), None);
        assert_eq!(record.active_component(Nutrient::Fruit), None);
    }

    #[test]
    fn test_record_deserializes_camel_case() {
        let json = r#"{
            "userId": "1",
            "sex": "male",
            "heifaTotalScoreMale": 64.2,
            "heifaTotalScoreFemale": 0,
            "vegetablesMale": 4.5,
            "waterMale": 5
        }"#;
        let record: PatientHealthRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.user_id.as_deref(), Some("1"));
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.active_total(), Some(64.2));
        assert_eq!(record.active_component(Nutrient::Vegetables), Some(4.5));
        assert_eq!(record.active_component(Nutrient::Water), Some(5.0));
        assert_eq!(record.active_component(Nutrient::Sugar), Some(0.0));
    }

    #[test]
    fn test_health_tier_boundaries() {
        assert_eq!(HealthTier::from_score(80), HealthTier::Healthy);
        assert_eq!(HealthTier::from_score(79), HealthTier::AtRisk);
        assert_eq!(HealthTier::from_score(50), HealthTier::AtRisk);
        assert_eq!(HealthTier::from_score(49), HealthTier::Unhealthy);
        assert_eq!(HealthTier::from_score(100), HealthTier::Healthy);
        assert_eq!(HealthTier::from_score(0), HealthTier::Unhealthy);
    }

    #[test]
    fn test_insight_outcome_serialization() {
        let outcome = InsightOutcome::Failed {
            message: "offline".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("offline"));
    }
}
