//! Dashboard state container.
//!
//! Holds the latest population summary and insight status and publishes
//! every change through a `watch` channel. Subscribers always observe a
//! complete snapshot: the summary is swapped as a whole, never patched.

use crate::analysis::{
    build_digest, compute_nutrient_averages, compute_summary, weakest_nutrients,
};
use crate::insights::prompt::{build_population_prompt, parse_insights};
use crate::insights::InsightGenerator;
use crate::models::{AggregationSummary, InsightOutcome, NutrientAverage, PatientHealthRecord};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Status of the AI insight request.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightState {
    Idle,
    Loading,
    Ready(Vec<String>),
    Failed(String),
}

impl From<&InsightState> for InsightOutcome {
    fn from(state: &InsightState) -> Self {
        match state {
            InsightState::Idle | InsightState::Loading => InsightOutcome::Skipped,
            InsightState::Ready(insights) => InsightOutcome::Generated {
                insights: insights.clone(),
            },
            InsightState::Failed(message) => InsightOutcome::Failed {
                message: message.clone(),
            },
        }
    }
}

/// A complete view of the dashboard at one point in time.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub summary: Arc<AggregationSummary>,
    pub nutrient_averages: Arc<Vec<NutrientAverage>>,
    pub insights: InsightState,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            summary: Arc::new(AggregationSummary::default()),
            nutrient_averages: Arc::new(compute_nutrient_averages(&[])),
            insights: InsightState::Idle,
        }
    }
}

/// Publisher of dashboard snapshots.
pub struct DashboardState {
    tx: watch::Sender<DashboardSnapshot>,
    insight_count: usize,
}

impl DashboardState {
    /// Create an empty dashboard requesting `insight_count` insights.
    pub fn new(insight_count: usize) -> Self {
        let (tx, _rx) = watch::channel(DashboardSnapshot::default());
        Self { tx, insight_count }
    }

    /// Observe future snapshots.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.tx.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.tx.borrow().clone()
    }

    /// Recompute the summary from `records` and publish it.
    ///
    /// Insights computed for a different summary are reset to `Idle`.
    pub fn refresh(&self, records: &[Option<PatientHealthRecord>]) -> Arc<AggregationSummary> {
        let summary = Arc::new(compute_summary(records));
        let nutrient_averages = Arc::new(compute_nutrient_averages(records));

        info!(
            "Dashboard refreshed: {} patients, overall average {}",
            summary.total_patients, summary.overall_average_score
        );

        let published = Arc::clone(&summary);
        self.tx.send_modify(move |snapshot| {
            if *snapshot.summary != *published {
                snapshot.insights = InsightState::Idle;
            }
            snapshot.summary = published;
            snapshot.nutrient_averages = nutrient_averages;
        });

        summary
    }

    /// Ask `generator` for insights about the current summary.
    ///
    /// A failure is recorded as `InsightState::Failed`; the published
    /// summary is left untouched either way. If the summary is replaced
    /// while the generator runs, the result is returned but not published.
    pub async fn generate_insights<G: InsightGenerator>(&self, generator: &G) -> InsightState {
        let (summary, nutrients) = {
            let snapshot = self.tx.borrow();
            (
                Arc::clone(&snapshot.summary),
                Arc::clone(&snapshot.nutrient_averages),
            )
        };

        let mut digest = build_digest(&summary);
        if summary.scored_count() > 0 {
            let weakest: Vec<String> = weakest_nutrients(&nutrients, 3)
                .iter()
                .map(|n| format!("{} ({:.1}/{})", n.nutrient, n.average, n.max_score))
                .collect();
            digest.push_str(&format!("\nWeakest food groups: {}", weakest.join(", ")));
        }
        let prompt = build_population_prompt(&digest, self.insight_count);

        self.set_insights(InsightState::Loading);
        debug!("Requesting {} insights", self.insight_count);

        let state = match generator.generate(&prompt).await {
            Ok(text) => {
                let insights = parse_insights(&text, self.insight_count);
                if insights.is_empty() {
                    warn!("Model response contained no usable insights");
                    InsightState::Failed("Model returned no usable insights".to_string())
                } else {
                    info!("Received {} insights", insights.len());
                    InsightState::Ready(insights)
                }
            }
            Err(e) => {
                warn!("Insight generation failed: {}", e);
                InsightState::Failed(e.to_string())
            }
        };

        let published = state.clone();
        self.tx.send_if_modified(move |snapshot| {
            if *snapshot.summary != *summary {
                debug!("Summary changed during generation, dropping insights");
                return false;
            }
            snapshot.insights = published;
            true
        });
        state
    }

    fn set_insights(&self, state: InsightState) {
        self.tx.send_modify(|snapshot| snapshot.insights = state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightError;
    use crate::models::Sex;

    struct FixedGenerator(Result<String, InsightError>);

    impl InsightGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, InsightError> {
            self.0.clone()
        }
    }

    fn records() -> Vec<Option<PatientHealthRecord>> {
        vec![
            Some(PatientHealthRecord {
                sex: Sex::Male,
                heifa_total_score_male: 90.0,
                ..Default::default()
            }),
            None,
            Some(PatientHealthRecord {
                sex: Sex::Female,
                heifa_total_score_female: 40.0,
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn test_initial_snapshot_is_empty() {
        let state = DashboardState::new(3);
        let snapshot = state.snapshot();
        assert_eq!(*snapshot.summary, AggregationSummary::default());
        assert_eq!(snapshot.insights, InsightState::Idle);
    }

    #[tokio::test]
    async fn test_refresh_publishes_whole_summary() {
        let state = DashboardState::new(3);
        let mut rx = state.subscribe();

        state.refresh(&records());
        rx.changed().await.unwrap();

        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.summary.total_patients, 2);
        assert_eq!(snapshot.summary.healthy_count, 1);
        assert_eq!(snapshot.summary.unhealthy_count, 1);
        assert_eq!(snapshot.summary.overall_average_score, 65);
    }

    #[tokio::test]
    async fn test_successful_insights() {
        let state = DashboardState::new(3);
        state.refresh(&records());

        let generator = FixedGenerator(Ok("1. One\n2. Two\n3. Three\n4. Four".to_string()));
        let result = state.generate_insights(&generator).await;

        let expected = InsightState::Ready(vec![
            "One".to_string(),
            "Two".to_string(),
            "Three".to_string(),
        ]);
        assert_eq!(result, expected);
        assert_eq!(state.snapshot().insights, expected);
    }

    #[test]
    fn test_failed_insights_keep_summary() {
        let state = DashboardState::new(3);
        let summary = state.refresh(&records());

        let generator = FixedGenerator(Err(InsightError::Timeout(30)));
        let result = tokio_test::block_on(state.generate_insights(&generator));

        assert!(matches!(result, InsightState::Failed(ref m) if m.contains("30s")));
        let snapshot = state.snapshot();
        assert_eq!(*snapshot.summary, *summary);
        assert!(matches!(snapshot.insights, InsightState::Failed(_)));
    }

    #[tokio::test]
    async fn test_blank_insights_are_a_failure() {
        let state = DashboardState::new(3);
        let generator = FixedGenerator(Ok("1.\n\n".to_string()));
        let result = state.generate_insights(&generator).await;
        assert!(matches!(result, InsightState::Failed(_)));
    }

    #[tokio::test]
    async fn test_refresh_with_new_data_resets_insights() {
        let state = DashboardState::new(3);
        state.refresh(&records());
        state
            .generate_insights(&FixedGenerator(Ok("1. Insight".to_string())))
            .await;

        // Same data: insights stay valid.
        state.refresh(&records());
        assert!(matches!(state.snapshot().insights, InsightState::Ready(_)));

        state.refresh(&[]);
        assert_eq!(state.snapshot().insights, InsightState::Idle);
        assert_eq!(state.snapshot().summary.total_patients, 0);
    }

    struct CapturingGenerator(std::sync::Mutex<String>);

    impl InsightGenerator for CapturingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
            if let Ok(mut captured) = self.0.lock() {
                *captured = prompt.to_string();
            }
            Ok("1. Noted".to_string())
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_digest_and_weakest_groups() {
        let state = DashboardState::new(3);
        state.refresh(&records());

        let generator = CapturingGenerator(std::sync::Mutex::new(String::new()));
        state.generate_insights(&generator).await;

        let prompt = generator.0.lock().unwrap().clone();
        assert!(prompt.contains("Total patients: 2"));
        assert!(prompt.contains("Healthy patients: 1 (50%)"));
        assert!(prompt.contains("Weakest food groups:"));
        assert!(prompt.contains("exactly 3"));
    }

    struct GatedGenerator {
        started: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl InsightGenerator for GatedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, InsightError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok("1. Insight about the earlier population".to_string())
        }
    }

    #[tokio::test]
    async fn test_insights_for_replaced_summary_are_not_published() {
        let state = DashboardState::new(3);
        state.refresh(&records());

        let generator = GatedGenerator {
            started: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        };

        let refresh_midway = async {
            generator.started.notified().await;
            state.refresh(&[]);
            assert_eq!(state.snapshot().insights, InsightState::Idle);
            generator.release.notify_one();
        };
        let (result, ()) = tokio::join!(state.generate_insights(&generator), refresh_midway);

        assert!(matches!(result, InsightState::Ready(_)));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.summary.total_patients, 0);
        assert_eq!(snapshot.insights, InsightState::Idle);
    }

    #[test]
    fn test_insight_state_to_outcome() {
        assert_eq!(InsightOutcome::from(&InsightState::Idle), InsightOutcome::Skipped);
        assert_eq!(
            InsightOutcome::from(&InsightState::Failed("x".to_string())),
            InsightOutcome::Failed {
                message: "x".to_string()
            }
        );
    }
}
