//! Dashboard report generation.
//!
//! This module renders the population dashboard as Markdown or JSON.

use crate::analysis::{bar_fraction, percentage};
use crate::models::{
    AggregationSummary, DashboardReport, HealthTier, InsightOutcome, NutrientAverage,
    PatientTip, ReportMetadata,
};
use anyhow::Result;

/// Rendering options for the Markdown report.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub include_nutrients: bool,
    pub bar_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_nutrients: true,
            bar_width: 20,
        }
    }
}

impl From<&crate::config::ReportConfig> for RenderOptions {
    fn from(config: &crate::config::ReportConfig) -> Self {
        Self {
            include_nutrients: config.include_nutrients,
            bar_width: config.bar_width,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport, options: &RenderOptions) -> String {
    let mut output = String::new();

    output.push_str("# NutriTrack Population Dashboard\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_overview_section(&report.summary, options));
    output.push_str(&generate_tier_section(&report.summary, options));
    output.push_str(&generate_scores_section(&report.summary));

    if options.include_nutrients {
        output.push_str(&generate_nutrient_section(&report.nutrient_averages));
    }

    output.push_str(&generate_insights_section(&report.insights));

    if let Some(ref tip) = report.patient_tip {
        output.push_str(&generate_patient_tip_section(tip));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!("- **Entries Read:** {}\n", metadata.records_read));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the population overview with the gender split.
fn generate_overview_section(summary: &AggregationSummary, options: &RenderOptions) -> String {
    let mut section = String::new();
    let total = summary.total_patients;

    section.push_str("## Population Overview\n\n");
    section.push_str("| Group | Patients | Share |\n");
    section.push_str("|:---|:---:|:---|\n");
    section.push_str(&format!("| **All** | **{}** | |\n", total));
    section.push_str(&format!(
        "| Male | {} | `{}` {}% |\n",
        summary.male_count,
        render_bar(bar_fraction(summary.male_count, total), options.bar_width),
        percentage(summary.male_count, total)
    ));
    section.push_str(&format!(
        "| Female | {} | `{}` {}% |\n",
        summary.female_count,
        render_bar(bar_fraction(summary.female_count, total), options.bar_width),
        percentage(summary.female_count, total)
    ));

    let unscored = total.saturating_sub(summary.scored_count());
    if unscored > 0 {
        section.push_str(&format!("| Other / unspecified | {} | |\n", unscored));
    }
    section.push('\n');

    section
}

/// Generate the health tier breakdown.
fn generate_tier_section(summary: &AggregationSummary, options: &RenderOptions) -> String {
    let mut section = String::new();
    let total = summary.total_patients;

    section.push_str("## Health Tiers\n\n");
    section.push_str("| Tier | Score | Patients | Share |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");

    for (tier, range) in [
        (HealthTier::Healthy, "80+"),
        (HealthTier::AtRisk, "50-79"),
        (HealthTier::Unhealthy, "<50"),
    ] {
        let count = summary.tier_count(tier);
        section.push_str(&format!(
            "| {} {} | {} | {} | `{}` {}% |\n",
            tier.emoji(),
            tier,
            range,
            count,
            render_bar(bar_fraction(count, total), options.bar_width),
            percentage(count, total)
        ));
    }
    section.push('\n');

    section
}

/// Generate the average score table.
fn generate_scores_section(summary: &AggregationSummary) -> String {
    let mut section = String::new();

    section.push_str("## Average HEIFA Scores\n\n");
    section.push_str("| Male | Female | Overall |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | **{}** |\n\n",
        summary.male_average_score, summary.female_average_score, summary.overall_average_score
    ));

    section
}

/// Generate the nutrient component table.
fn generate_nutrient_section(averages: &[NutrientAverage]) -> String {
    if averages.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Food Group Averages\n\n");
    section.push_str("| Food Group | Average | Max |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for avg in averages {
        section.push_str(&format!(
            "| {} | {:.2} | {} |\n",
            avg.nutrient, avg.average, avg.max_score
        ));
    }
    section.push('\n');

    section
}

/// Generate the AI insights section.
fn generate_insights_section(outcome: &InsightOutcome) -> String {
    let mut section = String::new();

    match outcome {
        InsightOutcome::Skipped => return section,
        InsightOutcome::Generated { insights } => {
            section.push_str("## AI Insights\n\n");
            for (i, insight) in insights.iter().enumerate() {
                section.push_str(&format!("{}. {}\n", i + 1, insight));
            }
        }
        InsightOutcome::Failed { message } => {
            section.push_str("## AI Insights\n\n");
            section.push_str(&format!("> ⚠️ Insights unavailable: {}\n", message));
        }
    }
    section.push('\n');

    section
}

/// Generate the patient tip section.
fn generate_patient_tip_section(tip: &PatientTip) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Dietary Tip for Patient {}\n\n", tip.user_id));
    match tip.outcome {
        InsightOutcome::Generated { ref insights } => {
            for line in insights {
                section.push_str(&format!("> 💡 {}\n", line));
            }
        }
        InsightOutcome::Failed { ref message } => {
            section.push_str(&format!("> ⚠️ Tip unavailable: {}\n", message));
        }
        InsightOutcome::Skipped => {
            section.push_str("> Tip not requested.\n");
        }
    }
    section.push('\n');

    section
}

/// Render a fixed-width text bar for `fraction` in `0.0..=1.0`.
fn render_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64) as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by NutriTrack*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
