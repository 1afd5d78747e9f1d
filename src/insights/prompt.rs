//! Prompt construction and response handling for insight generation.

use crate::analysis::truncate_score;
use crate::models::{Nutrient, PatientHealthRecord, Sex};

/// Build the clinician prompt from a summary digest.
pub fn build_population_prompt(digest: &str, count: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str("Here are population statistics for our patients' HEIFA diet-quality scores:\n\n");
    prompt.push_str(digest);
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "Give exactly {} short, data-driven insights a clinician could act on. ",
        count
    ));
    prompt.push_str("Put each insight on its own line, numbered 1., 2., 3. and so on.");
    prompt
}

/// Build a patient-facing dietary tip prompt.
///
/// The three weakest components, relative to their maximum, are named so
/// the tip targets them.
pub fn build_patient_tip_prompt(record: &PatientHealthRecord) -> String {
    let mut prompt = String::new();

    let total = match record.active_total() {
        Some(total) => total,
        None => {
            prompt.push_str(
                "Write one short, encouraging healthy-eating tip for an adult following the \
                 Australian Dietary Guidelines. Keep it under 60 words.",
            );
            return prompt;
        }
    };

    let sex = match record.sex {
        Sex::Male => "male",
        Sex::Female => "female",
        Sex::Other(_) => "adult",
    };

    let mut components: Vec<(Nutrient, f64)> = Nutrient::ALL
        .iter()
        .filter_map(|&n| record.active_component(n).map(|v| (n, v)))
        .collect();
    components.sort_by(|a, b| {
        let ra = a.1 / a.0.max_score();
        let rb = b.1 / b.0.max_score();
        ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
    });

    prompt.push_str(&format!(
        "A {} patient has a HEIFA total score of {} out of 100.\n",
        sex,
        truncate_score(total)
    ));
    prompt.push_str("Their weakest food groups are:\n");
    for (nutrient, value) in components.iter().take(3) {
        prompt.push_str(&format!(
            "- {}: {:.1} / {}\n",
            nutrient,
            value,
            nutrient.max_score()
        ));
    }
    prompt.push_str(
        "\nWrite one short, encouraging, practical tip to improve their diet. \
         Keep it under 60 words.",
    );

    prompt
}

/// Split model output into at most `expected` insights.
///
/// Blank lines are dropped and a leading `1.` / `2)` style number is
/// stripped. Nothing else about the text is interpreted.
pub fn parse_insights(text: &str, expected: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(strip_numbering)
        .filter(|line| !line.is_empty())
        .take(expected)
        .map(String::from)
        .collect()
}

fn strip_numbering(line: &str) -> &str {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return line;
    }
    let rest = &line[digits..];
    // A marker is only numbering when followed by whitespace or the line end;
    // "2.5 servings" is data.
    match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        Some(stripped) if stripped.is_empty() || stripped.starts_with(char::is_whitespace) => {
            stripped.trim_start()
        }
        _ => line,
    }
}
