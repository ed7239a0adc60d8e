//! Renders an analysis payload into a markdown report plus evidence chart data.
//!
//! Each section is read from the raw JSON on its own, so a reply that only
//! partly follows the schema still renders what it has. Only a reply that is not
//! a JSON object at all degrades to the generic notice.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write;
use tracing::warn;

use crate::analysis::AnalysisPayload;

pub const DISCLAIMER: &str = "This information is for educational purposes only and is not a \
substitute for professional medical advice. Always consult with a qualified healthcare \
provider for proper diagnosis and treatment.";

pub const UNPROCESSABLE_NOTICE: &str =
    "Unable to process the symptom analysis results. Please try again later.";

const NO_RECOMMENDATION: &str = "No recommendation available.";
const NO_SPECIALIST: &str = "No specialist information available.";
const NO_CONDITIONS: &str = "No condition data available.";
const NO_CARE_PLAN: &str = "No care plan recommendations available.";

/// One bar of the evidence chart (high = 3, moderate = 2, low = 1, anything else 0)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// False when the reply was not a JSON object
    pub processed: bool,
    pub markdown: String,
    pub chart: Vec<ChartPoint>,
}

pub fn render_report(payload: &AnalysisPayload) -> Report {
    render_sections(payload.as_map())
}

/// Render any JSON reply; non-objects get the generic notice
pub fn render_value(value: &Value) -> Report {
    match value.as_object() {
        Some(map) => render_sections(map),
        None => {
            warn!("analysis reply is not a JSON object");
            Report {
                processed: false,
                markdown: format!(
                    "# Symptom Analysis Results\n\n> **Error:** {UNPROCESSABLE_NOTICE}\n"
                ),
                chart: Vec::new(),
            }
        }
    }
}

fn render_sections(map: &Map<String, Value>) -> Report {
    let chart = chart_data(map);
    let mut out = String::new();

    let _ = writeln!(out, "# Symptom Analysis Results\n");
    let _ = writeln!(out, "> **Medical Disclaimer:** {DISCLAIMER}\n");

    let recommendation = object(map, "recommendation");
    render_recommendation(&mut out, recommendation);
    render_specialist(&mut out, recommendation.and_then(|r| object(r, "specialist")));
    render_conditions(&mut out, map);
    render_care_plan(&mut out, object(map, "carePlan"));

    Report {
        processed: true,
        markdown: out,
        chart,
    }
}

fn object<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

/// Non-blank string field
fn text<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn strings<'a>(map: &'a Map<String, Value>, key: &str) -> Vec<&'a str> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Chart score of an evidence level; a missing level counts as low
pub fn evidence_score(level: Option<&str>) -> u8 {
    match level.map(str::to_lowercase).as_deref().unwrap_or("low") {
        "high" => 3,
        "moderate" => 2,
        "low" => 1,
        _ => 0,
    }
}

fn conditions(map: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    map.get("possibleConditions")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

pub fn chart_data(map: &Map<String, Value>) -> Vec<ChartPoint> {
    conditions(map)
        .into_iter()
        .map(|condition| ChartPoint {
            name: text(condition, "name").unwrap_or("Unknown").to_string(),
            value: evidence_score(condition.get("evidenceLevel").and_then(Value::as_str)),
        })
        .collect()
}

fn bullet_list(out: &mut String, items: &[&str]) {
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

fn render_recommendation(out: &mut String, recommendation: Option<&Map<String, Value>>) {
    let _ = writeln!(out, "## Recommendation Summary\n");
    let Some(recommendation) = recommendation else {
        let _ = writeln!(out, "{NO_RECOMMENDATION}\n");
        return;
    };
    let summary = text(recommendation, "summary").unwrap_or(NO_RECOMMENDATION);
    let _ = writeln!(out, "{summary}\n");
    if let Some(urgency) = text(recommendation, "urgencyLevel") {
        let _ = writeln!(out, "**Urgency level:** {urgency}\n");
    }
    let follow_up = strings(recommendation, "followUpInstructions");
    if !follow_up.is_empty() {
        let _ = writeln!(out, "### Follow-up\n");
        bullet_list(out, &follow_up);
        out.push('\n');
    }
}

fn render_specialist(out: &mut String, specialist: Option<&Map<String, Value>>) {
    let _ = writeln!(out, "## Specialist Consultation\n");
    let Some(specialist) = specialist else {
        let _ = writeln!(out, "{NO_SPECIALIST}\n");
        return;
    };
    let kind = text(specialist, "type").unwrap_or("Not specified");
    let _ = writeln!(out, "- **Type:** {kind}");
    let _ = writeln!(
        out,
        "- **Format:** {}",
        text(specialist, "consultationType").unwrap_or("Not specified")
    );
    if let Some(urgency) = text(specialist, "urgency") {
        let _ = writeln!(out, "- **Urgency:** {urgency}");
    }
    out.push('\n');
}

fn render_conditions(out: &mut String, map: &Map<String, Value>) {
    let _ = writeln!(out, "## Possible Conditions\n");
    let conditions = conditions(map);
    if conditions.is_empty() {
        let _ = writeln!(out, "{NO_CONDITIONS}\n");
        return;
    }
    for condition in conditions {
        let name = text(condition, "name").unwrap_or("Unknown");
        match text(condition, "scientificName") {
            Some(scientific) => {
                let _ = writeln!(out, "### {name} ({scientific})\n");
            }
            None => {
                let _ = writeln!(out, "### {name}\n");
            }
        }
        if let Some(level) = text(condition, "evidenceLevel") {
            let _ = writeln!(out, "Evidence: {level}\n");
        }
        if let Some(details) = object(condition, "details") {
            if let Some(description) = text(details, "description") {
                let _ = writeln!(out, "{description}\n");
            }
            let recommendations = strings(details, "recommendations");
            if !recommendations.is_empty() {
                bullet_list(out, &recommendations);
                out.push('\n');
            }
        }
    }
}

fn render_care_plan(out: &mut String, plan: Option<&Map<String, Value>>) {
    let _ = writeln!(out, "## Care Plan\n");
    let Some(plan) = plan.filter(|plan| !plan.is_empty()) else {
        let _ = writeln!(out, "{NO_CARE_PLAN}");
        return;
    };
    if let Some(care) = text(plan, "recommendedCareType") {
        let _ = writeln!(out, "**Recommended care:** {care}\n");
    }
    for (key, title) in [
        ("nextSteps", "Next steps"),
        ("selfCareInstructions", "Self-care"),
        ("warningSymptoms", "Seek immediate care if you notice"),
    ] {
        let items = strings(plan, key);
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### {title}\n");
        bullet_list(out, &items);
        out.push('\n');
    }
}
