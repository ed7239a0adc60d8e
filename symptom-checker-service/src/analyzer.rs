use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::{debug, error, info};
use wizard_flow::{
    AnalysisError, AnalysisPayload, AnalysisRequest, AnalysisRequester, analysis::analysis_schema,
};

use crate::config::ServiceConfig;

const SYSTEM_PROMPT: &str = r#"You are a medical symptom analysis assistant. Analyze the provided symptoms, medical history, and user information to provide structured medical information.
DO NOT provide actual medical diagnosis - only provide possible conditions and recommendations for seeking appropriate medical care.
Always encourage users to seek professional medical advice.
Respond with a structured analysis following this format exactly:
- Recommendation summary
- Specialist type and consultation format
- List of possible conditions with evidence levels
- Care plan recommendations
Your response must be structured and factual.
Respond with JSON only, without markdown fences or commentary."#;

/// Asks an OpenRouter-hosted model for the structured analysis
pub struct LlmAnalyzer {
    api_key: String,
    model: String,
    temperature: f64,
}

impl LlmAnalyzer {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn agent(&self) -> Agent<openrouter::CompletionModel> {
        let client = openrouter::Client::new(&self.api_key);
        client
            .agent(&self.model)
            .preamble(&system_prompt())
            .temperature(self.temperature)
            .build()
    }
}

fn system_prompt() -> String {
    format!(
        "{SYSTEM_PROMPT}\nStrictly output in the following JSON format: {}",
        analysis_schema()
    )
}

fn or_unset<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Not provided".to_string())
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

/// User message listing everything the wizard collected
pub fn build_user_prompt(request: &AnalysisRequest) -> String {
    let user_details = request
        .user_details
        .as_ref()
        .and_then(|details| serde_json::to_string(details).ok());
    let symptom_details = request
        .symptom_details
        .as_ref()
        .and_then(|details| serde_json::to_string(details).ok());

    format!(
        "User Type: {}
User Details: {}
Patient Type: {}
Medical History: {}
Current Symptoms: {}
Symptom Details: {}
Preferred Care Type: {}
Assigned Specialist: {}

Provide a structured analysis of these symptoms and recommend appropriate medical care.",
        or_unset(request.user_type.map(|t| t.as_str())),
        or_unset(user_details),
        or_unset(request.patient_type.map(|t| t.as_str())),
        join_or_none(&request.medical_history),
        join_or_none(&request.symptoms),
        or_unset(symptom_details),
        or_unset(request.care_type.as_deref()),
        or_unset(request.specialist.as_deref()),
    )
}

/// Parse a model reply, tolerating a surrounding markdown code fence
pub fn parse_analysis(raw: &str) -> Result<AnalysisPayload, AnalysisError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| AnalysisError::Malformed(e.to_string()))?;
    AnalysisPayload::from_value(value)
}

#[async_trait]
impl AnalysisRequester for LlmAnalyzer {
    async fn request(&self, request: AnalysisRequest) -> Result<AnalysisPayload, AnalysisError> {
        info!(
            model = %self.model,
            symptoms = request.symptoms.len(),
            "Requesting symptom analysis"
        );
        let prompt = build_user_prompt(&request);

        let agent = self.agent();
        let response = agent.prompt(prompt.as_str()).await.map_err(|e| {
            error!(error = %e, "LLM call failed");
            AnalysisError::Transport(e.to_string())
        })?;

        debug!(response_length = response.len(), "LLM responded");
        parse_analysis(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wizard_flow::{PatientType, UserType};

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            user_type: Some(UserType::Insurance),
            user_details: None,
            patient_type: Some(PatientType::Myself),
            medical_history: vec!["smoking".to_string(), "allergies".to_string()],
            symptoms: vec!["Cough".to_string(), "Fever".to_string()],
            symptom_details: None,
            care_type: Some("Urgent care".to_string()),
            specialist: None,
        }
    }

    #[test]
    fn test_user_prompt_lists_answers() {
        let prompt = build_user_prompt(&request());
        assert!(prompt.contains("User Type: insurance"));
        assert!(prompt.contains("Patient Type: self"));
        assert!(prompt.contains("Medical History: smoking, allergies"));
        assert!(prompt.contains("Current Symptoms: Cough, Fever"));
        assert!(prompt.contains("Preferred Care Type: Urgent care"));
        assert!(prompt.contains("Assigned Specialist: Not provided"));
    }

    #[test]
    fn test_system_prompt_embeds_schema() {
        let prompt = system_prompt();
        assert!(prompt.contains("possibleConditions"));
        assert!(prompt.contains("warningSymptoms"));
    }

    #[test]
    fn test_parse_analysis_strips_fences() {
        let fenced = "```json\n{\"recommendation\": {\"summary\": \"X\"}}\n```";
        let payload = parse_analysis(fenced).unwrap();
        assert_eq!(payload.as_map()["recommendation"]["summary"], "X");

        let bare = parse_analysis("  {\"a\": 1} ").unwrap();
        assert_eq!(bare.as_map()["a"], 1);
    }

    #[test]
    fn test_parse_analysis_rejects_non_objects() {
        assert!(matches!(parse_analysis("I cannot help"), Err(AnalysisError::Malformed(_))));
        assert!(matches!(parse_analysis("[1]"), Err(AnalysisError::Malformed(_))));
    }
}
