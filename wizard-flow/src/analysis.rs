//! The analysis boundary: the request assembled from a finished wizard, the opaque
//! payload that comes back, and the [`AnalysisRequester`] seam between them.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::{
    error::AnalysisError,
    state::{MedicalHistory, SymptomDetail, UserDetails, WizardState},
    step::{PatientType, UserType, WizardVariant},
};

/// Body of `POST /api/results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_details: Option<UserDetails>,
    #[serde(default)]
    pub patient_type: Option<PatientType>,
    #[serde(default, deserialize_with = "history_names")]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptom_details: Option<BTreeMap<String, SymptomDetail>>,
    #[serde(default)]
    pub care_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist: Option<String>,
}

impl AnalysisRequest {
    /// Snapshot the collected answers. Role fields are only sent by the multi-role wizard.
    pub fn from_state(state: &WizardState, variant: WizardVariant) -> Self {
        let multi_role = variant == WizardVariant::MultiRole;
        Self {
            user_type: state.user_type.filter(|_| multi_role),
            user_details: multi_role.then(|| state.user_details.clone()),
            patient_type: state.patient_type,
            medical_history: state.medical_history.positive_flags(),
            symptoms: state.symptoms.clone(),
            symptom_details: (!state.symptom_details.is_empty())
                .then(|| state.symptom_details.clone()),
            care_type: state.care_type.clone(),
            specialist: state.specialist.clone().filter(|_| multi_role),
        }
    }
}

/// Older clients post the raw flag record instead of the list of positive names
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryInput {
    Names(Vec<String>),
    Flags(MedicalHistory),
}

fn history_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match HistoryInput::deserialize(deserializer)? {
        HistoryInput::Names(names) => names,
        HistoryInput::Flags(flags) => flags.positive_flags(),
    })
}

/// Structured analysis as returned by the model, kept verbatim.
///
/// Only the top level is checked (it must be a JSON object); use
/// [`AnalysisPayload::typed`] for a schema view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisPayload(Map<String, Value>);

impl AnalysisPayload {
    pub fn from_value(value: Value) -> Result<Self, AnalysisError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AnalysisError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn typed(&self) -> Result<SymptomAnalysis, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Response envelope of `POST /api/results`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResponse {
    pub fn success(analysis: AnalysisPayload) -> Self {
        Self {
            success: true,
            analysis: Some(analysis),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis: None,
            error: Some(error.into()),
        }
    }

    /// Unwrap the envelope into the payload or a rejection
    pub fn into_payload(self) -> Result<AnalysisPayload, AnalysisError> {
        match (self.success, self.analysis) {
            (true, Some(analysis)) => Ok(analysis),
            (true, None) => Err(AnalysisError::Malformed(
                "success response without analysis".to_string(),
            )),
            (false, _) => Err(AnalysisError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Routine,
    Soon,
    Urgent,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    Low,
    Moderate,
    High,
    #[serde(other)]
    Other,
}

impl EvidenceLevel {
    /// Bar height used by the evidence chart
    pub fn score(&self) -> u8 {
        match self {
            EvidenceLevel::Low => 1,
            EvidenceLevel::Moderate => 2,
            EvidenceLevel::High => 3,
            EvidenceLevel::Other => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomAnalysis {
    pub recommendation: Recommendation,
    pub possible_conditions: Vec<Condition>,
    pub care_plan: CarePlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub summary: String,
    pub specialist: SpecialistReferral,
    pub urgency_level: String,
    #[serde(default)]
    pub follow_up_instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistReferral {
    #[serde(rename = "type")]
    pub kind: String,
    pub consultation_type: String,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub name: String,
    pub scientific_name: String,
    pub evidence_level: EvidenceLevel,
    pub details: ConditionDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDetails {
    pub description: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlan {
    pub recommended_care_type: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_care_instructions: Option<Vec<String>>,
    #[serde(default)]
    pub warning_symptoms: Vec<String>,
}

/// JSON schema the model is instructed to follow
pub fn analysis_schema() -> Value {
    let string_list = |description: &str| {
        json!({ "type": "array", "items": { "type": "string" }, "description": description })
    };

    json!({
        "type": "object",
        "properties": {
            "recommendation": {
                "type": "object",
                "properties": {
                    "summary": { "type": "string", "description": "Brief summary of the main recommendation" },
                    "specialist": {
                        "type": "object",
                        "properties": {
                            "type": { "type": "string", "description": "Type of specialist recommended" },
                            "consultationType": {
                                "type": "string",
                                "description": "Recommended consultation format (e.g., Telephone, In-person)"
                            },
                            "urgency": {
                                "type": "string",
                                "enum": ["routine", "soon", "urgent", "emergency"],
                                "description": "Urgency level of the consultation"
                            }
                        },
                        "required": ["type", "consultationType", "urgency"]
                    },
                    "urgencyLevel": { "type": "string", "description": "Overall urgency level of the situation" },
                    "followUpInstructions": string_list("List of follow-up instructions")
                },
                "required": ["summary", "specialist", "urgencyLevel", "followUpInstructions"]
            },
            "possibleConditions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Common name of the condition" },
                        "scientificName": { "type": "string", "description": "Scientific/medical name of the condition" },
                        "evidenceLevel": {
                            "type": "string",
                            "enum": ["low", "moderate", "high"],
                            "description": "Level of evidence for this condition"
                        },
                        "details": {
                            "type": "object",
                            "properties": {
                                "description": { "type": "string", "description": "Brief description of the condition" },
                                "symptoms": string_list("Common symptoms of this condition"),
                                "recommendations": string_list("Specific recommendations for this condition")
                            },
                            "required": ["description", "symptoms", "recommendations"]
                        }
                    },
                    "required": ["name", "scientificName", "evidenceLevel", "details"]
                }
            },
            "carePlan": {
                "type": "object",
                "properties": {
                    "recommendedCareType": { "type": "string", "description": "Recommended type of care" },
                    "nextSteps": string_list("List of next steps to take"),
                    "selfCareInstructions": string_list("Optional self-care instructions if applicable"),
                    "warningSymptoms": string_list("Symptoms that should trigger immediate medical attention")
                },
                "required": ["recommendedCareType", "nextSteps", "warningSymptoms"]
            }
        },
        "required": ["recommendation", "possibleConditions", "carePlan"]
    })
}

/// Turns collected answers into a structured analysis
#[async_trait]
pub trait AnalysisRequester: Send + Sync {
    async fn request(&self, request: AnalysisRequest) -> Result<AnalysisPayload, AnalysisError>;
}
