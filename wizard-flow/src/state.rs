use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    analysis::AnalysisPayload,
    catalog,
    step::{PatientType, Step, UserType},
};

/// Free-text identity fields collected on the user details step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDetails {
    pub name: String,
    pub hospital_name: String,
    pub patient_name: String,
    pub insurance_policy_number: String,
}

/// Partial update of [`UserDetails`]; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDetailsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_policy_number: Option<String>,
}

impl UserDetails {
    fn merge(&mut self, update: UserDetailsUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(hospital_name) = update.hospital_name {
            self.hospital_name = hospital_name;
        }
        if let Some(patient_name) = update.patient_name {
            self.patient_name = patient_name;
        }
        if let Some(policy) = update.insurance_policy_number {
            self.insurance_policy_number = policy;
        }
    }
}

/// Tri-state history flags. `None` means the question was not answered.
///
/// Also used as its own partial update: only `Some` flags are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicalHistory {
    pub recent_injury: Option<bool>,
    pub smoking: Option<bool>,
    pub allergies: Option<bool>,
    pub overweight: Option<bool>,
    pub hypertension: Option<bool>,
}

impl MedicalHistory {
    fn merge(&mut self, update: MedicalHistory) {
        self.recent_injury = update.recent_injury.or(self.recent_injury);
        self.smoking = update.smoking.or(self.smoking);
        self.allergies = update.allergies.or(self.allergies);
        self.overweight = update.overweight.or(self.overweight);
        self.hypertension = update.hypertension.or(self.hypertension);
    }

    /// Wire names of the flags answered with `true`
    pub fn positive_flags(&self) -> Vec<String> {
        [
            ("recentInjury", self.recent_injury),
            ("smoking", self.smoking),
            ("allergies", self.allergies),
            ("overweight", self.overweight),
            ("hypertension", self.hypertension),
        ]
        .into_iter()
        .filter(|(_, value)| *value == Some(true))
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

/// Answer to one detail attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Flag(bool),
    Choice(String),
}

/// Attribute answers for one symptom, keyed by attribute name
pub type SymptomDetail = BTreeMap<String, DetailValue>;

/// The complete in-memory record of one wizard session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub current_step: Step,
    pub accepted_terms: bool,
    pub user_type: Option<UserType>,
    pub user_details: UserDetails,
    pub patient_type: Option<PatientType>,
    pub medical_history: MedicalHistory,
    pub symptoms: Vec<String>,
    pub symptom_details: BTreeMap<String, SymptomDetail>,
    pub care_type: Option<String>,
    pub specialist: Option<String>,
    pub results: Option<AnalysisPayload>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current_step: Step::Welcome,
            accepted_terms: false,
            user_type: None,
            user_details: UserDetails::default(),
            patient_type: None,
            medical_history: MedicalHistory::default(),
            symptoms: Vec::new(),
            symptom_details: BTreeMap::new(),
            care_type: None,
            specialist: None,
            results: None,
        }
    }
}

/// Shallow partial update of [`WizardState`].
///
/// Nested records (`user_details`, `medical_history`, `symptom_details`) merge one
/// level deep. `current_step` and `results` are never read from client payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardUpdate {
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_terms: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_details: Option<UserDetailsUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_type: Option<PatientType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<MedicalHistory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptom_details: Option<BTreeMap<String, SymptomDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist: Option<String>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub results: Option<AnalysisPayload>,
}

impl WizardUpdate {
    pub fn step(step: Step) -> Self {
        Self {
            current_step: Some(step),
            ..Default::default()
        }
    }

    /// Drop the fields only the controller may write
    pub fn answers_only(mut self) -> Self {
        self.current_step = None;
        self.results = None;
        self
    }
}

impl WizardState {
    /// Merge a partial update into this state
    pub fn apply(&mut self, update: WizardUpdate) {
        if let Some(step) = update.current_step {
            self.current_step = step;
        }
        if let Some(accepted) = update.accepted_terms {
            self.accepted_terms = accepted;
        }
        if let Some(user_type) = update.user_type {
            self.user_type = Some(user_type);
        }
        if let Some(details) = update.user_details {
            self.user_details.merge(details);
        }
        if let Some(patient_type) = update.patient_type {
            self.patient_type = Some(patient_type);
        }
        if let Some(history) = update.medical_history {
            self.medical_history.merge(history);
        }
        if let Some(symptoms) = update.symptoms {
            self.symptoms.clear();
            for symptom in symptoms {
                self.add_symptom(&symptom);
            }
            self.prune_symptom_details();
        }
        if let Some(details) = update.symptom_details {
            for (symptom, detail) in details {
                self.symptom_details.insert(symptom.to_lowercase(), detail);
            }
            self.prune_symptom_details();
        }
        if let Some(care_type) = update.care_type {
            self.care_type = Some(care_type);
        }
        if let Some(specialist) = update.specialist {
            self.specialist = Some(specialist);
        }
        if let Some(results) = update.results {
            self.results = Some(results);
        }
    }

    pub fn has_symptom(&self, symptom: &str) -> bool {
        self.symptoms.iter().any(|s| s == symptom)
    }

    /// Append a symptom unless it is already selected. Returns whether it was added.
    pub fn add_symptom(&mut self, symptom: &str) -> bool {
        if self.has_symptom(symptom) {
            return false;
        }
        self.symptoms.push(symptom.to_string());
        true
    }

    /// Remove a symptom together with its detail entry. Returns whether it was present.
    pub fn remove_symptom(&mut self, symptom: &str) -> bool {
        let before = self.symptoms.len();
        self.symptoms.retain(|s| s != symptom);
        self.symptom_details.remove(&catalog::detail_key(symptom));
        self.symptoms.len() != before
    }

    /// The details step follows as soon as one symptom is selected
    pub fn needs_symptom_details(&self) -> bool {
        !self.symptoms.is_empty()
    }

    /// Whether any selected symptom has a follow-up detail form
    pub fn has_detail_forms(&self) -> bool {
        self.symptoms
            .iter()
            .any(|symptom| catalog::detail_form(symptom).is_some())
    }

    fn prune_symptom_details(&mut self) {
        let present: Vec<String> = self.symptoms.iter().map(|s| catalog::detail_key(s)).collect();
        self.symptom_details.retain(|key, _| present.contains(key));
    }
}
