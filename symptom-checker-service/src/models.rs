use serde::{Deserialize, Serialize};
use wizard_flow::{
    DetailValue, Transition, WizardVariant, WizardView,
    catalog::{self, DetailForm},
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateWizardQuery {
    pub variant: Option<WizardVariant>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddSymptomRequest {
    pub symptom: String,
}

#[derive(Debug, Deserialize)]
pub struct SymptomDetailRequest {
    pub symptom: String,
    pub key: String,
    pub value: DetailValue,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub view: WizardView,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub session_id: String,
    pub transition: Transition,
    #[serde(flatten)]
    pub view: WizardView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistCatalog {
    pub name: &'static str,
    pub symptoms: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub symptoms: &'static [&'static str],
    pub specialists: Vec<SpecialistCatalog>,
    pub care_types: &'static [&'static str],
    pub detail_forms: &'static [DetailForm],
}

impl CatalogResponse {
    pub fn build() -> Self {
        Self {
            symptoms: catalog::BASIC_SYMPTOMS,
            specialists: catalog::SPECIALISTS
                .iter()
                .copied()
                .map(|name| SpecialistCatalog {
                    name,
                    symptoms: catalog::specialist_symptoms(name).unwrap_or(catalog::BASIC_SYMPTOMS),
                })
                .collect(),
            care_types: catalog::CARE_TYPES,
            detail_forms: catalog::DETAIL_FORMS,
        }
    }
}
