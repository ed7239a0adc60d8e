use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One screen of the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Welcome,
    Terms,
    UserType,
    UserDetails,
    Patient,
    Symptoms,
    SymptomDetails,
    Care,
    Results,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Welcome => "welcome",
            Step::Terms => "terms",
            Step::UserType => "userType",
            Step::UserDetails => "userDetails",
            Step::Patient => "patient",
            Step::Symptoms => "symptoms",
            Step::SymptomDetails => "symptomDetails",
            Step::Care => "care",
            Step::Results => "results",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two wizard shapes: one role only, or a role picker with per-role details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardVariant {
    SingleRole,
    #[default]
    MultiRole,
}

impl WizardVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardVariant::SingleRole => "single-role",
            WizardVariant::MultiRole => "multi-role",
        }
    }
}

impl fmt::Display for WizardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WizardVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-role" | "single" | "a" => Ok(WizardVariant::SingleRole),
            "multi-role" | "multi" | "b" => Ok(WizardVariant::MultiRole),
            other => Err(format!("unknown wizard variant: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Individual,
    Hospital,
    Insurance,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Individual => "individual",
            UserType::Hospital => "hospital",
            UserType::Insurance => "insurance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientType {
    #[serde(rename = "self")]
    Myself,
    Other,
}

impl PatientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientType::Myself => "self",
            PatientType::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wire_names() {
        assert_eq!(
            serde_json::to_string(&Step::SymptomDetails).unwrap(),
            "\"symptomDetails\""
        );
        assert_eq!(Step::UserType.to_string(), "userType");
        let step: Step = serde_json::from_str("\"care\"").unwrap();
        assert_eq!(step, Step::Care);
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!(
            "single-role".parse::<WizardVariant>().unwrap(),
            WizardVariant::SingleRole
        );
        assert_eq!(
            " Multi-Role ".parse::<WizardVariant>().unwrap(),
            WizardVariant::MultiRole
        );
        assert!("both".parse::<WizardVariant>().is_err());
        assert_eq!(WizardVariant::default(), WizardVariant::MultiRole);
    }

    #[test]
    fn test_patient_type_uses_self_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&PatientType::Myself).unwrap(),
            "\"self\""
        );
        let other: PatientType = serde_json::from_str("\"other\"").unwrap();
        assert_eq!(other, PatientType::Other);
    }
}
