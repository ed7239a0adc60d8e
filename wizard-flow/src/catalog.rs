//! Fixed answer catalogs: symptoms, specialists, care types and the symptom detail forms.

use serde::Serialize;

pub const BASIC_SYMPTOMS: &[&str] = &[
    "Headache",
    "Fever",
    "Cough",
    "Fatigue",
    "Shortness of breath",
    "Nausea",
    "Dizziness",
    "Sore throat",
    "Chest pain",
    "Abdominal pain",
];

pub const SPECIALISTS: &[&str] = &[
    "General Practitioner",
    "Cardiologist",
    "Neurologist",
    "Pediatrician",
    "Orthopedist",
    "Dermatologist",
    "Gynecologist",
    "Ophthalmologist",
    "Psychiatrist",
    "Oncologist",
];

pub const CARE_TYPES: &[&str] = &[
    "Primary care",
    "Specialist care",
    "Allied health care",
    "Urgent care",
    "Emergency care",
    "Not sure",
];

/// Symptom list scoped to one specialist. Unknown names get `None`.
pub fn specialist_symptoms(specialist: &str) -> Option<&'static [&'static str]> {
    let symptoms: &'static [&'static str] = match specialist {
        "General Practitioner" => BASIC_SYMPTOMS,
        "Cardiologist" => &[
            "Chest pain",
            "Shortness of breath",
            "Palpitations",
            "Dizziness",
            "Fainting",
            "Swelling in legs",
        ],
        "Neurologist" => &[
            "Headache",
            "Dizziness",
            "Numbness",
            "Weakness",
            "Memory problems",
            "Seizures",
        ],
        "Pediatrician" => &["Fever", "Cough", "Runny nose", "Ear pain", "Rash", "Vomiting"],
        "Orthopedist" => &[
            "Joint pain",
            "Back pain",
            "Muscle weakness",
            "Swelling in joints",
            "Stiffness",
            "Fractures",
        ],
        "Dermatologist" => &[
            "Rash",
            "Itching",
            "Acne",
            "Skin discoloration",
            "Hair loss",
            "Nail problems",
        ],
        "Gynecologist" => &[
            "Irregular periods",
            "Pelvic pain",
            "Vaginal discharge",
            "Breast lumps",
            "Pregnancy symptoms",
            "Menopause symptoms",
        ],
        "Ophthalmologist" => &[
            "Vision changes",
            "Eye pain",
            "Red eyes",
            "Dry eyes",
            "Floaters",
            "Light sensitivity",
        ],
        "Psychiatrist" => &[
            "Depression",
            "Anxiety",
            "Mood swings",
            "Sleep problems",
            "Concentration issues",
            "Suicidal thoughts",
        ],
        "Oncologist" => &[
            "Unexplained weight loss",
            "Fatigue",
            "Fever",
            "Pain",
            "Skin changes",
            "Lumps or swelling",
        ],
        _ => return None,
    };
    Some(symptoms)
}

pub fn is_specialist(name: &str) -> bool {
    SPECIALISTS.contains(&name)
}

pub fn is_care_type(name: &str) -> bool {
    CARE_TYPES.contains(&name)
}

/// Case-insensitive substring search, preserving catalog order
pub fn filter_symptoms<'a>(catalog: &[&'a str], term: &str) -> Vec<&'a str> {
    let needle = term.trim().to_lowercase();
    catalog
        .iter()
        .copied()
        .filter(|symptom| symptom.to_lowercase().contains(&needle))
        .collect()
}

/// One attribute of a symptom detail form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetailField {
    Choice {
        key: &'static str,
        options: &'static [&'static str],
    },
    Flag {
        key: &'static str,
        label: &'static str,
    },
}

impl DetailField {
    pub fn key(&self) -> &'static str {
        match self {
            DetailField::Choice { key, .. } | DetailField::Flag { key, .. } => key,
        }
    }
}

/// Follow-up questions asked on the symptom details step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetailForm {
    pub symptom: &'static str,
    pub fields: &'static [DetailField],
}

impl DetailForm {
    pub fn field(&self, key: &str) -> Option<&DetailField> {
        self.fields.iter().find(|field| field.key() == key)
    }
}

pub const DETAIL_FORMS: &[DetailForm] = &[
    DetailForm {
        symptom: "Headache",
        fields: &[
            DetailField::Choice {
                key: "duration",
                options: &["new", "recurring", "chronic"],
            },
            DetailField::Choice {
                key: "intensity",
                options: &["mild", "moderate", "severe"],
            },
        ],
    },
    DetailForm {
        symptom: "Fever",
        fields: &[
            DetailField::Choice {
                key: "temperature",
                options: &["low", "moderate", "high"],
            },
            DetailField::Flag {
                key: "runnyNose",
                label: "Runny Nose",
            },
            DetailField::Flag {
                key: "soreThroat",
                label: "Sore Throat",
            },
        ],
    },
];

pub fn detail_form(symptom: &str) -> Option<&'static DetailForm> {
    DETAIL_FORMS
        .iter()
        .find(|form| form.symptom.eq_ignore_ascii_case(symptom))
}

/// Key under which a symptom's details are stored
pub fn detail_key(symptom: &str) -> String {
    symptom.to_lowercase()
}
