use std::fmt;
use std::sync::Arc;

use crate::{
    catalog,
    state::WizardState,
    step::{Step, UserType, WizardVariant},
};

/// Type alias for step inclusion conditions
pub type StepCondition = Arc<dyn Fn(&WizardState) -> bool + Send + Sync>;

/// A step in the declared order, optionally included only when its condition holds
#[derive(Clone)]
pub struct StepNode {
    pub step: Step,
    pub condition: Option<StepCondition>,
}

impl StepNode {
    fn is_active(&self, state: &WizardState) -> bool {
        self.condition.as_ref().is_none_or(|condition| condition(state))
    }
}

impl fmt::Debug for StepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepNode")
            .field("step", &self.step)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// Computes the active step sequence and the forward/backward neighbours of a step.
///
/// Skippable steps are skipped entirely (not made optional), and skipping chains
/// over consecutive inactive steps in both directions.
#[derive(Clone, Debug)]
pub struct StepSequencer {
    variant: WizardVariant,
    nodes: Vec<StepNode>,
}

impl StepSequencer {
    pub fn for_variant(variant: WizardVariant) -> Self {
        match variant {
            WizardVariant::SingleRole => SequenceBuilder::new(variant)
                .step(Step::Welcome)
                .step(Step::Terms)
                .step(Step::Patient)
                .step(Step::Symptoms)
                .step_when(Step::SymptomDetails, WizardState::needs_symptom_details)
                .step(Step::Care)
                .step(Step::Results)
                .build(),
            WizardVariant::MultiRole => SequenceBuilder::new(variant)
                .step(Step::Welcome)
                .step(Step::Terms)
                .step(Step::UserType)
                .step(Step::UserDetails)
                .step_when(Step::Patient, |state| {
                    state.user_type == Some(UserType::Individual)
                })
                .step(Step::Symptoms)
                .step_when(Step::SymptomDetails, WizardState::needs_symptom_details)
                .step(Step::Care)
                .step(Step::Results)
                .build(),
        }
    }

    pub fn variant(&self) -> WizardVariant {
        self.variant
    }

    /// Every step this variant declares, conditional or not
    pub fn declared_steps(&self) -> Vec<Step> {
        self.nodes.iter().map(|node| node.step).collect()
    }

    /// Steps active for the given answers, in order
    pub fn sequence(&self, state: &WizardState) -> Vec<Step> {
        self.nodes
            .iter()
            .filter(|node| node.is_active(state))
            .map(|node| node.step)
            .collect()
    }

    pub fn contains(&self, state: &WizardState, step: Step) -> bool {
        self.nodes
            .iter()
            .any(|node| node.step == step && node.is_active(state))
    }

    pub fn first_step(&self) -> Step {
        self.nodes.first().map(|node| node.step).unwrap_or(Step::Welcome)
    }

    /// The final step that collects input; advancing from it submits the answers
    pub fn last_input_step(&self) -> Step {
        Step::Care
    }

    fn position(&self, step: Step) -> Option<usize> {
        self.nodes.iter().position(|node| node.step == step)
    }

    /// Next active step after the current one
    pub fn next_step(&self, state: &WizardState) -> Option<Step> {
        let index = self.position(state.current_step)?;
        self.nodes[index + 1..]
            .iter()
            .find(|node| node.is_active(state))
            .map(|node| node.step)
    }

    /// Previous active step before the current one
    pub fn previous_step(&self, state: &WizardState) -> Option<Step> {
        let index = self.position(state.current_step)?;
        self.nodes[..index]
            .iter()
            .rev()
            .find(|node| node.is_active(state))
            .map(|node| node.step)
    }

    /// Whether the answers allow leaving the current step forwards
    pub fn can_advance(&self, state: &WizardState) -> bool {
        can_advance(state.current_step, state)
    }

    pub fn can_go_back(&self, state: &WizardState) -> bool {
        state.current_step != Step::Results && self.previous_step(state).is_some()
    }

    pub fn can_go_forward(&self, state: &WizardState) -> bool {
        state.current_step != Step::Results
    }

    /// The step the session should be on: the current one if still active, otherwise
    /// the closest active step before it.
    pub fn reconcile(&self, state: &WizardState) -> Step {
        if self.contains(state, state.current_step) {
            return state.current_step;
        }
        self.previous_step(state).unwrap_or_else(|| self.first_step())
    }
}

/// Validation predicate evaluated before leaving `step`
pub fn can_advance(step: Step, state: &WizardState) -> bool {
    match step {
        Step::Terms => state.accepted_terms,
        Step::UserType => state.user_type.is_some(),
        Step::UserDetails => user_details_complete(state),
        Step::Patient => state.patient_type.is_some(),
        Step::Symptoms => !state.symptoms.is_empty(),
        Step::Care => state.care_type.is_some(),
        Step::Welcome | Step::SymptomDetails | Step::Results => true,
    }
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Required identity fields for the chosen role
pub fn required_user_details(user_type: UserType) -> &'static [&'static str] {
    match user_type {
        UserType::Individual => &["name"],
        UserType::Hospital => &["hospitalName", "patientName", "specialist"],
        UserType::Insurance => &["name", "patientName", "insurancePolicyNumber"],
    }
}

fn user_details_complete(state: &WizardState) -> bool {
    let details = &state.user_details;
    match state.user_type {
        None => false,
        Some(UserType::Individual) => filled(&details.name),
        Some(UserType::Hospital) => {
            filled(&details.hospital_name)
                && filled(&details.patient_name)
                && state
                    .specialist
                    .as_deref()
                    .is_some_and(catalog::is_specialist)
        }
        Some(UserType::Insurance) => {
            filled(&details.name)
                && filled(&details.patient_name)
                && filled(&details.insurance_policy_number)
        }
    }
}

/// Builder for step sequences
pub struct SequenceBuilder {
    variant: WizardVariant,
    nodes: Vec<StepNode>,
}

impl SequenceBuilder {
    pub fn new(variant: WizardVariant) -> Self {
        Self {
            variant,
            nodes: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.nodes.push(StepNode {
            step,
            condition: None,
        });
        self
    }

    pub fn step_when<F>(mut self, step: Step, condition: F) -> Self
    where
        F: Fn(&WizardState) -> bool + Send + Sync + 'static,
    {
        self.nodes.push(StepNode {
            step,
            condition: Some(Arc::new(condition)),
        });
        self
    }

    pub fn build(self) -> StepSequencer {
        StepSequencer {
            variant: self.variant,
            nodes: self.nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{UserDetailsUpdate, WizardUpdate};
    use crate::step::PatientType;

    fn state_at(step: Step) -> WizardState {
        WizardState {
            current_step: step,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_role_sequence() {
        let sequencer = StepSequencer::for_variant(WizardVariant::SingleRole);
        let mut state = WizardState::default();
        assert_eq!(
            sequencer.sequence(&state),
            vec![
                Step::Welcome,
                Step::Terms,
                Step::Patient,
                Step::Symptoms,
                Step::Care,
                Step::Results
            ]
        );

        state.add_symptom("Headache");
        assert!(sequencer.contains(&state, Step::SymptomDetails));
        assert!(!sequencer.contains(&state, Step::UserType));
    }

    #[test]
    fn test_multi_role_skips_patient_unless_individual() {
        let sequencer = StepSequencer::for_variant(WizardVariant::MultiRole);
        let mut state = state_at(Step::UserDetails);
        state.user_type = Some(UserType::Insurance);
        assert_eq!(sequencer.next_step(&state), Some(Step::Symptoms));

        state.current_step = Step::Symptoms;
        assert_eq!(sequencer.previous_step(&state), Some(Step::UserDetails));

        state.user_type = Some(UserType::Individual);
        assert_eq!(sequencer.previous_step(&state), Some(Step::Patient));
    }

    #[test]
    fn test_symptom_details_follow_any_selection() {
        let sequencer = StepSequencer::for_variant(WizardVariant::SingleRole);
        let mut state = state_at(Step::Symptoms);
        assert_eq!(sequencer.next_step(&state), Some(Step::Care));

        state.add_symptom("Cough");
        assert_eq!(sequencer.next_step(&state), Some(Step::SymptomDetails));

        state.current_step = Step::SymptomDetails;
        assert!(sequencer.can_advance(&state));
        assert_eq!(sequencer.next_step(&state), Some(Step::Care));

        state.current_step = Step::Care;
        assert_eq!(sequencer.previous_step(&state), Some(Step::SymptomDetails));
    }

    #[test]
    fn test_ends_of_the_sequence() {
        let sequencer = StepSequencer::for_variant(WizardVariant::MultiRole);
        let welcome = state_at(Step::Welcome);
        assert_eq!(sequencer.previous_step(&welcome), None);
        assert!(!sequencer.can_go_back(&welcome));

        let results = state_at(Step::Results);
        assert_eq!(sequencer.next_step(&results), None);
        assert!(!sequencer.can_go_forward(&results));
        assert!(!sequencer.can_go_back(&results));
    }

    #[test]
    fn test_steps_outside_the_variant_have_no_neighbours() {
        let sequencer = StepSequencer::for_variant(WizardVariant::SingleRole);
        let state = state_at(Step::UserType);
        assert_eq!(sequencer.next_step(&state), None);
        assert_eq!(sequencer.reconcile(&state), Step::Welcome);
    }

    #[test]
    fn test_can_advance_terms() {
        let mut state = state_at(Step::Terms);
        assert!(!can_advance(Step::Terms, &state));
        state.accepted_terms = true;
        assert!(can_advance(Step::Terms, &state));
    }

    #[test]
    fn test_can_advance_user_details_per_role() {
        let mut state = state_at(Step::UserDetails);
        assert!(!can_advance(Step::UserDetails, &state));

        state.user_type = Some(UserType::Hospital);
        state.apply(WizardUpdate {
            user_details: Some(UserDetailsUpdate {
                hospital_name: Some("St. Mary".to_string()),
                patient_name: Some("Jo".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(!can_advance(Step::UserDetails, &state));
        state.specialist = Some("Neurologist".to_string());
        assert!(can_advance(Step::UserDetails, &state));

        state.user_type = Some(UserType::Insurance);
        assert!(!can_advance(Step::UserDetails, &state));
        state.user_details.name = "Acme Mutual".to_string();
        state.user_details.insurance_policy_number = "   ".to_string();
        assert!(!can_advance(Step::UserDetails, &state));
        state.user_details.insurance_policy_number = "P-1".to_string();
        assert!(can_advance(Step::UserDetails, &state));

        assert_eq!(required_user_details(UserType::Individual), &["name"]);
    }

    #[test]
    fn test_can_advance_other_steps() {
        let mut state = WizardState::default();
        assert!(can_advance(Step::Welcome, &state));
        assert!(can_advance(Step::SymptomDetails, &state));
        assert!(!can_advance(Step::Patient, &state));
        assert!(!can_advance(Step::Symptoms, &state));
        assert!(!can_advance(Step::Care, &state));

        state.patient_type = Some(PatientType::Myself);
        state.add_symptom("Nausea");
        state.care_type = Some("Not sure".to_string());
        assert!(can_advance(Step::Patient, &state));
        assert!(can_advance(Step::Symptoms, &state));
        assert!(can_advance(Step::Care, &state));
    }

    #[test]
    fn test_reconcile_moves_back_from_inactive_step() {
        let sequencer = StepSequencer::for_variant(WizardVariant::MultiRole);
        let mut state = state_at(Step::Patient);
        state.user_type = Some(UserType::Individual);
        assert_eq!(sequencer.reconcile(&state), Step::Patient);

        state.user_type = Some(UserType::Hospital);
        assert_eq!(sequencer.reconcile(&state), Step::UserDetails);
    }
}
