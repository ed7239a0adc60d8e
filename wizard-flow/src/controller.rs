//! Drives one session's step transitions and owns the single
//! side effect of the wizard: submitting the answers for analysis when the user
//! advances past the care step.
//!
//! ## Submission
//! `advance()` on the care step enters the *submitting* state, calls the
//! [`AnalysisRequester`] with a snapshot of the answers and suspends until it settles.
//! While submitting:
//! * further `advance()` calls fail with [`WizardError::SubmissionInProgress`] so the
//!   remote call is never issued twice,
//! * `back()` is refused the same way,
//! * `restart()` is allowed. It bumps the session generation, so the in-flight result is
//!   discarded when it arrives and the fresh session is idle at once.
//!
//! The in-flight marker records the generation that owns it and is released by a drop
//! guard, so a cancelled `advance()` future cannot leave the session stuck.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    analysis::{AnalysisRequest, AnalysisRequester},
    catalog,
    error::{AnalysisError, Result, WizardError},
    sequencer::StepSequencer,
    state::{DetailValue, WizardState, WizardUpdate},
    step::{Step, UserType, WizardVariant},
    store::FormStore,
};

/// Controller settings
#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub variant: WizardVariant,
    /// Upper bound for one analysis call
    pub analysis_timeout: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            variant: WizardVariant::default(),
            analysis_timeout: Duration::from_secs(60),
        }
    }
}

/// Why a navigation request left the step unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StayReason {
    /// The current step's answers are incomplete
    Incomplete,
    /// Nothing follows (results)
    NoNextStep,
    /// Nothing precedes (welcome), or going back is not offered
    NoPreviousStep,
}

/// Outcome of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Transition {
    Moved { from: Step, to: Step },
    Stayed { step: Step, reason: StayReason },
    /// The session was restarted while the analysis was in flight
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerStatus {
    Idle,
    Submitting,
}

/// Serializable snapshot for clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub variant: WizardVariant,
    pub state: WizardState,
    pub sequence: Vec<Step>,
    pub can_advance: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub status: ControllerStatus,
}

/// No submission in flight
const IDLE: u64 = u64::MAX;

struct SubmissionGuard<'a> {
    in_flight: &'a AtomicU64,
    generation: u64,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        // a submission from a newer generation may own the marker by now
        let _ = self.in_flight.compare_exchange(
            self.generation,
            IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

pub struct WizardController {
    store: FormStore,
    sequencer: StepSequencer,
    requester: Arc<dyn AnalysisRequester>,
    config: WizardConfig,
    /// Generation of the session whose analysis is in flight, or `IDLE`
    in_flight: AtomicU64,
    generation: AtomicU64,
}

impl WizardController {
    pub fn new(config: WizardConfig, requester: Arc<dyn AnalysisRequester>) -> Self {
        Self {
            store: FormStore::new(),
            sequencer: StepSequencer::for_variant(config.variant),
            requester,
            config,
            in_flight: AtomicU64::new(IDLE),
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &FormStore {
        &self.store
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn variant(&self) -> WizardVariant {
        self.config.variant
    }

    pub fn state(&self) -> WizardState {
        self.store.get()
    }

    pub fn current_step(&self) -> Step {
        self.store.get().current_step
    }

    /// Whether the current session has an analysis in flight. A submission left
    /// over from before a restart does not count.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == self.generation.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ControllerStatus {
        if self.is_submitting() {
            ControllerStatus::Submitting
        } else {
            ControllerStatus::Idle
        }
    }

    pub fn view(&self) -> WizardView {
        let state = self.store.get();
        WizardView {
            variant: self.config.variant,
            sequence: self.sequencer.sequence(&state),
            can_advance: self.sequencer.can_advance(&state),
            can_go_back: self.sequencer.can_go_back(&state),
            can_go_forward: self.sequencer.can_go_forward(&state),
            status: self.status(),
            state,
        }
    }

    /// Move forward one step, or submit the answers when leaving the care step
    pub async fn advance(&self) -> Result<Transition> {
        if self.is_submitting() {
            debug!("advance rejected, analysis in flight");
            return Err(WizardError::SubmissionInProgress);
        }

        let sequencer = &self.sequencer;
        let last_input = sequencer.last_input_step();
        let transition = self.store.modify(|state| {
            let from = state.current_step;
            if from == last_input {
                return (false, None);
            }
            if !sequencer.can_advance(state) {
                return (false, Some(stayed(from, StayReason::Incomplete)));
            }
            match sequencer.next_step(state) {
                Some(to) => {
                    state.current_step = to;
                    (true, Some(Transition::Moved { from, to }))
                }
                None => (false, Some(stayed(from, StayReason::NoNextStep))),
            }
        });

        match transition {
            Some(transition) => {
                if let Transition::Moved { from, to } = transition {
                    debug!(from = %from, to = %to, "advanced");
                }
                Ok(transition)
            }
            None => self.submit().await,
        }
    }

    async fn submit(&self) -> Result<Transition> {
        let generation = self.generation.load(Ordering::Acquire);
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current == generation {
                debug!("duplicate submission rejected");
                return Err(WizardError::SubmissionInProgress);
            }
            match self.in_flight.compare_exchange(
                current,
                generation,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        let _guard = SubmissionGuard {
            in_flight: &self.in_flight,
            generation,
        };

        let state = self.store.get();
        let last_input = self.sequencer.last_input_step();
        if state.current_step != last_input {
            // moved by a concurrent caller between the check and the flag
            return Ok(stayed(state.current_step, StayReason::NoNextStep));
        }
        if !self.sequencer.can_advance(&state) {
            return Ok(stayed(last_input, StayReason::Incomplete));
        }

        let request = AnalysisRequest::from_state(&state, self.config.variant);
        info!(
            symptoms = request.symptoms.len(),
            care_type = ?request.care_type,
            "submitting answers for analysis"
        );

        let timeout = self.config.analysis_timeout;
        let outcome = tokio::time::timeout(timeout, self.requester.request(request))
            .await
            .unwrap_or(Err(AnalysisError::Timeout(timeout)));

        if self.generation.load(Ordering::Acquire) != generation {
            info!("session restarted during analysis, discarding result");
            return Ok(Transition::Discarded);
        }

        match outcome {
            Ok(payload) => {
                let applied = self.store.modify(|state| {
                    if state.current_step != last_input {
                        return (false, false);
                    }
                    state.results = Some(payload);
                    state.current_step = Step::Results;
                    (true, true)
                });
                if !applied {
                    warn!("session left the care step during analysis, discarding result");
                    return Ok(Transition::Discarded);
                }
                info!("analysis stored, showing results");
                Ok(Transition::Moved {
                    from: last_input,
                    to: Step::Results,
                })
            }
            Err(e) => {
                warn!(error = %e, "analysis failed, staying on care step");
                Err(WizardError::Analysis(e))
            }
        }
    }

    /// Move back one step, honouring the same skip rules as `advance`
    pub fn back(&self) -> Result<Transition> {
        if self.is_submitting() {
            return Err(WizardError::SubmissionInProgress);
        }
        let sequencer = &self.sequencer;
        let transition = self.store.modify(|state| {
            let from = state.current_step;
            if !sequencer.can_go_back(state) {
                return (false, stayed(from, StayReason::NoPreviousStep));
            }
            match sequencer.previous_step(state) {
                Some(to) => {
                    state.current_step = to;
                    (true, Transition::Moved { from, to })
                }
                None => (false, stayed(from, StayReason::NoPreviousStep)),
            }
        });
        Ok(transition)
    }

    /// Discard every answer and return to the first step
    pub fn restart(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.store.reset();
        info!("wizard restarted");
    }

    /// Merge answers. The step and results fields of the update are ignored.
    pub fn update(&self, update: WizardUpdate) -> Result<WizardState> {
        let update = update.answers_only();
        if let Some(care_type) = update.care_type.as_deref() {
            if !catalog::is_care_type(care_type) {
                return Err(WizardError::invalid_answer(
                    "careType",
                    format!("unknown care type '{care_type}'"),
                ));
            }
        }
        if let Some(specialist) = update.specialist.as_deref() {
            if !catalog::is_specialist(specialist) {
                return Err(WizardError::invalid_answer(
                    "specialist",
                    format!("unknown specialist '{specialist}'"),
                ));
            }
        }
        if let Some(symptoms) = update.symptoms.as_ref() {
            let mut preview = self.store.get();
            if let Some(user_type) = update.user_type {
                preview.user_type = Some(user_type);
            }
            if let Some(specialist) = update.specialist.clone() {
                preview.specialist = Some(specialist);
            }
            let catalog = active_catalog(&preview);
            if let Some(unknown) = symptoms.iter().find(|s| !catalog.contains(&s.as_str())) {
                return Err(WizardError::invalid_answer(
                    "symptoms",
                    format!("unknown symptom '{unknown}'"),
                ));
            }
        }
        if let Some(details) = update.symptom_details.as_ref() {
            for (symptom, detail) in details {
                for (key, value) in detail {
                    validate_detail(symptom, key, value)?;
                }
            }
        }

        self.modify_answers(|state| {
            state.apply(update);
            Ok(())
        })
    }

    pub fn add_symptom(&self, symptom: &str) -> Result<WizardState> {
        self.modify_answers(|state| {
            let catalog = active_catalog(state);
            let Some(label) = catalog.iter().find(|s| s.eq_ignore_ascii_case(symptom.trim()))
            else {
                return Err(WizardError::invalid_answer(
                    "symptoms",
                    format!("unknown symptom '{symptom}'"),
                ));
            };
            state.add_symptom(label);
            Ok(())
        })
    }

    pub fn remove_symptom(&self, symptom: &str) -> Result<WizardState> {
        self.modify_answers(|state| {
            let label = state
                .symptoms
                .iter()
                .find(|s| s.eq_ignore_ascii_case(symptom.trim()))
                .cloned();
            if let Some(label) = label {
                state.remove_symptom(&label);
            }
            Ok(())
        })
    }

    /// Answer one attribute of a selected symptom's detail form
    pub fn set_symptom_detail(
        &self,
        symptom: &str,
        key: &str,
        value: DetailValue,
    ) -> Result<WizardState> {
        validate_detail(symptom, key, &value)?;
        // selection is checked under the same write as the insert, so a concurrent
        // removal cannot leave an orphaned detail entry
        self.modify_answers(|state| {
            let Some(label) = state.symptoms.iter().find(|s| s.eq_ignore_ascii_case(symptom))
            else {
                return Err(WizardError::invalid_answer(
                    "symptomDetails",
                    format!("'{symptom}' is not a selected symptom"),
                ));
            };
            let detail_key = catalog::detail_key(label);
            state
                .symptom_details
                .entry(detail_key)
                .or_default()
                .insert(key.to_string(), value);
            Ok(())
        })
    }

    /// Selectable symptoms for the current answers, filtered by a search term
    pub fn available_symptoms(&self, search: &str) -> Vec<&'static str> {
        catalog::filter_symptoms(active_catalog(&self.store.get()), search)
    }

    /// Apply an edit atomically; a rejected edit leaves the state and its
    /// subscribers untouched
    fn modify_answers(
        &self,
        f: impl FnOnce(&mut WizardState) -> Result<()>,
    ) -> Result<WizardState> {
        let sequencer = &self.sequencer;
        self.store.modify(|state| {
            if let Err(e) = f(state) {
                return (false, Err(e));
            }
            let step = sequencer.reconcile(state);
            if step != state.current_step {
                debug!(from = %state.current_step, to = %step, "step no longer active");
                state.current_step = step;
            }
            (true, Ok(state.clone()))
        })
    }
}

fn stayed(step: Step, reason: StayReason) -> Transition {
    Transition::Stayed { step, reason }
}

/// Hospital users pick from their specialist's list, everyone else from the basic list
pub fn active_catalog(state: &WizardState) -> &'static [&'static str] {
    match (state.user_type, state.specialist.as_deref()) {
        (Some(UserType::Hospital), Some(specialist)) => {
            catalog::specialist_symptoms(specialist).unwrap_or(catalog::BASIC_SYMPTOMS)
        }
        _ => catalog::BASIC_SYMPTOMS,
    }
}

fn validate_detail(symptom: &str, key: &str, value: &DetailValue) -> Result<()> {
    let field_name = format!("symptomDetails.{}.{}", catalog::detail_key(symptom), key);
    let form = catalog::detail_form(symptom).ok_or_else(|| {
        WizardError::invalid_answer(&field_name, format!("'{symptom}' has no detail form"))
    })?;
    let field = form
        .field(key)
        .ok_or_else(|| WizardError::invalid_answer(&field_name, "unknown attribute"))?;
    match (field, value) {
        (catalog::DetailField::Choice { options, .. }, DetailValue::Choice(choice)) => {
            if options.contains(&choice.as_str()) {
                Ok(())
            } else {
                let expected = format!("expected one of {}", options.join(", "));
                Err(WizardError::invalid_answer(&field_name, expected))
            }
        }
        (catalog::DetailField::Flag { .. }, DetailValue::Flag(_)) => Ok(()),
        (catalog::DetailField::Choice { .. }, DetailValue::Flag(_)) => {
            Err(WizardError::invalid_answer(&field_name, "expected a choice"))
        }
        (catalog::DetailField::Flag { .. }, DetailValue::Choice(_)) => {
            Err(WizardError::invalid_answer(&field_name, "expected true or false"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisPayload;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct CountingRequester {
        calls: AtomicUsize,
        fail: bool,
    }

    fn counting(fail: bool) -> Arc<CountingRequester> {
        Arc::new(CountingRequester {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[async_trait]
    impl AnalysisRequester for CountingRequester {
        async fn request(
            &self,
            _request: AnalysisRequest,
        ) -> std::result::Result<AnalysisPayload, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AnalysisError::Status { status: 500 })
            } else {
                AnalysisPayload::from_value(json!({"recommendation": {"summary": "ok"}}))
            }
        }
    }

    /// Blocks until released, announcing when the call has started
    struct GatedRequester {
        calls: AtomicUsize,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AnalysisRequester for GatedRequester {
        async fn request(
            &self,
            _request: AnalysisRequest,
        ) -> std::result::Result<AnalysisPayload, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            AnalysisPayload::from_value(json!({"recommendation": {"summary": "late"}}))
        }
    }

    fn single_role(requester: Arc<dyn AnalysisRequester>) -> WizardController {
        WizardController::new(
            WizardConfig {
                variant: WizardVariant::SingleRole,
                ..Default::default()
            },
            requester,
        )
    }

    fn at_care(controller: &WizardController) {
        controller.store().set(WizardUpdate {
            current_step: Some(Step::Care),
            accepted_terms: Some(true),
            patient_type: Some(crate::step::PatientType::Myself),
            symptoms: Some(vec!["Cough".to_string()]),
            care_type: Some("Urgent care".to_string()),
            ..Default::default()
        });
    }

    #[tokio::test]
    async fn test_advance_blocked_until_terms_accepted() {
        let controller = single_role(counting(false));
        assert_eq!(
            controller.advance().await.unwrap(),
            Transition::Moved { from: Step::Welcome, to: Step::Terms }
        );
        assert_eq!(
            controller.advance().await.unwrap(),
            Transition::Stayed { step: Step::Terms, reason: StayReason::Incomplete }
        );

        controller
            .update(WizardUpdate { accepted_terms: Some(true), ..Default::default() })
            .unwrap();
        assert_eq!(
            controller.advance().await.unwrap(),
            Transition::Moved { from: Step::Terms, to: Step::Patient }
        );
    }

    #[tokio::test]
    async fn test_failed_analysis_stays_on_care() {
        let requester = counting(true);
        let controller = single_role(requester.clone());
        at_care(&controller);

        let err = controller.advance().await.unwrap_err();
        assert!(matches!(err, WizardError::Analysis(AnalysisError::Status { status: 500 })));
        let state = controller.state();
        assert_eq!(state.current_step, Step::Care);
        assert!(state.results.is_none());
        assert!(!controller.is_submitting());

        // manual retry issues a second call
        let _ = controller.advance().await;
        assert_eq!(requester.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_rejected() {
        let requester = Arc::new(GatedRequester {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let controller = Arc::new(single_role(requester.clone()));
        at_care(&controller);

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.advance().await }
        });
        requester.started.notified().await;

        assert!(controller.is_submitting());
        assert!(matches!(controller.advance().await, Err(WizardError::SubmissionInProgress)));
        assert!(matches!(controller.back(), Err(WizardError::SubmissionInProgress)));

        requester.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, Transition::Moved { from: Step::Care, to: Step::Results });
        assert_eq!(requester.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.status(), ControllerStatus::Idle);
    }

    #[tokio::test]
    async fn test_restart_during_submission_discards_result() {
        let requester = Arc::new(GatedRequester {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let controller = Arc::new(single_role(requester.clone()));
        at_care(&controller);

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.advance().await }
        });
        requester.started.notified().await;

        controller.restart();
        requester.release.notify_one();

        assert_eq!(first.await.unwrap().unwrap(), Transition::Discarded);
        let state = controller.state();
        assert_eq!(state, WizardState::default());
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn test_restart_during_submission_frees_fresh_session() {
        let requester = Arc::new(GatedRequester {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let controller = Arc::new(single_role(requester.clone()));
        at_care(&controller);

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.advance().await }
        });
        requester.started.notified().await;
        controller.restart();

        assert_eq!(controller.status(), ControllerStatus::Idle);
        assert_eq!(controller.view().status, ControllerStatus::Idle);
        assert_eq!(
            controller.advance().await.unwrap(),
            Transition::Moved { from: Step::Welcome, to: Step::Terms }
        );
        assert_eq!(
            controller.back().unwrap(),
            Transition::Moved { from: Step::Terms, to: Step::Welcome }
        );
        controller.advance().await.unwrap();

        requester.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), Transition::Discarded);
        assert_eq!(controller.current_step(), Step::Terms);
        assert!(controller.state().results.is_none());
        assert_eq!(controller.status(), ControllerStatus::Idle);
    }

    #[tokio::test]
    async fn test_fresh_session_can_submit_while_stale_call_is_pending() {
        let requester = Arc::new(GatedRequester {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let controller = Arc::new(single_role(requester.clone()));
        at_care(&controller);

        let stale = tokio::spawn({
            let controller = controller.clone();
            async move { controller.advance().await }
        });
        requester.started.notified().await;
        controller.restart();
        at_care(&controller);

        let fresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.advance().await }
        });
        requester.started.notified().await;
        assert!(controller.is_submitting());

        requester.release.notify_one();
        requester.release.notify_one();
        let outcomes = [stale.await.unwrap().unwrap(), fresh.await.unwrap().unwrap()];
        assert!(outcomes.contains(&Transition::Discarded));
        assert!(outcomes.contains(&Transition::Moved { from: Step::Care, to: Step::Results }));
        assert_eq!(requester.calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.current_step(), Step::Results);
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn test_analysis_timeout() {
        let requester = Arc::new(GatedRequester {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let controller = WizardController::new(
            WizardConfig {
                variant: WizardVariant::SingleRole,
                analysis_timeout: Duration::from_millis(20),
            },
            requester,
        );
        at_care(&controller);

        let err = controller.advance().await.unwrap_err();
        assert!(matches!(err, WizardError::Analysis(AnalysisError::Timeout(_))));
        assert_eq!(controller.current_step(), Step::Care);
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn test_symptom_catalog_and_details_validation() {
        let controller = single_role(counting(false));

        assert!(controller.add_symptom("Purple skin").is_err());
        let state = controller.add_symptom("headache").unwrap();
        assert_eq!(state.symptoms, vec!["Headache"]);

        assert!(controller
            .set_symptom_detail("Headache", "duration", DetailValue::Choice("weekly".to_string()))
            .is_err());
        assert!(controller
            .set_symptom_detail("Headache", "duration", DetailValue::Flag(true))
            .is_err());
        assert!(controller
            .set_symptom_detail("Fever", "runnyNose", DetailValue::Flag(true))
            .is_err());

        controller
            .set_symptom_detail("Headache", "duration", DetailValue::Choice("chronic".to_string()))
            .unwrap();
        let state = controller
            .set_symptom_detail("Headache", "intensity", DetailValue::Choice("mild".to_string()))
            .unwrap();
        assert_eq!(state.symptom_details["headache"].len(), 2);

        let state = controller.remove_symptom("Headache").unwrap();
        assert!(state.symptom_details.is_empty());
    }

    #[tokio::test]
    async fn test_detail_for_unselected_symptom_is_rejected() {
        let controller = single_role(counting(false));
        let mut changes = controller.store().subscribe();
        changes.borrow_and_update();

        let err = controller
            .set_symptom_detail("Fever", "soreThroat", DetailValue::Flag(true))
            .unwrap_err();
        assert!(
            matches!(err, WizardError::InvalidAnswer { ref field, .. } if field == "symptomDetails")
        );
        assert!(controller.state().symptom_details.is_empty());
        assert!(!changes.has_changed().unwrap());
    }

    #[test]
    fn test_concurrent_detail_edits_leave_no_orphans() {
        let controller = single_role(counting(false));
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    controller.add_symptom("Fever").unwrap();
                    controller.remove_symptom("Fever").unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..500 {
                    let _ = controller.set_symptom_detail(
                        "Fever",
                        "soreThroat",
                        DetailValue::Flag(true),
                    );
                    let state = controller.state();
                    for key in state.symptom_details.keys() {
                        assert!(state.symptoms.iter().any(|s| &catalog::detail_key(s) == key));
                    }
                }
            });
        });

        let state = controller.state();
        assert!(state.symptoms.is_empty());
        assert!(state.symptom_details.is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_catalog_values() {
        let controller = single_role(counting(false));
        let err = controller
            .update(WizardUpdate { care_type: Some("Spa day".to_string()), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, WizardError::InvalidAnswer { ref field, .. } if field == "careType"));
        assert!(controller
            .update(WizardUpdate { specialist: Some("Dentist".to_string()), ..Default::default() })
            .is_err());
    }

    #[tokio::test]
    async fn test_hospital_catalog_follows_specialist() {
        let controller = WizardController::new(
            WizardConfig::default(),
            counting(false),
        );
        controller
            .update(WizardUpdate {
                user_type: Some(UserType::Hospital),
                specialist: Some("Dermatologist".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(controller.available_symptoms("").contains(&"Acne"));
        assert!(controller.add_symptom("Fever").is_err());
        assert_eq!(controller.available_symptoms("it"), vec!["Itching"]);
    }

    #[tokio::test]
    async fn test_removing_last_symptom_reconciles_step() {
        let controller = single_role(counting(false));
        controller.add_symptom("Fever").unwrap();
        controller.store().set(WizardUpdate::step(Step::SymptomDetails));

        let state = controller.remove_symptom("Fever").unwrap();
        assert_eq!(state.current_step, Step::Symptoms);
    }

    #[tokio::test]
    async fn test_view_reports_flags() {
        let controller = single_role(counting(false));
        let view = controller.view();
        assert_eq!(view.state.current_step, Step::Welcome);
        assert!(view.can_advance);
        assert!(!view.can_go_back);
        assert_eq!(view.status, ControllerStatus::Idle);
        assert_eq!(view.sequence.first(), Some(&Step::Welcome));
        assert_eq!(view.sequence.last(), Some(&Step::Results));
    }
}
