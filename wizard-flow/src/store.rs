use tokio::sync::watch;

use crate::state::{WizardState, WizardUpdate};

/// Holds the [`WizardState`] of one session and broadcasts every change.
///
/// No business rules live here; validation belongs to the sequencer and the
/// controller.
#[derive(Debug)]
pub struct FormStore {
    tx: watch::Sender<WizardState>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::with_state(WizardState::default())
    }

    pub fn with_state(state: WizardState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx }
    }

    pub fn get(&self) -> WizardState {
        self.tx.borrow().clone()
    }

    /// Shallow merge of the touched fields
    pub fn set(&self, update: WizardUpdate) {
        self.tx.send_modify(|state| state.apply(update));
    }

    pub fn reset(&self) {
        self.tx.send_replace(WizardState::default());
    }

    /// Observe state changes. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<WizardState> {
        self.tx.subscribe()
    }

    /// Read-modify-write under the channel lock; subscribers are only notified when
    /// the closure reports a change.
    pub(crate) fn modify<R>(&self, f: impl FnOnce(&mut WizardState) -> (bool, R)) -> R {
        let mut output = None;
        self.tx.send_if_modified(|state| {
            let (changed, result) = f(state);
            output = Some(result);
            changed
        });
        // send_if_modified always runs the closure exactly once
        match output {
            Some(result) => result,
            None => unreachable!("state closure did not run"),
        }
    }
}

impl Default for FormStore {
    fn default() -> Self {
        Self::new()
    }
}
