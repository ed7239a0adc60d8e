pub mod analysis;
pub mod catalog;
pub mod controller;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod report;
pub mod sequencer;
pub mod state;
pub mod step;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use analysis::{
    AnalysisPayload, AnalysisRequest, AnalysisRequester, AnalysisResponse, SymptomAnalysis,
};
pub use controller::{
    ControllerStatus, StayReason, Transition, WizardConfig, WizardController, WizardView,
};
pub use error::{AnalysisError, Result, WizardError};
#[cfg(feature = "http")]
pub use http::HttpAnalysisRequester;
pub use report::{ChartPoint, Report, render_report, render_value};
pub use sequencer::{SequenceBuilder, StepSequencer, can_advance};
pub use state::{
    DetailValue, MedicalHistory, UserDetails, UserDetailsUpdate, WizardState, WizardUpdate,
};
pub use step::{PatientType, Step, UserType, WizardVariant};
pub use storage::{InMemoryWizardStorage, WizardSession, WizardStorage};
pub use store::FormStore;
