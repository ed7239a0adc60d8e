use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::{controller::WizardController, error::Result};

/// A live wizard session
#[derive(Clone)]
pub struct WizardSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub controller: Arc<WizardController>,
}

impl WizardSession {
    pub fn new(id: impl Into<String>, controller: WizardController) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            controller: Arc::new(controller),
        }
    }
}

/// Trait for storing and retrieving wizard sessions
#[async_trait]
pub trait WizardStorage: Send + Sync {
    async fn save(&self, session: WizardSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<WizardSession>>;
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn len(&self) -> Result<usize>;
    /// Drop every session created before `cutoff`, returning how many went
    async fn evict_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// In-memory implementation of WizardStorage. Sessions vanish with the process.
pub struct InMemoryWizardStorage {
    sessions: Arc<DashMap<String, WizardSession>>,
}

impl InMemoryWizardStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryWizardStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WizardStorage for InMemoryWizardStorage {
    async fn save(&self, session: WizardSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WizardSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }

    async fn evict_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.created_at >= cutoff);
        Ok(before.saturating_sub(self.sessions.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisPayload, AnalysisRequest, AnalysisRequester};
    use crate::controller::WizardConfig;
    use crate::error::AnalysisError;
    use crate::step::Step;

    struct NeverCalled;

    #[async_trait]
    impl AnalysisRequester for NeverCalled {
        async fn request(
            &self,
            _request: AnalysisRequest,
        ) -> std::result::Result<AnalysisPayload, AnalysisError> {
            Err(AnalysisError::Transport("unused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sessions_share_their_controller() {
        let storage = InMemoryWizardStorage::new();
        let session = WizardSession::new(
            "session1",
            WizardController::new(WizardConfig::default(), Arc::new(NeverCalled)),
        );
        storage.save(session).await.unwrap();

        let first = storage.get("session1").await.unwrap().unwrap();
        first.controller.advance().await.unwrap();

        let second = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(second.controller.current_step(), Step::Terms);
        assert_eq!(storage.len().await.unwrap(), 1);

        assert!(storage.delete("session1").await.unwrap());
        assert!(!storage.delete("session1").await.unwrap());
        assert!(storage.get("session1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evicts_only_expired_sessions() {
        let storage = InMemoryWizardStorage::new();
        let controller = || WizardController::new(WizardConfig::default(), Arc::new(NeverCalled));

        let mut stale = WizardSession::new("stale", controller());
        stale.created_at = Utc::now() - chrono::Duration::hours(2);
        storage.save(stale).await.unwrap();
        storage.save(WizardSession::new("fresh", controller())).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(storage.evict_created_before(cutoff).await.unwrap(), 1);
        assert!(storage.get("stale").await.unwrap().is_none());
        assert!(storage.get("fresh").await.unwrap().is_some());
        assert_eq!(storage.evict_created_before(cutoff).await.unwrap(), 0);
    }
}
