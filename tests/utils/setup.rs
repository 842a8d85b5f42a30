use std::sync::Arc;

use challengelog::identity::{Identity, InMemoryIdentityProvider};
use challengelog::room::LifecycleService;
use challengelog::stats::StatsService;
use challengelog::store::InMemoryStore;

/// Shared wiring for workflow tests: one in-memory store, one identity
/// provider, and both services on top of them.
pub struct TestSetup {
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<InMemoryIdentityProvider>,
    pub lifecycle: LifecycleService,
    pub stats: StatsService,
}

impl TestSetup {
    /// Switches the signed-in user; existing rooms and rows are untouched
    pub fn sign_in_as(&self, user_id: &str, display_name: &str) {
        self.identity.sign_in(Identity {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            icon_url: None,
        });
    }
}

pub struct TestSetupBuilder {
    signed_in: Option<(String, String)>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self { signed_in: None }
    }

    pub fn signed_in_as(mut self, user_id: &str, display_name: &str) -> Self {
        self.signed_in = Some((user_id.to_string(), display_name.to_string()));
        self
    }

    pub fn build(self) -> TestSetup {
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(InMemoryIdentityProvider::new());

        if let Some((user_id, display_name)) = self.signed_in {
            identity.sign_in(Identity {
                user_id,
                display_name,
                icon_url: None,
            });
        }

        let lifecycle = LifecycleService::new(store.clone(), identity.clone());
        let stats = StatsService::new(store.clone());

        TestSetup {
            store,
            identity,
            lifecycle,
            stats,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
