use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{debug, info};

/// The authenticated person using the app, as supplied by an external
/// identity system. Carries the profile fields needed to bootstrap a
/// `User` row on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub icon_url: Option<String>,
}

/// Seam for the external authentication system.
///
/// The lifecycle and aggregation services only ever ask "who is signed in
/// right now"; provisioning, tokens, and session handling live behind
/// this trait.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in identity, or None when signed out
    async fn current_identity(&self) -> Option<Identity>;

    async fn sign_out(&self);
}

/// In-memory identity provider for development and testing
pub struct InMemoryIdentityProvider {
    current: RwLock<Option<Identity>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity)),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(user_id = %identity.user_id, "Signing in identity");
        *self.current.write().unwrap() = Some(identity);
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_identity(&self) -> Option<Identity> {
        let current = self.current.read().unwrap().clone();
        debug!(signed_in = current.is_some(), "Identity lookup");
        current
    }

    async fn sign_out(&self) {
        let mut current = self.current.write().unwrap();
        if let Some(identity) = current.take() {
            info!(user_id = %identity.user_id, "Signed out");
        }
    }
}
