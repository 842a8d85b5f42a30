use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::identity::IdentityProvider;
use crate::store::ChallengeStore;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChallengeStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(store: Arc<dyn ChallengeStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidArgument(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::StoreUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::identity::{Identity, InMemoryIdentityProvider};
    use crate::store::InMemoryStore;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        store: Option<Arc<dyn ChallengeStore>>,
        identity: Option<Arc<dyn IdentityProvider>>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                store: None,
                identity: None,
            }
        }

        pub fn with_store(mut self, store: Arc<dyn ChallengeStore>) -> Self {
            self.store = Some(store);
            self
        }

        pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
            self.identity = Some(identity);
            self
        }

        /// Convenience: sign in a fixed test identity
        pub fn signed_in_as(self, user_id: &str, display_name: &str) -> Self {
            let provider = InMemoryIdentityProvider::new();
            provider.sign_in(Identity {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                icon_url: None,
            });
            self.with_identity(Arc::new(provider))
        }

        pub fn build(self) -> AppState {
            AppState {
                store: self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new())),
                identity: self
                    .identity
                    .unwrap_or_else(|| Arc::new(InMemoryIdentityProvider::new())),
            }
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
