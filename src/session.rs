/// User session as seen from the client side: the bearer token and
/// where it is persisted.
use crate::api_error::ApiError;
use crate::token_store::TokenStore;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// What to do when the backend says the session is gone.  In the
/// browser this navigated to the entry page.
pub trait SessionExpired: Send + Sync {
    fn session_expired(&self);
}

impl<F> SessionExpired for F
where
    F: Fn() + Send + Sync,
{
    fn session_expired(&self) {
        self()
    }
}

/// Default reaction to an expired session: log where the user should
/// be sent.
#[derive(Debug, Clone)]
pub struct LogRedirect {
    pub entry_page: String,
}

impl SessionExpired for LogRedirect {
    fn session_expired(&self) {
        log::warn!("Session expired.  Redirecting to {}", self.entry_page);
    }
}

pub struct Session {
    key: String,
    token: RwLock<Option<String>>,
    store: Arc<dyn TokenStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token itself
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("authenticated", &self.is_authenticated())
            .field("store", &self.store)
            .finish()
    }
}

impl Session {
    /// Pick up whatever token `store` already holds under `key`
    pub fn restore(key: &str, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let token = store.get(key)?;
        Ok(Self {
            key: key.to_string(),
            token: RwLock::new(token),
            store,
        })
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The token is only taken up once it is persisted
    pub fn set_token(&self, token: &str) -> Result<(), ApiError> {
        let mut current = self.token.write().unwrap_or_else(PoisonError::into_inner);
        self.store.set(self.key.as_str(), token)?;
        *current = Some(token.to_string());
        Ok(())
    }

    /// Memory is cleared even if the store cannot forget the token
    pub fn clear(&self) -> Result<(), ApiError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.store.remove(self.key.as_str())
    }
}
