//! Single source of truth for the authenticated seller.
//!
//! Exactly one identity is active per process, readable by any consumer and
//! mutable only through [`SessionManager::sign_in`] and
//! [`SessionManager::sign_out`]. The manager also drives the binary
//! navigation gate between the unauthenticated and authenticated areas.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::api::User;
use crate::error::{Error, Result};

mod store;

pub use store::{SessionStore, TOKEN_KEY, USER_KEY};

const STORE_OP_TIMEOUT: Duration = Duration::from_secs(3);
const RESTORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Navigation areas gated by authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Area {
    /// The landing screen.
    Welcome,
    /// Login and account-creation screens.
    Auth,
    /// Everything behind authentication.
    App,
}

/// Where the navigation gate sends a caller that is in the wrong area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Redirect {
    /// Back to the landing screen (session missing).
    Welcome,
    /// Into the authenticated home screen (session already active).
    Home,
}

struct ActiveSession {
    token: SecretString,
    user: User,
}

/// Owns the process-wide authenticated session.
#[cfg_attr(feature = "ffi", derive(uniffi::Object))]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    active: RwLock<Option<ActiveSession>>,
    op_timeout: Duration,
    restore_timeout: Duration,
}

#[cfg_attr(feature = "ffi", uniffi::export(async_runtime = "tokio"))]
impl SessionManager {
    /// Creates a manager over the host's session store. No session is active
    /// until [`Self::restore`] or [`Self::sign_in`] runs.
    #[cfg_attr(feature = "ffi", uniffi::constructor)]
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_timeouts(store, STORE_OP_TIMEOUT, RESTORE_TIMEOUT)
    }

    /// Loads the persisted session, if any, and activates it.
    ///
    /// Bounded by a hard timeout: a hanging or failing store logs a warning
    /// and leaves the process unauthenticated instead of blocking startup.
    /// Returns the restored identity when one was activated.
    pub async fn restore(&self) -> Option<User> {
        match timeout(self.restore_timeout, self.read_persisted()).await {
            Ok(Ok(Some((token, user)))) => {
                let mut active = self.active.write().await;
                *active = Some(ActiveSession {
                    token: SecretString::from(token),
                    user: user.clone(),
                });
                tracing::info!(user_id = user.id, "session restored");
                Some(user)
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                tracing::warn!(%err, "session restore failed; continuing unauthenticated");
                None
            }
            Err(_) => {
                tracing::warn!("session restore timed out; continuing unauthenticated");
                None
            }
        }
    }

    /// Persists and activates a session obtained from
    /// [`crate::api::ApiClient::authenticate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when persistence fails; the in-memory
    /// session is not activated in that case.
    pub async fn sign_in(&self, token: String, user: User) -> Result<()> {
        let user_json = serde_json::to_string(&user).map_err(|err| Error::Serialization {
            error: format!("serializing user record: {err}"),
        })?;
        self.write_key(TOKEN_KEY, token.clone()).await?;
        self.write_key(USER_KEY, user_json).await?;
        let mut active = self.active.write().await;
        *active = Some(ActiveSession {
            token: SecretString::from(token),
            user: user.clone(),
        });
        tracing::info!(user_id = user.id, "signed in");
        Ok(())
    }

    /// Clears the persisted and in-memory session. Store failures are logged
    /// and swallowed; the in-memory session is always cleared.
    pub async fn sign_out(&self) {
        if let Err(err) = self.delete_key(TOKEN_KEY).await {
            tracing::warn!(%err, "failed to clear persisted token");
        }
        if let Err(err) = self.delete_key(USER_KEY).await {
            tracing::warn!(%err, "failed to clear persisted user");
        }
        let mut active = self.active.write().await;
        *active = None;
        tracing::info!("signed out");
    }

    /// Returns the authenticated seller, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.active.read().await.as_ref().map(|s| s.user.clone())
    }

    /// Whether a session is active.
    pub async fn is_authenticated(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// The navigation gate: given the area the caller is about to show,
    /// returns where to send it instead, or `None` when the area is allowed.
    pub async fn gate(&self, area: Area) -> Option<Redirect> {
        let authenticated = self.is_authenticated().await;
        match (authenticated, area) {
            (false, Area::App) => Some(Redirect::Welcome),
            (true, Area::Welcome | Area::Auth) => Some(Redirect::Home),
            _ => None,
        }
    }
}

impl SessionManager {
    pub(crate) fn with_timeouts(
        store: Arc<dyn SessionStore>,
        op_timeout: Duration,
        restore_timeout: Duration,
    ) -> Self {
        Self {
            store,
            active: RwLock::new(None),
            op_timeout,
            restore_timeout,
        }
    }

    /// The bearer token of the active session, for the API gateway.
    pub(crate) async fn bearer_token(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|s| s.token.expose_secret().to_string())
    }

    async fn read_persisted(&self) -> Result<Option<(String, User)>> {
        let token = self.read_key(TOKEN_KEY).await?;
        let user_json = self.read_key(USER_KEY).await?;
        match (token, user_json) {
            (Some(token), Some(user_json)) => {
                let user: User =
                    serde_json::from_str(&user_json).map_err(|err| Error::Serialization {
                        error: format!("persisted user record: {err}"),
                    })?;
                Ok(Some((token, user)))
            }
            _ => Ok(None),
        }
    }

    async fn read_key(&self, key: &'static str) -> Result<Option<String>> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || store.read(key.to_string()));
        self.bounded(key, task).await
    }

    async fn write_key(&self, key: &'static str, value: String) -> Result<()> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || store.write(key.to_string(), value));
        self.bounded(key, task).await
    }

    async fn delete_key(&self, key: &'static str) -> Result<()> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || store.delete(key.to_string()));
        self.bounded(key, task).await
    }

    /// Runs a store operation under the per-operation timeout.
    async fn bounded<T>(&self, key: &str, task: JoinHandle<Result<T>>) -> Result<T> {
        match timeout(self.op_timeout, task).await {
            Err(_) => Err(Error::Storage {
                error: format!("operation on {key} timed out"),
            }),
            Ok(Err(join_err)) => Err(Error::Storage {
                error: join_err.to_string(),
            }),
            Ok(Ok(result)) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::test_support::{sample_seller, InMemorySessionStore};

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemorySessionStore::default()))
    }

    #[tokio::test]
    async fn sign_in_persists_and_activates() {
        let store = Arc::new(InMemorySessionStore::default());
        let manager = SessionManager::new(Arc::clone(&store) as Arc<dyn SessionStore>);

        manager
            .sign_in("tok123".to_string(), sample_seller())
            .await
            .unwrap();

        assert!(manager.is_authenticated().await);
        assert_eq!(manager.bearer_token().await.as_deref(), Some("tok123"));
        assert_eq!(
            store.read(TOKEN_KEY.to_string()).unwrap().as_deref(),
            Some("tok123")
        );
        let persisted_user = store.read(USER_KEY.to_string()).unwrap().unwrap();
        assert!(persisted_user.contains("\"nome\""));
    }

    #[tokio::test]
    async fn restore_activates_persisted_session() {
        let store = Arc::new(InMemorySessionStore::default());
        store
            .write(TOKEN_KEY.to_string(), "tok456".to_string())
            .unwrap();
        store
            .write(
                USER_KEY.to_string(),
                serde_json::to_string(&sample_seller()).unwrap(),
            )
            .unwrap();

        let manager = SessionManager::new(store);
        let restored = manager.restore().await;
        assert_eq!(restored.unwrap().nome, sample_seller().nome);
        assert_eq!(manager.bearer_token().await.as_deref(), Some("tok456"));
    }

    #[tokio::test]
    async fn restore_without_persisted_session_is_unauthenticated() {
        let manager = manager();
        assert!(manager.restore().await.is_none());
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn restore_with_corrupt_user_record_is_unauthenticated() {
        let store = Arc::new(InMemorySessionStore::default());
        store
            .write(TOKEN_KEY.to_string(), "tok".to_string())
            .unwrap();
        store
            .write(USER_KEY.to_string(), "not json".to_string())
            .unwrap();

        let manager = SessionManager::new(store);
        assert!(manager.restore().await.is_none());
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn restore_on_hanging_store_times_out_unauthenticated() {
        struct SlowStore;
        impl SessionStore for SlowStore {
            fn read(&self, _key: String) -> Result<Option<String>> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(Some("late".to_string()))
            }
            fn write(&self, _key: String, _value: String) -> Result<()> {
                Ok(())
            }
            fn delete(&self, _key: String) -> Result<()> {
                Ok(())
            }
        }

        let manager = SessionManager::with_timeouts(
            Arc::new(SlowStore),
            Duration::from_millis(50),
            Duration::from_millis(100),
        );
        assert!(manager.restore().await.is_none());
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn sign_out_clears_memory_even_when_store_fails() {
        struct FailingDelete(InMemorySessionStore);
        impl SessionStore for FailingDelete {
            fn read(&self, key: String) -> Result<Option<String>> {
                self.0.read(key)
            }
            fn write(&self, key: String, value: String) -> Result<()> {
                self.0.write(key, value)
            }
            fn delete(&self, _key: String) -> Result<()> {
                Err(Error::Storage {
                    error: "disk full".to_string(),
                })
            }
        }

        let manager =
            SessionManager::new(Arc::new(FailingDelete(InMemorySessionStore::default())));
        manager
            .sign_in("tok".to_string(), sample_seller())
            .await
            .unwrap();
        manager.sign_out().await;
        assert!(!manager.is_authenticated().await);
    }

    #[test_case(false, Area::Welcome => None; "signed out on welcome stays")]
    #[test_case(false, Area::Auth => None; "signed out may authenticate")]
    #[test_case(false, Area::App => Some(Redirect::Welcome); "signed out cannot enter app")]
    #[test_case(true, Area::Welcome => Some(Redirect::Home); "signed in skips welcome")]
    #[test_case(true, Area::Auth => Some(Redirect::Home); "signed in skips auth")]
    #[test_case(true, Area::App => None; "signed in uses app")]
    fn navigation_gate(authenticated: bool, area: Area) -> Option<Redirect> {
        tokio_test::block_on(async {
            let manager = manager();
            if authenticated {
                manager
                    .sign_in("tok".to_string(), sample_seller())
                    .await
                    .unwrap();
            }
            manager.gate(area).await
        })
    }
}
