//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{Client, User};
use crate::error::Error;
use crate::photo::CapturedPhoto;
use crate::session::{SessionManager, SessionStore};
use crate::time::TimeSource;

/// Session store living in process memory.
#[derive(Default)]
pub(crate) struct InMemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStore for InMemorySessionStore {
    fn read(&self, key: String) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().unwrap().get(&key).cloned())
    }

    fn write(&self, key: String, value: String) -> Result<(), Error> {
        self.entries.lock().unwrap().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: String) -> Result<(), Error> {
        self.entries.lock().unwrap().remove(&key);
        Ok(())
    }
}

/// Fresh unauthenticated manager over an in-memory store, taken through the
/// same restore step the app runs at startup.
pub(crate) async fn in_memory_session() -> Arc<SessionManager> {
    let manager = Arc::new(SessionManager::new(Arc::new(
        InMemorySessionStore::default(),
    )));
    manager.restore().await;
    manager
}

pub(crate) fn sample_seller() -> User {
    User {
        id: 7,
        nome: "João Vendedor".to_string(),
        email: "joao@agrovendas.com".to_string(),
        tipo: "vendedor".to_string(),
    }
}

pub(crate) fn sample_client() -> Client {
    Client {
        id: Some(3),
        nome: "Maria da Silva".to_string(),
        documento: Some("11144477735".to_string()),
        telefone: Some("11987654321".to_string()),
        endereco: Some("Sítio Boa Vista, km 12".to_string()),
        email: None,
    }
}

pub(crate) fn sample_photo() -> CapturedPhoto {
    CapturedPhoto::from_file_name("documento.jpg".to_string(), vec![0xFF, 0xD8, 0xFF, 0xE0])
}

/// Clock whose reading the test sets by hand.
pub(crate) struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    pub(crate) fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub(crate) fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
