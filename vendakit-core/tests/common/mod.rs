#![allow(dead_code)]

//! Common test utilities shared across integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use vendakit_core::{
    CapturedPhoto, ClientForm, Error, SaleForm, SaleKind, SessionManager, SessionStore,
    TimeSource, User,
};

/// Session store living in process memory.
#[derive(Default)]
pub struct InMemorySessionStore {
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

/// Clock whose reading the test sets by hand.
pub struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub fn sample_seller() -> User {
    User {
        id: 7,
        nome: "João Vendedor".to_string(),
        email: "joao@agrovendas.com".to_string(),
        tipo: "vendedor".to_string(),
    }
}

pub fn sample_photo() -> CapturedPhoto {
    CapturedPhoto::from_file_name("documento.jpg".to_string(), vec![0xFF, 0xD8, 0xFF, 0xE0])
}

pub async fn unauthenticated_session() -> Arc<SessionManager> {
    let manager = Arc::new(SessionManager::new(Arc::new(
        InMemorySessionStore::default(),
    )));
    manager.restore().await;
    manager
}

pub async fn authed_session() -> Arc<SessionManager> {
    let manager = unauthenticated_session().await;
    manager
        .sign_in("test-token".to_string(), sample_seller())
        .await
        .unwrap();
    manager
}

pub fn client_form() -> ClientForm {
    ClientForm {
        nome: "Maria da Silva".to_string(),
        documento: "111.444.777-35".to_string(),
        telefone: "(11) 98765-4321".to_string(),
        endereco: "Sítio Boa Vista, km 12".to_string(),
        foto: Some(sample_photo()),
    }
}

pub fn sale_form(cliente_id: i64) -> SaleForm {
    SaleForm {
        cliente_id: Some(cliente_id),
        cliente_nome: "Maria da Silva".to_string(),
        cliente_telefone: "(11) 98765-4321".to_string(),
        tipo: SaleKind::Parcelado,
        valor: "1.500,00".to_string(),
        parcelas: "3".to_string(),
        data_vencimento: "15/03/2026".to_string(),
        descricao: "adubo e sementes".to_string(),
        numero_ficha: "F-0812".to_string(),
        foto: Some(sample_photo()),
    }
}
