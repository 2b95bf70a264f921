//! Shared fixtures: scripted panel clients, a recording notifier, and row
//! builders over the in-memory store.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use veilgate_db::{Account, Endpoint, MemoryStore};
use veilgate_engine::{AdminNotice, Notice, Notifier, NotifyError};
use veilgate_panel::{
    CredentialInfo, CredentialResult, CredentialStatus, PanelClient, PanelClientFactory,
    PanelConfig, PanelError, PanelResult,
};

/// One recorded panel call: operation name and handle.
pub type Call = (&'static str, String);

/// Scripted state for one endpoint's panel, shared between the factory and
/// every client it hands out.
#[derive(Default)]
pub struct PanelState {
    pub calls: Mutex<Vec<Call>>,
    pub records: Mutex<HashMap<String, CredentialInfo>>,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl PanelState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn has_record(&self, handle: &str) -> bool {
        self.records.lock().unwrap().contains_key(handle)
    }

    /// Seed a remote record, as if created out of band.
    pub fn seed_record(&self, handle: &str, expires_at: Option<DateTime<Utc>>) {
        self.records.lock().unwrap().insert(
            handle.to_string(),
            CredentialInfo {
                status: CredentialStatus::Active,
                expires_at,
                access_url: Some(format!("vless://{handle}@seeded")),
            },
        );
    }

    fn record(&self, op: &'static str, handle: &str) {
        self.calls.lock().unwrap().push((op, handle.to_string()));
    }
}

struct MockPanel {
    state: Arc<PanelState>,
    base_url: String,
}

#[async_trait]
impl PanelClient for MockPanel {
    async fn create_credential(
        &self,
        handle: &str,
        expires_at: DateTime<Utc>,
    ) -> PanelResult<CredentialResult> {
        self.state.record("create", handle);
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(PanelError::transport("connection refused"));
        }
        let access_url = format!("vless://{handle}@{}", self.base_url);
        self.state.records.lock().unwrap().insert(
            handle.to_string(),
            CredentialInfo {
                status: CredentialStatus::Active,
                expires_at: Some(expires_at),
                access_url: Some(access_url.clone()),
            },
        );
        Ok(CredentialResult { access_url })
    }

    async fn read_credential(&self, handle: &str) -> PanelResult<Option<CredentialInfo>> {
        self.state.record("read", handle);
        Ok(self.state.records.lock().unwrap().get(handle).cloned())
    }

    async fn update_credential(
        &self,
        handle: &str,
        status: CredentialStatus,
        expires_at: DateTime<Utc>,
    ) -> PanelResult<CredentialResult> {
        self.state.record("update", handle);
        if self.state.fail_update.load(Ordering::SeqCst) {
            return Err(PanelError::transport("connection reset"));
        }
        let access_url = format!("vless://{handle}@{}", self.base_url);
        self.state.records.lock().unwrap().insert(
            handle.to_string(),
            CredentialInfo {
                status,
                expires_at: Some(expires_at),
                access_url: Some(access_url.clone()),
            },
        );
        Ok(CredentialResult { access_url })
    }

    async fn delete_credential(&self, handle: &str) -> PanelResult<()> {
        self.state.record("delete", handle);
        if self.state.fail_delete.load(Ordering::SeqCst) {
            return Err(PanelError::transport("connection refused"));
        }
        self.state.records.lock().unwrap().remove(handle);
        Ok(())
    }
}

/// Factory handing out scripted clients, one [`PanelState`] per base URL.
#[derive(Default)]
pub struct MockFactory {
    panels: Mutex<HashMap<String, Arc<PanelState>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared state for `base_url`, created on first use.
    pub fn panel(&self, base_url: &str) -> Arc<PanelState> {
        Arc::clone(
            self.panels
                .lock()
                .unwrap()
                .entry(base_url.to_string())
                .or_default(),
        )
    }
}

impl PanelClientFactory for MockFactory {
    fn client_for(&self, config: &PanelConfig) -> PanelResult<Box<dyn PanelClient>> {
        Ok(Box::new(MockPanel {
            state: self.panel(&config.base_url),
            base_url: config.base_url.clone(),
        }))
    }
}

/// Notifier capturing every notice for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub account_notices: Mutex<Vec<(i64, Notice)>>,
    pub admin_notices: Mutex<Vec<AdminNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_account(&self, chat_id: i64) -> Vec<Notice> {
        self.account_notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    pub fn admin(&self) -> Vec<AdminNotice> {
        self.admin_notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_account(&self, chat_id: i64, notice: Notice) -> Result<(), NotifyError> {
        self.account_notices.lock().unwrap().push((chat_id, notice));
        Ok(())
    }

    async fn notify_admins(&self, notice: AdminNotice) -> Result<(), NotifyError> {
        self.admin_notices.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Base URL the fixtures derive for an endpoint name.
pub fn base_url(name: &str) -> String {
    format!("https://{name}.example.com")
}

/// Insert an endpoint row named `name` with a derived base URL.
pub fn endpoint(store: &MemoryStore, name: &str, active: bool) -> Endpoint {
    store.insert_endpoint(Endpoint {
        id: 0,
        name: name.to_string(),
        base_url: base_url(name),
        api_token: "token".to_string(),
        description: None,
        is_active: active,
        is_preferred: false,
        created_at: Utc::now(),
    })
}

/// Insert an account row with the given balance and no subscription.
pub fn account(store: &MemoryStore, chat_id: i64, balance: i64) -> Account {
    store.insert_account(Account {
        id: 0,
        chat_id,
        username: None,
        balance: Decimal::from(balance),
        created_at: Utc::now(),
        subscription_start: None,
        subscription_end: None,
        is_active: false,
        trial_used: false,
        endpoint_id: None,
        access_url: None,
    })
}
