//! Provisioning coordinator: provision, renew, deprovision.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use veilgate_db::{AccountStore, EndpointStore, MemoryStore};
use veilgate_engine::{
    EndpointRegistry, EngineConfig, EngineError, FailureCategory, NullMirror, Provisioner, Term,
};

use support::{account, base_url, endpoint, MockFactory};

struct Harness {
    store: Arc<MemoryStore>,
    factory: Arc<MockFactory>,
    provisioner: Provisioner,
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let factory = Arc::new(MockFactory::new());
    let registry = Arc::new(EndpointRegistry::new(
        Arc::clone(&store) as Arc<dyn EndpointStore>,
        Arc::clone(&factory) as Arc<dyn veilgate_panel::PanelClientFactory>,
    ));
    let provisioner = Provisioner::new(
        Arc::clone(&store) as Arc<dyn AccountStore>,
        registry,
        Arc::new(NullMirror),
        config,
    );
    Harness {
        store,
        factory,
        provisioner,
    }
}

#[tokio::test]
async fn provision_debits_and_commits_every_field() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    account(&h.store, 42, 500);

    let before = Utc::now();
    let result = h
        .provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap();

    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(row.balance, Decimal::from(500) - Decimal::from(150));
    assert!(row.is_active);
    assert!(row.trial_used);
    assert_eq!(row.endpoint_id, Some(e.id));
    assert_eq!(row.access_url.as_deref(), Some(result.access_url.as_str()));

    let start = row.subscription_start.unwrap();
    let end = row.subscription_end.unwrap();
    assert_eq!(end - start, Duration::days(30));
    assert!(start >= before && start <= Utc::now());
    assert_eq!(result.expires_at, end);

    let panel = h.factory.panel(&base_url("a"));
    assert_eq!(panel.calls(), vec![("create", "tg42".to_string())]);
    assert!(panel.has_record("tg42"));
}

#[tokio::test]
async fn trial_provision_keeps_trial_available() {
    let h = harness();
    endpoint(&h.store, "a", true);
    account(&h.store, 42, 500);

    h.provisioner
        .provision(42, Term::Days(14.0), true)
        .await
        .unwrap();

    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert!(!row.trial_used);
}

#[tokio::test]
async fn insufficient_funds_checked_before_any_remote_call() {
    let h = harness();
    endpoint(&h.store, "a", true);
    let before = account(&h.store, 42, 100);

    let err = h
        .provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap_err();
    match err {
        EngineError::InsufficientFunds { balance, required } => {
            assert_eq!(balance, Decimal::from(100));
            assert_eq!(required, Decimal::from(150));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    assert_eq!(h.factory.panel(&base_url("a")).call_count(), 0);
    assert_eq!(h.store.get_by_chat_id(42).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn remote_create_failure_leaves_account_untouched() {
    let h = harness();
    endpoint(&h.store, "a", true);
    let before = account(&h.store, 42, 500);
    h.factory
        .panel(&base_url("a"))
        .fail_create
        .store(true, Ordering::SeqCst);

    let err = h
        .provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::EndpointUnavailable);
    assert_eq!(h.store.get_by_chat_id(42).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn provision_requires_an_active_endpoint() {
    let h = harness();
    endpoint(&h.store, "a", false);
    account(&h.store, 42, 500);

    let err = h
        .provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoActiveEndpoint));
    assert_eq!(err.category(), FailureCategory::EndpointUnavailable);
}

#[tokio::test]
async fn provision_rejects_provisioned_account() {
    let h = harness();
    endpoint(&h.store, "a", true);
    account(&h.store, 42, 500);

    h.provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap();
    let err = h
        .provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyProvisioned { chat_id: 42 }));
}

#[tokio::test]
async fn renew_extends_from_remote_expiry_when_in_future() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    let remote_end = Utc::now() + Duration::days(10);
    let mut row = account(&h.store, 42, 0);
    row.endpoint_id = Some(e.id);
    row.access_url = Some("vless://tg42@old".into());
    row.is_active = true;
    AccountStore::update(&*h.store, &row).await.unwrap();
    h.factory
        .panel(&base_url("a"))
        .seed_record("tg42", Some(remote_end));

    let result = h.provisioner.renew(42, Term::Days(30.0)).await.unwrap();
    assert_eq!(result.expires_at, remote_end + Duration::days(30));

    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(row.subscription_end, Some(result.expires_at));
    // Renewal never touches the balance.
    assert_eq!(row.balance, Decimal::ZERO);
}

#[tokio::test]
async fn renew_anchors_at_now_when_remote_already_expired() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    let mut row = account(&h.store, 42, 0);
    row.endpoint_id = Some(e.id);
    row.access_url = Some("vless://tg42@old".into());
    AccountStore::update(&*h.store, &row).await.unwrap();
    h.factory
        .panel(&base_url("a"))
        .seed_record("tg42", Some(Utc::now() - Duration::days(5)));

    let before = Utc::now();
    let result = h.provisioner.renew(42, Term::Days(30.0)).await.unwrap();
    assert!(result.expires_at >= before + Duration::days(30));
    assert!(result.expires_at <= Utc::now() + Duration::days(30));
}

#[tokio::test]
async fn renew_rolls_back_exactly_on_remote_failure() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    let mut row = account(&h.store, 42, 75);
    row.endpoint_id = Some(e.id);
    row.access_url = Some("vless://tg42@old".into());
    row.is_active = true;
    row.subscription_end = Some(Utc::now() + Duration::days(3));
    AccountStore::update(&*h.store, &row).await.unwrap();
    let before = h.store.get_by_chat_id(42).await.unwrap().unwrap();

    let panel = h.factory.panel(&base_url("a"));
    panel.seed_record("tg42", Some(Utc::now() + Duration::days(3)));
    panel.fail_update.store(true, Ordering::SeqCst);

    let err = h.provisioner.renew(42, Term::Days(30.0)).await.unwrap_err();
    assert_eq!(err.category(), FailureCategory::EndpointUnavailable);
    assert_eq!(h.store.get_by_chat_id(42).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn renew_recreates_after_remote_drift() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    let mut row = account(&h.store, 42, 0);
    row.endpoint_id = Some(e.id);
    row.access_url = Some("vless://tg42@stale".into());
    AccountStore::update(&*h.store, &row).await.unwrap();
    // No seeded record: the endpoint lost it.

    let result = h.provisioner.renew(42, Term::Days(30.0)).await.unwrap();

    let panel = h.factory.panel(&base_url("a"));
    assert_eq!(
        panel.calls(),
        vec![("read", "tg42".to_string()), ("create", "tg42".to_string())]
    );
    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(row.access_url.as_deref(), Some(result.access_url.as_str()));
    assert_ne!(row.access_url.as_deref(), Some("vless://tg42@stale"));
    assert!(row.is_active);
}

#[tokio::test]
async fn renew_of_unprovisioned_account_creates_without_debit() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    account(&h.store, 42, 75);

    let result = h.provisioner.renew(42, Term::Days(30.0)).await.unwrap();

    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(row.balance, Decimal::from(75));
    assert_eq!(row.endpoint_id, Some(e.id));
    assert_eq!(row.access_url.as_deref(), Some(result.access_url.as_str()));
    assert!(row.is_active);
}

#[tokio::test]
async fn renew_until_sets_exact_expiry() {
    let h = harness();
    let e = endpoint(&h.store, "a", true);
    let mut row = account(&h.store, 42, 0);
    row.endpoint_id = Some(e.id);
    row.access_url = Some("vless://tg42@old".into());
    AccountStore::update(&*h.store, &row).await.unwrap();
    h.factory
        .panel(&base_url("a"))
        .seed_record("tg42", Some(Utc::now() + Duration::days(400)));

    let target = Utc::now() + Duration::days(7);
    let result = h.provisioner.renew(42, Term::Until(target)).await.unwrap();
    assert_eq!(result.expires_at, target);
}

#[tokio::test]
async fn deprovision_on_known_endpoint() {
    let h = harness();
    endpoint(&h.store, "a", true);
    endpoint(&h.store, "b", true);
    account(&h.store, 42, 500);
    h.provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap();

    let confirmed = h.provisioner.deprovision(42).await.unwrap();
    assert!(confirmed);

    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert!(row.access_url.is_none());
    assert!(row.endpoint_id.is_none());
    assert!(!row.is_active);
    // Only the assigned endpoint was contacted.
    assert_eq!(h.factory.panel(&base_url("b")).call_count(), 0);
}

#[tokio::test]
async fn deprovision_without_endpoint_hint_sweeps_all_active() {
    let h = harness();
    endpoint(&h.store, "a", true);
    endpoint(&h.store, "b", true);
    endpoint(&h.store, "c", false);
    let mut row = account(&h.store, 42, 0);
    row.access_url = Some("vless://tg42@somewhere".into());
    AccountStore::update(&*h.store, &row).await.unwrap();
    h.factory.panel(&base_url("b")).seed_record("tg42", None);

    let confirmed = h.provisioner.deprovision(42).await.unwrap();
    assert!(confirmed);
    assert_eq!(
        h.factory.panel(&base_url("a")).calls(),
        vec![("delete", "tg42".to_string())]
    );
    assert_eq!(
        h.factory.panel(&base_url("b")).calls(),
        vec![("delete", "tg42".to_string())]
    );
    assert_eq!(h.factory.panel(&base_url("c")).call_count(), 0);
    assert!(!h.factory.panel(&base_url("b")).has_record("tg42"));
}

#[tokio::test]
async fn deprovision_clears_local_state_even_when_remote_fails() {
    let h = harness();
    endpoint(&h.store, "a", true);
    account(&h.store, 42, 500);
    h.provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap();
    h.factory
        .panel(&base_url("a"))
        .fail_delete
        .store(true, Ordering::SeqCst);

    let confirmed = h.provisioner.deprovision(42).await.unwrap();
    assert!(!confirmed);

    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert!(row.access_url.is_none());
    assert!(row.endpoint_id.is_none());
    assert!(!row.is_active);
}

#[tokio::test]
async fn unknown_account_reports_not_found() {
    let h = harness();
    endpoint(&h.store, "a", true);

    let err = h
        .provisioner
        .provision(7, Term::Days(30.0), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountNotFound(7)));
    assert_eq!(err.category(), FailureCategory::NotFound);
}

#[tokio::test]
async fn configured_price_is_the_one_debited() {
    let h = harness_with(EngineConfig {
        price: Decimal::from(99),
        ..EngineConfig::default()
    });
    endpoint(&h.store, "a", true);
    account(&h.store, 42, 149);

    h.provisioner
        .provision(42, Term::Days(30.0), false)
        .await
        .unwrap();
    let row = h.store.get_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(row.balance, Decimal::from(50));
}
