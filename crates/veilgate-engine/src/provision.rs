//! Provisioning coordinator.
//!
//! The create/renew/delete state machine for one account's credential,
//! bridging the local account row and one endpoint's remote state.
//!
//! Conceptually an account is `UNPROVISIONED` (no endpoint, no handle),
//! `PROVISIONED` (endpoint and handle set, remote record exists) or
//! `DRIFTED` (handle set locally but the endpoint lost the record, e.g.
//! after a reset). Drift during renewal is self-healed by recreating the
//! credential rather than surfaced as an error.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, instrument, warn};

use veilgate_db::{Account, AccountStore};
use veilgate_panel::CredentialStatus;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::notify::ChangeMirror;
use crate::registry::EndpointRegistry;

/// Subscription term for a provision or renewal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Term {
    /// Extend by this many days. Fractional values (a half-month trial
    /// bonus, say) are converted to a second-level delta before any
    /// arithmetic, never truncated to whole days.
    Days(f64),
    /// Explicit target expiry.
    Until(DateTime<Utc>),
}

impl Term {
    /// Convert a day count to an exact duration.
    #[must_use]
    pub fn duration_from_days(days: f64) -> Duration {
        Duration::seconds((days * 86_400.0).round() as i64)
    }

    /// Absolute expiry this term yields when anchored at `base`.
    #[must_use]
    pub fn expiry_from(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Term::Days(days) => base + Self::duration_from_days(*days),
            Term::Until(target) => *target,
        }
    }
}

/// Outcome of a successful provision or renewal.
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    /// The connection string the subscriber uses.
    pub access_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Coordinates one account's credential across the local store and the
/// remote endpoints.
pub struct Provisioner {
    accounts: Arc<dyn AccountStore>,
    registry: Arc<EndpointRegistry>,
    mirror: Arc<dyn ChangeMirror>,
    config: EngineConfig,
}

impl Provisioner {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        registry: Arc<EndpointRegistry>,
        mirror: Arc<dyn ChangeMirror>,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            registry,
            mirror,
            config,
        }
    }

    /// First-time provisioning for an unprovisioned account.
    ///
    /// Checks funds before any remote call, creates the remote credential,
    /// then applies every local mutation (debit, subscription window,
    /// activity, endpoint reference, handle, trial flag) as one commit. On
    /// remote failure nothing local changes at all.
    #[instrument(skip(self), fields(chat_id))]
    pub async fn provision(
        &self,
        chat_id: i64,
        term: Term,
        trial: bool,
    ) -> EngineResult<Provisioned> {
        let mut account = self.account(chat_id).await?;
        if account.is_provisioned() {
            return Err(EngineError::AlreadyProvisioned { chat_id });
        }
        if account.balance < self.config.price {
            return Err(EngineError::InsufficientFunds {
                balance: account.balance,
                required: self.config.price,
            });
        }

        let endpoint = self
            .registry
            .resolve_target()
            .await?
            .ok_or(EngineError::NoActiveEndpoint)?;
        let client = self.registry.client_for(&endpoint)?;

        let now = Utc::now();
        let expires_at = term.expiry_from(now);
        let created = client.create_credential(&account.handle(), expires_at).await?;

        account.balance -= self.config.price;
        account.subscription_start = Some(now);
        account.subscription_end = Some(expires_at);
        account.is_active = true;
        account.endpoint_id = Some(endpoint.id);
        account.access_url = Some(created.access_url.clone());
        if !trial {
            account.trial_used = true;
        }
        self.accounts.update(&account).await?;
        self.mirror_change(&account).await;

        Ok(Provisioned {
            access_url: created.access_url,
            expires_at,
        })
    }

    /// Renew the account's subscription.
    ///
    /// If nothing is provisioned yet this degrades to a fresh credential
    /// creation (billing happened upstream, so no debit here). If the
    /// remote record has drifted away it is recreated. Any remote failure
    /// rolls the account back to its entry snapshot, so a payment step
    /// that preceded this call never strands "money taken, service not
    /// delivered" state in the fields this coordinator owns.
    #[instrument(skip(self), fields(chat_id))]
    pub async fn renew(&self, chat_id: i64, term: Term) -> EngineResult<Provisioned> {
        let mut account = self.account(chat_id).await?;
        let snapshot = account.snapshot();

        match self.renew_inner(&mut account, term).await {
            Ok(provisioned) => {
                self.accounts.update(&account).await?;
                self.mirror_change(&account).await;
                Ok(provisioned)
            }
            Err(err) => {
                account.restore(&snapshot);
                if let Err(restore_err) = self.accounts.update(&account).await {
                    // Stored state still holds the pre-call values; only
                    // the success path persists.
                    error!(chat_id, error = %restore_err, "rollback write failed");
                }
                Err(err)
            }
        }
    }

    async fn renew_inner(&self, account: &mut Account, term: Term) -> EngineResult<Provisioned> {
        let now = Utc::now();

        let Some(endpoint_id) = account.endpoint_id.filter(|_| account.is_provisioned()) else {
            return self.create_fresh(account, term, now).await;
        };

        let endpoint = self.registry.endpoint(endpoint_id).await?;
        let client = self.registry.client_for(&endpoint)?;
        let handle = account.handle();

        let Some(remote) = client.read_credential(&handle).await? else {
            // Drift: the endpoint lost the record. Self-heal by recreating
            // on the same endpoint instead of failing.
            debug!(chat_id = account.chat_id, endpoint_id, "remote record missing, recreating");
            let expires_at = term.expiry_from(now);
            let created = client.create_credential(&handle, expires_at).await?;
            account.access_url = Some(created.access_url.clone());
            account.subscription_end = Some(expires_at);
            account.is_active = true;
            if account.subscription_start.is_none() {
                account.subscription_start = Some(now);
            }
            return Ok(Provisioned {
                access_url: created.access_url,
                expires_at,
            });
        };

        // An already-expired remote record anchors the extension at `now`;
        // no negative-length windows.
        let expires_at = match term {
            Term::Until(target) => target,
            Term::Days(days) => {
                let base = remote.expires_at.filter(|e| *e > now).unwrap_or(now);
                base + Term::duration_from_days(days)
            }
        };

        let updated = client
            .update_credential(&handle, CredentialStatus::Active, expires_at)
            .await?;

        account.access_url = Some(updated.access_url.clone());
        account.subscription_end = Some(expires_at);
        account.is_active = true;

        Ok(Provisioned {
            access_url: updated.access_url,
            expires_at,
        })
    }

    /// Shared creation path for renew-without-credential.
    async fn create_fresh(
        &self,
        account: &mut Account,
        term: Term,
        now: DateTime<Utc>,
    ) -> EngineResult<Provisioned> {
        let endpoint = self
            .registry
            .resolve_target()
            .await?
            .ok_or(EngineError::NoActiveEndpoint)?;
        let client = self.registry.client_for(&endpoint)?;

        let expires_at = term.expiry_from(now);
        let created = client.create_credential(&account.handle(), expires_at).await?;

        account.subscription_start = Some(now);
        account.subscription_end = Some(expires_at);
        account.is_active = true;
        account.endpoint_id = Some(endpoint.id);
        account.access_url = Some(created.access_url.clone());

        Ok(Provisioned {
            access_url: created.access_url,
            expires_at,
        })
    }

    /// Remove the account's remote credential and clear local provisioning
    /// state.
    ///
    /// When the assigned endpoint is unknown (bulk admin cleanup), deletion
    /// is attempted against every active endpoint; the call reports true
    /// if any endpoint confirmed. Local handle, endpoint reference and
    /// activity are cleared regardless — local state must not retain a
    /// handle provisioning can no longer act on.
    #[instrument(skip(self), fields(chat_id))]
    pub async fn deprovision(&self, chat_id: i64) -> EngineResult<bool> {
        let mut account = self.account(chat_id).await?;
        let handle = account.handle();

        let targets = match account.endpoint_id {
            Some(endpoint_id) => match self.registry.endpoint(endpoint_id).await {
                Ok(endpoint) => vec![endpoint],
                Err(EngineError::EndpointNotFound(_)) => self.registry.active_endpoints().await?,
                Err(err) => return Err(err),
            },
            None => self.registry.active_endpoints().await?,
        };

        let mut confirmed = false;
        for endpoint in &targets {
            let client = match self.registry.client_for(endpoint) {
                Ok(client) => client,
                Err(err) => {
                    warn!(endpoint_id = endpoint.id, error = %err, "skipping endpoint");
                    continue;
                }
            };
            match client.delete_credential(&handle).await {
                Ok(()) => confirmed = true,
                Err(err) => {
                    warn!(endpoint_id = endpoint.id, error = %err, "remote delete failed");
                }
            }
        }

        account.access_url = None;
        account.endpoint_id = None;
        account.is_active = false;
        self.accounts.update(&account).await?;
        self.mirror_change(&account).await;

        Ok(confirmed)
    }

    async fn account(&self, chat_id: i64) -> EngineResult<Account> {
        self.accounts
            .get_by_chat_id(chat_id)
            .await?
            .ok_or(EngineError::AccountNotFound(chat_id))
    }

    async fn mirror_change(&self, account: &Account) {
        if let Err(err) = self.mirror.account_changed(account).await {
            debug!(chat_id = account.chat_id, error = %err, "change mirror failed");
        }
    }
}
