//! Endpoint registry.
//!
//! Answers "which endpoint should a new or renewing account use" and
//! "give me a client for endpoint X", and owns the administrative
//! operations whose guarantees the rest of the system leans on: the
//! referential delete guard and the at-most-one preferred flag.

use std::sync::Arc;

use tracing::{info, instrument};

use veilgate_db::{Endpoint, EndpointOverview, EndpointStore, NewEndpoint};
use veilgate_panel::{PanelClient, PanelClientFactory, PanelConfig};

use crate::error::{EngineError, EngineResult};

pub struct EndpointRegistry {
    endpoints: Arc<dyn EndpointStore>,
    factory: Arc<dyn PanelClientFactory>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Arc<dyn EndpointStore>, factory: Arc<dyn PanelClientFactory>) -> Self {
        Self { endpoints, factory }
    }

    /// Pick the endpoint a new assignment should land on.
    ///
    /// If exactly one endpoint is both preferred and active, that one wins.
    /// Otherwise the least-assigned active endpoint is chosen, ties broken
    /// by lowest id — automatic load balancing that doubles as the
    /// fallback when no preferred endpoint is set. `Ok(None)` means zero
    /// active endpoints; callers treat that as fatal for provisioning,
    /// not retryable.
    pub async fn resolve_target(&self) -> EngineResult<Option<Endpoint>> {
        let active = self.endpoints.list_active().await?;
        if active.is_empty() {
            return Ok(None);
        }

        let mut preferred = active.iter().filter(|e| e.is_preferred);
        if let (Some(single), None) = (preferred.next(), preferred.next()) {
            return Ok(Some(single.clone()));
        }

        let mut best: Option<(Endpoint, i64)> = None;
        for endpoint in active {
            let assigned = self.endpoints.assigned_count(endpoint.id).await?;
            let replace = match &best {
                None => true,
                Some((current, count)) => {
                    assigned < *count || (assigned == *count && endpoint.id < current.id)
                }
            };
            if replace {
                best = Some((endpoint, assigned));
            }
        }
        Ok(best.map(|(endpoint, _)| endpoint))
    }

    /// Build a client for the given endpoint.
    pub fn client_for(&self, endpoint: &Endpoint) -> EngineResult<Box<dyn PanelClient>> {
        let config = PanelConfig::new(&endpoint.base_url, &endpoint.api_token);
        Ok(self.factory.client_for(&config)?)
    }

    /// Fetch an endpoint row, failing when it does not exist.
    pub async fn endpoint(&self, id: i64) -> EngineResult<Endpoint> {
        self.endpoints
            .get(id)
            .await?
            .ok_or(EngineError::EndpointNotFound(id))
    }

    /// All active endpoints, ordered by id.
    pub async fn active_endpoints(&self) -> EngineResult<Vec<Endpoint>> {
        Ok(self.endpoints.list_active().await?)
    }

    /// Register a new endpoint.
    #[instrument(skip(self, endpoint), fields(name = %endpoint.name))]
    pub async fn add_endpoint(&self, endpoint: NewEndpoint) -> EngineResult<Endpoint> {
        let endpoint = self.endpoints.insert(endpoint).await?;
        info!(endpoint_id = endpoint.id, "endpoint registered");
        Ok(endpoint)
    }

    /// Flip the activation flag.
    pub async fn set_active(&self, id: i64, active: bool) -> EngineResult<Endpoint> {
        let mut endpoint = self.endpoint(id).await?;
        endpoint.is_active = active;
        self.endpoints.update(&endpoint).await?;
        info!(endpoint_id = id, active, "endpoint activation changed");
        Ok(endpoint)
    }

    /// Make `id` the preferred endpoint. Clears the flag everywhere else
    /// first, so zero or one endpoints carry it at any time.
    pub async fn set_preferred(&self, id: i64) -> EngineResult<()> {
        if !self.endpoints.set_preferred(id).await? {
            return Err(EngineError::EndpointNotFound(id));
        }
        info!(endpoint_id = id, "preferred endpoint changed");
        Ok(())
    }

    /// Delete an endpoint. Refused while any account still references it;
    /// the check lives here, not in a storage constraint.
    #[instrument(skip(self))]
    pub async fn delete_endpoint(&self, id: i64) -> EngineResult<()> {
        let accounts = self.endpoints.assigned_count(id).await?;
        if accounts > 0 {
            return Err(EngineError::EndpointInUse {
                endpoint_id: id,
                accounts,
            });
        }
        if !self.endpoints.delete(id).await? {
            return Err(EngineError::EndpointNotFound(id));
        }
        info!(endpoint_id = id, "endpoint deleted");
        Ok(())
    }

    /// Per-endpoint totals for admin display.
    pub async fn overview(&self) -> EngineResult<Vec<EndpointOverview>> {
        let mut overviews = Vec::new();
        for endpoint in self.endpoints.list().await? {
            let assigned_accounts = self.endpoints.assigned_count(endpoint.id).await?;
            let provisioned_accounts = self.endpoints.provisioned_count(endpoint.id).await?;
            overviews.push(EndpointOverview {
                endpoint,
                assigned_accounts,
                provisioned_accounts,
            });
        }
        Ok(overviews)
    }
}
