use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::construct::Entity;
use crate::datatype::Value;
use crate::error::{GdstoreError, Result};
use crate::http::HttpTransport;
use crate::interface::{TransactionId, Transport};
use crate::persist::{build_remove, build_save, translate_batch, MutationKind};
use crate::query::{build_query, QuerySpec, ALL};
use crate::wire::{BeginTransactionRequest, Key, RunQueryRequest};

pub const STORE_NAME: &str = "google-data-store";

/// The CRUD surface over one datastore connection.
///
/// Reads go straight to a query. Writes open a transaction and commit a single
/// mutation in it; a failed commit is returned as is and nothing is rolled back.
pub struct Store {
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl Store {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        info!(store = STORE_NAME, transport = transport.name(), "store opened");
        Self { transport: Mutex::new(Some(transport)) }
    }

    /// Checks the configuration and authorises an HTTP connection to the dataset.
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let transport = HttpTransport::authorise(config).await.inspect_err(|e| {
            error!(error = %e, dataset = %config.dataset_id, "store initialisation failed");
        })?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn name(&self) -> &'static str {
        STORE_NAME
    }

    /// The underlying connection, for calls this store does not cover.
    pub fn native(&self) -> Result<Arc<dyn Transport>> {
        self.transport.lock()?.clone().ok_or(GdstoreError::Closed)
    }

    pub fn close(&self) -> Result<()> {
        if let Some(transport) = self.transport.lock()?.take() {
            info!(store = STORE_NAME, transport = transport.name(), "store closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.transport.lock().map(|t| t.is_none()).unwrap_or(true)
    }

    async fn begin(&self, transport: &dyn Transport) -> Result<TransactionId> {
        transport
            .begin_transaction(BeginTransactionRequest::default())
            .await
            .inspect_err(|e| error!(error = %e, "could not begin transaction"))
    }

    // ------------- Writes -------------
    /// Persists `entity` and returns it carrying its identifier. The explicit
    /// `id$` identifier, if any, is consumed.
    pub async fn save(&self, mut entity: Entity) -> Result<Entity> {
        let transport = self.native()?;
        let kind = entity.kind();
        let transaction = self.begin(transport.as_ref()).await?;
        let mutation = MutationKind::of(&entity);
        let request = build_save(&entity, &kind, &transaction);
        let explicit_id = entity.take_explicit_id();
        let response = transport
            .commit(request)
            .await
            .inspect_err(|e| error!(error = %e, kind = %kind, "save failed"))?;
        match mutation {
            MutationKind::InsertAutoId => {
                let id = response
                    .mutation_result
                    .insert_auto_id_keys
                    .first()
                    .and_then(|key| key.path.first())
                    .and_then(|element| element.identifier())
                    .ok_or_else(|| {
                        GdstoreError::Invariant(format!("commit for {} returned no assigned key", kind))
                    })?;
                entity.set_id(Some(id));
            }
            MutationKind::Insert => entity.set_id(explicit_id),
            MutationKind::Update => {}
        }
        debug!(kind = %kind, id = ?entity.id(), mutation = ?mutation, "saved");
        Ok(entity)
    }

    /// Removes the first match of `spec`, or every match when `all$` is set.
    /// Returns the keys that were deleted.
    pub async fn remove(&self, template: &Entity, spec: QuerySpec) -> Result<Vec<Key>> {
        let transport = self.native()?;
        let kind = template.kind();
        let limit = if matches!(spec.get(ALL), Some(Value::Boolean(true))) {
            None
        } else {
            Some(1)
        };
        let (query, _) = build_query(&kind, spec, limit)?;
        let response = transport
            .run_query(RunQueryRequest::new(query))
            .await
            .inspect_err(|e| error!(error = %e, kind = %kind, "remove query failed"))?;
        let keys: Vec<Key> = response
            .batch
            .entity_results
            .into_iter()
            .map(|result| result.entity.key)
            .collect();
        if keys.is_empty() {
            debug!(kind = %kind, "nothing to remove");
            return Ok(keys);
        }
        let transaction = self.begin(transport.as_ref()).await?;
        transport
            .commit(build_remove(&transaction, keys.clone()))
            .await
            .inspect_err(|e| error!(error = %e, kind = %kind, "remove failed"))?;
        debug!(kind = %kind, count = keys.len(), "removed");
        Ok(keys)
    }

    // ------------- Reads -------------
    async fn query(&self, template: &Entity, spec: QuerySpec, limit: Option<i32>) -> Result<Vec<Entity>> {
        let transport = self.native()?;
        let kind = template.kind();
        let (query, _) = build_query(&kind, spec, limit)?;
        let response = transport
            .run_query(RunQueryRequest::new(query))
            .await
            .inspect_err(|e| error!(error = %e, kind = %kind, "query failed"))?;
        Ok(translate_batch(template, &response.batch.entity_results))
    }

    /// The first entity matching `spec`, if any.
    pub async fn load(&self, template: &Entity, spec: QuerySpec) -> Result<Option<Entity>> {
        let found = self.query(template, spec, Some(1)).await?.into_iter().next();
        if found.is_none() {
            debug!(kind = %template.kind(), "no entity loaded");
        }
        Ok(found)
    }

    pub async fn list(&self, template: &Entity, spec: QuerySpec) -> Result<Vec<Entity>> {
        self.query(template, spec, None).await
    }
}
