//! The outbound side: the datastore calls the store relies on.
//!
//! Each call is a single request/response round trip. Implementations do not
//! retry, and nothing in this crate rolls a transaction back; a transaction
//! handle is an opaque ticket passed from `begin_transaction` to `commit`.

use async_trait::async_trait;

use crate::error::Result;
use crate::wire::{
    BeginTransactionRequest, CommitRequest, CommitResponse, LookupRequest, LookupResponse,
    RunQueryRequest, RunQueryResponse,
};

/// Opaque transaction handle.
pub type TransactionId = String;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    async fn begin_transaction(&self, request: BeginTransactionRequest) -> Result<TransactionId>;
    async fn commit(&self, request: CommitRequest) -> Result<CommitResponse>;
    async fn run_query(&self, request: RunQueryRequest) -> Result<RunQueryResponse>;
    /// Fetches entities by key. The store reads through queries instead.
    async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse>;
}
