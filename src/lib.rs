//! gdstore – a Google Cloud Datastore adapter for an entity persistence framework.
//!
//! The framework speaks in host entities and generic query specs; the datastore
//! speaks JSON over its `v1beta2` API. This crate translates between the two:
//! * [`datatype`] – host values ([`datatype::Value`]), the tagged wire values and
//!   the codec between them.
//! * [`construct`] – host entities, their canon (`zone/base/name`), the datastore
//!   kind derived from it, and key paths built from identifiers.
//! * [`query`] – query specs with their `$` control fields and the datastore
//!   queries built from them.
//! * [`persist`] – property maps, commit requests for save and remove, and the
//!   translation of query results back into host entities.
//! * [`interface`] – the [`interface::Transport`] trait for the outbound calls,
//!   implemented over HTTPS by [`http::HttpTransport`] and in process by
//!   [`memory::MemoryTransport`].
//! * [`auth`] – service account assertions and the access tokens they buy.
//! * [`store`] – the [`store::Store`] facade with `save`, `load`, `list`,
//!   `remove` and `close`.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use gdstore::{Canon, Entity, MemoryTransport, QuerySpec, Store};
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Store::new(Arc::new(MemoryTransport::new()));
//! let template = Entity::new("shop/product".parse().unwrap());
//! let mut apple = template.make([("name", "apple".into())]);
//! apple.set("price", 1.5);
//! let saved = store.save(apple).await.unwrap();
//! let loaded = store
//!     .load(&template, QuerySpec::new().with("id", saved.id().unwrap()))
//!     .await
//!     .unwrap();
//! assert_eq!(loaded, Some(saved));
//! # });
//! ```

pub mod auth;
pub mod config;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod http;
pub mod interface;
pub mod memory;
pub mod persist;
pub mod query;
pub mod store;
pub mod wire;

pub use config::StoreConfig;
pub use construct::{Canon, Entity, Identifier};
pub use datatype::{Value, WireValue};
pub use error::{GdstoreError, Result};
pub use http::HttpTransport;
pub use interface::Transport;
pub use memory::MemoryTransport;
pub use query::QuerySpec;
pub use store::Store;

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`). Calling it
/// again, or after another subscriber was installed, does nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
