//! Cluster Resource Store Client
//!
//! Typed access to the objects the instance controller reads and creates:
//! the `IntermineInstance` itself and its dependent Deployment, Service and
//! Ingress.
//!
//! # Example
//!
//! ```no_run
//! use store_client::{KubeStore, ObjectKey, ResourceKind, ResourceStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = KubeStore::new(kube::Client::try_default().await?);
//!
//! let key = ObjectKey::new("demo", "app1-deployment");
//! match store.get(ResourceKind::Deployment, &key).await {
//!     Ok(found) => println!("found {}", found.describe()),
//!     Err(e) if e.is_not_found() => println!("{} is missing", key),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{KubeStore, FIELD_MANAGER};
pub use error::StoreError;
pub use models::*;
pub use store_trait::ResourceStore;
#[cfg(feature = "test-util")]
pub use mock::{InjectedFailure, MockResourceStore, StoreCall};
