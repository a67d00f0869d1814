use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{prelude::*, registry::ManagedKind, resource::ManagedResource};

/// The state store backed by the Kubernetes API server.
mod kubernetes;
/// An in-memory state store recording every call, used by the tests.
#[cfg(test)]
pub mod memory;

pub use self::kubernetes::KubeStore;

/// Errors reported by a [`StateStore`]. A missing object is not an error:
/// lookups return `Ok(None)` instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
	/// An object with the same name already exists.
	#[error("the object already exists")]
	AlreadyExists,
	/// The object was modified since it was read.
	#[error("the object has been modified since it was read")]
	Conflict,
	/// Anything else: transport failures, server errors, rejected requests.
	#[error("{0}")]
	Backend(String),
}

/// Read / write access to the objects the controller works with. All calls
/// are scoped to a single namespace.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
	/// Get a GenAI deployment descriptor, `None` if it does not exist.
	async fn get_descriptor(
		&self,
		namespace: &str,
		name: &str,
	) -> Result<Option<GenAIDeployment>, StoreError>;

	/// Write the status sub-resource of a descriptor. The spec is never
	/// written.
	async fn update_descriptor_status(&self, descriptor: &GenAIDeployment)
		-> Result<(), StoreError>;

	/// Get a managed resource, `None` if it does not exist.
	async fn get(
		&self,
		kind: ManagedKind,
		namespace: &str,
		name: &str,
	) -> Result<Option<ManagedResource>, StoreError>;

	/// Create a managed resource. Fails with [`StoreError::AlreadyExists`] if
	/// the name is taken.
	async fn create(&self, resource: &ManagedResource) -> Result<(), StoreError>;

	/// Replace a managed resource. Fails with [`StoreError::Conflict`] if the
	/// resource version of `resource` is no longer the latest.
	async fn update(&self, resource: &ManagedResource) -> Result<(), StoreError>;
}
