use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
	api::{Patch, PatchParams, PostParams},
	error::ErrorResponse,
	Api,
	Client,
	Error,
	Resource,
	ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use super::{StateStore, StoreError};
use crate::{prelude::*, registry::ManagedKind, resource::ManagedResource};

/// [`StateStore`] talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
	/// The client all requests are made with.
	client: Client,
}

impl KubeStore {
	/// Creates a store talking through `client`.
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// An API handle for `K` in `namespace`.
	fn api<K>(&self, namespace: &str) -> Api<K>
	where
		K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
	{
		Api::namespaced(self.client.clone(), namespace)
	}
}

impl From<Error> for StoreError {
	fn from(err: Error) -> Self {
		match err {
			Error::Api(ErrorResponse { code: 409, reason, .. }) if reason == "AlreadyExists" => {
				StoreError::AlreadyExists
			}
			Error::Api(ErrorResponse { code: 409, .. }) => StoreError::Conflict,
			err => StoreError::Backend(err.to_string()),
		}
	}
}

/// Namespace of an object that is about to be written.
fn namespace_of<K>(object: &K) -> Result<String, StoreError>
where
	K: Resource,
{
	object.namespace().ok_or_else(|| {
		StoreError::Backend(format!(
			"object `{}` does not have a namespace",
			object.name_any()
		))
	})
}

/// The merge patch writing the status of `descriptor`. Every status field is
/// present, with `null` or `[]` when empty, so nothing stale is left behind.
fn status_patch(descriptor: &GenAIDeployment) -> Value {
	json!({ "status": descriptor.status.clone().unwrap_or_default() })
}

/// Creates `object` through `api`.
async fn create_object<K>(api: Api<K>, object: &K) -> Result<(), StoreError>
where
	K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
	api.create(&PostParams::default(), object).await?;
	Ok(())
}

/// Replaces `object` through `api`. The resource version of `object` has to
/// be the latest one.
async fn replace_object<K>(api: Api<K>, object: &K) -> Result<(), StoreError>
where
	K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
	api.replace(&object.name_any(), &PostParams::default(), object)
		.await?;
	Ok(())
}

#[async_trait]
impl StateStore for KubeStore {
	async fn get_descriptor(
		&self,
		namespace: &str,
		name: &str,
	) -> Result<Option<GenAIDeployment>, StoreError> {
		Ok(self
			.api::<GenAIDeployment>(namespace)
			.get_opt(name)
			.await?)
	}

	async fn update_descriptor_status(
		&self,
		descriptor: &GenAIDeployment,
	) -> Result<(), StoreError> {
		let namespace = namespace_of(descriptor)?;
		trace!(
			"Patching status of GenAIDeployment {}/{}",
			namespace,
			descriptor.name_any()
		);

		self.api::<GenAIDeployment>(&namespace)
			.patch_status(
				&descriptor.name_any(),
				&PatchParams::default(),
				&Patch::Merge(status_patch(descriptor)),
			)
			.await?;
		Ok(())
	}

	async fn get(
		&self,
		kind: ManagedKind,
		namespace: &str,
		name: &str,
	) -> Result<Option<ManagedResource>, StoreError> {
		Ok(match kind {
			ManagedKind::RayCluster => self
				.api::<RayCluster>(namespace)
				.get_opt(name)
				.await?
				.map(ManagedResource::RayCluster),
			ManagedKind::SaisService => self
				.api::<Deployment>(namespace)
				.get_opt(name)
				.await?
				.map(ManagedResource::SaisService),
			ManagedKind::VectorDbService => self
				.api::<Deployment>(namespace)
				.get_opt(name)
				.await?
				.map(ManagedResource::VectorDbService),
		})
	}

	async fn create(&self, resource: &ManagedResource) -> Result<(), StoreError> {
		match resource {
			ManagedResource::RayCluster(cluster) => {
				create_object(self.api(&namespace_of(cluster)?), cluster).await
			}
			ManagedResource::SaisService(deployment) |
			ManagedResource::VectorDbService(deployment) => {
				create_object(self.api(&namespace_of(deployment)?), deployment).await
			}
		}
	}

	async fn update(&self, resource: &ManagedResource) -> Result<(), StoreError> {
		match resource {
			ManagedResource::RayCluster(cluster) => {
				replace_object(self.api(&namespace_of(cluster)?), cluster).await
			}
			ManagedResource::SaisService(deployment) |
			ManagedResource::VectorDbService(deployment) => {
				replace_object(self.api(&namespace_of(deployment)?), deployment).await
			}
		}
	}
}
