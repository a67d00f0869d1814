use k8s_openapi::api::apps::v1::Deployment;
use kube::{core::ObjectMeta, Resource, ResourceExt};
use serde_json::Value;

use crate::{prelude::*, registry::ManagedKind};

/// A concrete object owned by a GenAI deployment. Every variant exposes the
/// same capabilities (identity, specification subtree, annotations) so that
/// the reconciler can treat them uniformly.
#[derive(Clone, Debug, PartialEq)]
pub enum ManagedResource {
	/// The KubeRay cluster.
	RayCluster(RayCluster),
	/// The SAIS service deployment.
	SaisService(Deployment),
	/// The vector database deployment.
	VectorDbService(Deployment),
}

impl ManagedResource {
	/// The kind of this resource.
	pub fn kind(&self) -> ManagedKind {
		match self {
			ManagedResource::RayCluster(_) => ManagedKind::RayCluster,
			ManagedResource::SaisService(_) => ManagedKind::SaisService,
			ManagedResource::VectorDbService(_) => ManagedKind::VectorDbService,
		}
	}

	/// Metadata of the underlying object.
	pub fn meta(&self) -> &ObjectMeta {
		match self {
			ManagedResource::RayCluster(cluster) => cluster.meta(),
			ManagedResource::SaisService(deployment) |
			ManagedResource::VectorDbService(deployment) => deployment.meta(),
		}
	}

	/// Mutable metadata of the underlying object.
	pub fn meta_mut(&mut self) -> &mut ObjectMeta {
		match self {
			ManagedResource::RayCluster(cluster) => cluster.meta_mut(),
			ManagedResource::SaisService(deployment) |
			ManagedResource::VectorDbService(deployment) => deployment.meta_mut(),
		}
	}

	/// Name of the underlying object.
	pub fn name(&self) -> String {
		match self {
			ManagedResource::RayCluster(cluster) => cluster.name_any(),
			ManagedResource::SaisService(deployment) |
			ManagedResource::VectorDbService(deployment) => deployment.name_any(),
		}
	}

	/// Namespace of the underlying object.
	pub fn namespace(&self) -> Option<String> {
		self.meta().namespace.clone()
	}

	/// Value of the annotation `key`, if set.
	pub fn annotation(&self, key: &str) -> Option<&str> {
		self.meta()
			.annotations
			.as_ref()
			.and_then(|annotations| annotations.get(key))
			.map(String::as_str)
	}

	/// Sets the annotation `key` to `value`.
	pub fn set_annotation(&mut self, key: &str, value: String) {
		self.meta_mut()
			.annotations
			.get_or_insert_with(Default::default)
			.insert(key.to_string(), value);
	}

	/// The specification subtree as JSON. Identity, ownership and status are
	/// not part of it.
	pub fn spec_value(&self) -> Result<Value, serde_json::Error> {
		match self {
			ManagedResource::RayCluster(cluster) => serde_json::to_value(&cluster.spec),
			ManagedResource::SaisService(deployment) |
			ManagedResource::VectorDbService(deployment) => serde_json::to_value(&deployment.spec),
		}
	}

	/// Replaces the specification subtree (and the recorded spec hash) with
	/// the one from `desired`. Name, namespace, owner references and the
	/// resource version of `self` are left alone.
	pub fn adopt_spec(&mut self, desired: &ManagedResource) -> Result<(), AppError> {
		match (&mut *self, desired) {
			(ManagedResource::RayCluster(existing), ManagedResource::RayCluster(desired)) => {
				existing.spec = desired.spec.clone();
			}
			(ManagedResource::SaisService(existing), ManagedResource::SaisService(desired)) |
			(
				ManagedResource::VectorDbService(existing),
				ManagedResource::VectorDbService(desired),
			) => {
				existing.spec = desired.spec.clone();
			}
			(existing, desired) => {
				return Err(AppError::Construction(format!(
					"cannot merge a {} spec into a {}",
					desired.kind(),
					existing.kind()
				)));
			}
		}

		if let Some(hash) = desired.annotation(crate::diff::SPEC_HASH_ANNOTATION) {
			self.set_annotation(crate::diff::SPEC_HASH_ANNOTATION, hash.to_string());
		}

		Ok(())
	}
}
