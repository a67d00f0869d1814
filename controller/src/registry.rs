use std::fmt::{Display, Formatter};

use crate::prelude::*;

/// The fixed set of resource kinds a GenAI deployment manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedKind {
	/// The KubeRay `RayCluster`.
	RayCluster,
	/// The SAIS service `Deployment`.
	SaisService,
	/// The vector database `Deployment`.
	VectorDbService,
}

impl Display for ManagedKind {
	fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		write!(
			formatter,
			"{}",
			match self {
				ManagedKind::RayCluster => "RayCluster",
				ManagedKind::SaisService => "SaisService",
				ManagedKind::VectorDbService => "VectorDbService",
			}
		)
	}
}

/// Everything the controller needs to know about a managed kind without
/// looking at an instance of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindInfo {
	/// The kind this entry describes.
	pub kind: ManagedKind,
	/// API version of the underlying Kubernetes object.
	pub api_version: &'static str,
	/// Kind of the underlying Kubernetes object.
	pub object_kind: &'static str,
	/// Appended to the descriptor name to get the name of the managed object.
	pub suffix: &'static str,
}

/// Registry of all managed kinds. Built once when the process starts and
/// handed to the reconciler, so there is no ambient type registry anywhere.
#[derive(Clone, Debug)]
pub struct KindRegistry {
	/// One entry per managed kind.
	entries: Vec<KindInfo>,
}

impl KindRegistry {
	/// Builds the registry with the three kinds a GenAI deployment owns.
	pub fn new() -> Self {
		Self {
			entries: vec![
				KindInfo {
					kind: ManagedKind::RayCluster,
					api_version: "ray.io/v1",
					object_kind: "RayCluster",
					suffix: "raycluster",
				},
				KindInfo {
					kind: ManagedKind::SaisService,
					api_version: "apps/v1",
					object_kind: "Deployment",
					suffix: "sais-service",
				},
				KindInfo {
					kind: ManagedKind::VectorDbService,
					api_version: "apps/v1",
					object_kind: "Deployment",
					suffix: "vectordb-service",
				},
			],
		}
	}

	/// What the registry knows about `kind`.
	pub fn info(&self, kind: ManagedKind) -> Option<&KindInfo> {
		self.entries.iter().find(|info| info.kind == kind)
	}

	/// The name of the `kind` object owned by the descriptor called `parent`.
	pub fn derived_name(&self, kind: ManagedKind, parent: &str) -> Result<String, AppError> {
		self.info(kind)
			.map(|info| format!("{}-{}", parent, info.suffix))
			.ok_or_else(|| AppError::Construction(format!("kind `{}` is not registered", kind)))
	}

	/// Every registered kind, in registration order.
	pub fn kinds(&self) -> impl Iterator<Item = ManagedKind> + '_ {
		self.entries.iter().map(|info| info.kind)
	}
}

impl Default for KindRegistry {
	fn default() -> Self {
		Self::new()
	}
}
