use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use kube::ResourceExt;

use crate::{
	desired,
	diff,
	models::GenAIDeploymentStatus,
	ownership,
	prelude::*,
	registry::{KindRegistry, ManagedKind},
	resource::ManagedResource,
	status,
	store::{StateStore, StoreError},
};

/// The service deployments, in the order they are reconciled.
const SERVICE_KINDS: [ManagedKind; 2] = [ManagedKind::SaisService, ManagedKind::VectorDbService];

/// How a reconciliation pass ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
	/// The descriptor no longer exists. Its resources are left to the garbage
	/// collector.
	DescriptorAbsent,
	/// Every managed resource matches the descriptor.
	Converged,
}

/// Drives the resources owned by a GenAI deployment towards the state its
/// descriptor asks for.
pub struct Reconciler {
	/// Where descriptors and managed resources are read and written.
	store: Arc<dyn StateStore>,
	/// The managed kinds and how their objects are named.
	registry: Arc<KindRegistry>,
	/// How many lost update races are retried before giving up.
	conflict_retries: u32,
}

impl Reconciler {
	/// Creates a reconciler working against `store`.
	pub fn new(store: Arc<dyn StateStore>, registry: Arc<KindRegistry>, conflict_retries: u32) -> Self {
		Self {
			store,
			registry,
			conflict_retries,
		}
	}

	/// Runs one reconciliation pass for the descriptor `namespace/name`.
	///
	/// The first failing step aborts the pass. Steps that already went through
	/// are not rolled back, the next pass picks up from there. Running a pass
	/// again without anything having changed writes nothing.
	#[instrument(skip(self))]
	pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, AppError> {
		let Some(descriptor) = self.store.get_descriptor(namespace, name).await? else {
			debug!("GenAIDeployment {}/{} not found, nothing to do", namespace, name);
			return Ok(ReconcileOutcome::DescriptorAbsent);
		};

		let mut published = descriptor.status.clone();
		let mut status = published.clone().unwrap_or_default();

		let result = self
			.converge(&descriptor, &mut status, &mut published)
			.await;
		if let Err(err) = &result {
			error!(
				"Failed to reconcile GenAIDeployment {}/{}: {}",
				namespace, name, err
			);
		}

		status::set_reconciled(
			&mut status,
			result.as_ref().map(|_| ()),
			descriptor.metadata.generation,
			Utc::now().trunc_subsecs(0),
		);
		self.publish_status(&descriptor, &mut published, &status)
			.await;

		result.map(|()| ReconcileOutcome::Converged)
	}

	/// Ensures every managed resource in order, recording each into `status`.
	/// Stops at the first failure.
	async fn converge(
		&self,
		descriptor: &GenAIDeployment,
		status: &mut GenAIDeploymentStatus,
		published: &mut Option<GenAIDeploymentStatus>,
	) -> Result<(), AppError> {
		if descriptor.spec.ray_service.enabled {
			let cluster = self.ensure(ManagedKind::RayCluster, descriptor).await?;
			status::record(status, &cluster);
			self.publish_status(descriptor, published, status).await;
		} else {
			trace!("Ray is disabled, leaving RayCluster alone");
		}

		for kind in SERVICE_KINDS {
			let service = self.ensure(kind, descriptor).await?;
			status::record(status, &service);
		}

		Ok(())
	}

	/// Makes sure the `kind` resource of `descriptor` exists and matches the
	/// descriptor, and returns the latest known state of it.
	async fn ensure(
		&self,
		kind: ManagedKind,
		descriptor: &GenAIDeployment,
	) -> Result<ManagedResource, AppError> {
		let desired = desired::construct(kind, descriptor, &self.registry)?;
		let namespace = desired.namespace().unwrap_or_default();
		let name = desired.name();

		let mut conflicts = 0;
		loop {
			let Some(mut existing) = self.store.get(kind, &namespace, &name).await? else {
				info!("Creating {} {}/{}", kind, namespace, name);
				match self.store.create(&desired).await {
					Ok(()) => (),
					Err(StoreError::AlreadyExists) => {
						debug!("{} {}/{} was created concurrently", kind, namespace, name);
					}
					Err(err) => return Err(err.into()),
				}
				return Ok(desired);
			};

			if !ownership::is_controlled_by(existing.meta(), descriptor) {
				warn!(
					"{} {}/{} is not controlled by GenAIDeployment {}",
					kind,
					namespace,
					name,
					descriptor.name_any()
				);
			}

			if diff::is_up_to_date(&existing, &desired)? {
				trace!("{} {}/{} is up to date", kind, namespace, name);
				return Ok(existing);
			}

			existing.adopt_spec(&desired)?;
			info!("Updating {} {}/{}", kind, namespace, name);
			match self.store.update(&existing).await {
				Ok(()) => return Ok(existing),
				Err(StoreError::Conflict) if conflicts < self.conflict_retries => {
					conflicts += 1;
					debug!(
						"{} {}/{} changed while updating it, retrying ({}/{})",
						kind, namespace, name, conflicts, self.conflict_retries
					);
				}
				Err(err) => return Err(err.into()),
			}
		}
	}

	/// Writes `status` onto the descriptor unless it is already there. A failed
	/// write is only logged: the status is recomputed on every pass.
	async fn publish_status(
		&self,
		descriptor: &GenAIDeployment,
		published: &mut Option<GenAIDeploymentStatus>,
		status: &GenAIDeploymentStatus,
	) {
		if published.as_ref() == Some(status) {
			trace!("Status of GenAIDeployment {} is unchanged", descriptor.name_any());
			return;
		}

		let mut updated = descriptor.clone();
		updated.status = Some(status.clone());
		match self.store.update_descriptor_status(&updated).await {
			Ok(()) => *published = Some(status.clone()),
			Err(err) => warn!(
				"Failed to update status of GenAIDeployment {}: {}",
				descriptor.name_any(),
				err
			),
		}
	}
}
