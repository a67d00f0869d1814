use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

use crate::{
	models::{GenAIDeploymentStatus, RayClusterSummary, ServiceSummary},
	prelude::*,
	resource::ManagedResource,
};

/// Condition type summarising the outcome of the last reconciliation.
pub const RECONCILED_CONDITION: &str = "Reconciled";
/// Reason of a `Reconciled` condition after a successful pass.
pub const RECONCILE_SUCCEEDED: &str = "ReconcileSucceeded";
/// Reason of a `Reconciled` condition after a failed pass.
pub const RECONCILE_FAILED: &str = "ReconcileFailed";

/// Folds the observed state of a managed resource into the descriptor status.
/// Only the summary belonging to `resource`'s kind is replaced.
pub fn record(status: &mut GenAIDeploymentStatus, resource: &ManagedResource) {
	match resource {
		ManagedResource::RayCluster(cluster) => {
			let observed = cluster.status.clone().unwrap_or_default();
			status.ray_cluster_status = Some(RayClusterSummary {
				cluster_name: resource.name(),
				state: observed.state.unwrap_or_default(),
				conditions: observed.conditions.unwrap_or_default(),
			});
		}
		ManagedResource::SaisService(deployment) => {
			status.sais_service_status = Some(service_summary(resource.name(), deployment));
		}
		ManagedResource::VectorDbService(deployment) => {
			status.vectordb_service_status = Some(service_summary(resource.name(), deployment));
		}
	}
}

/// Summary of a service deployment from its observed status.
fn service_summary(
	deployment_name: String,
	deployment: &k8s_openapi::api::apps::v1::Deployment,
) -> ServiceSummary {
	let observed = deployment.status.clone().unwrap_or_default();
	ServiceSummary {
		deployment_name,
		replicas: observed.replicas.unwrap_or_default(),
		ready_replicas: observed.ready_replicas.unwrap_or_default(),
		available_replicas: observed.available_replicas.unwrap_or_default(),
	}
}

/// Sets the `Reconciled` condition from the outcome of a pass.
pub fn set_reconciled(
	status: &mut GenAIDeploymentStatus,
	outcome: Result<(), &AppError>,
	generation: Option<i64>,
	now: DateTime<Utc>,
) {
	let (condition_status, reason, message) = match outcome {
		Ok(()) => (
			"True",
			RECONCILE_SUCCEEDED,
			"All managed resources match the descriptor".to_string(),
		),
		Err(err) => ("False", RECONCILE_FAILED, err.to_string()),
	};

	upsert_condition(
		&mut status.conditions,
		Condition {
			type_: RECONCILED_CONDITION.to_string(),
			status: condition_status.to_string(),
			reason: reason.to_string(),
			message,
			observed_generation: generation,
			last_transition_time: Time(now),
		},
	);
	status.observed_generation = generation;
}

/// Replaces the condition of the same type. The transition time is kept when
/// the condition status did not change, so that an unchanged pass produces an
/// identical status.
fn upsert_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
	match conditions
		.iter_mut()
		.find(|existing| existing.type_ == condition.type_)
	{
		Some(existing) => {
			if existing.status == condition.status {
				condition.last_transition_time = existing.last_transition_time.clone();
			}
			*existing = condition;
		}
		None => conditions.push(condition),
	}
}
