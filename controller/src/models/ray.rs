use std::collections::BTreeMap;

use k8s_openapi::{
	api::core::v1::PodTemplateSpec,
	apimachinery::pkg::apis::meta::v1::Condition,
};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Subset of the KubeRay `RayCluster` spec that the controller manages. The
/// CRD itself is installed by the KubeRay operator, so no schema is generated
/// here.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[kube(
	kind = "RayCluster",
	group = "ray.io",
	version = "v1",
	status = "RayClusterStatus",
	schema = "disabled",
	derive = "PartialEq",
	namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RayClusterSpec {
	/// The head pod.
	pub head_group_spec: HeadGroupSpec,
	/// The worker groups.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub worker_group_specs: Vec<WorkerGroupSpec>,
}

/// Head pod of a Ray cluster.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeadGroupSpec {
	/// Arguments passed to `ray start`.
	#[serde(default)]
	pub ray_start_params: BTreeMap<String, String>,
	/// Template of the pods.
	pub template: PodTemplateSpec,
}

/// A group of identical Ray worker pods.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerGroupSpec {
	/// Name of the group, unique within the cluster.
	pub group_name: String,
	/// Number of worker pods.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub replicas: Option<i32>,
	/// Arguments passed to `ray start`.
	#[serde(default)]
	pub ray_start_params: BTreeMap<String, String>,
	/// Template of the pods.
	pub template: PodTemplateSpec,
}

/// Status reported by the KubeRay operator.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RayClusterStatus {
	/// Lifecycle state, e.g. `ready`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
	/// Conditions reported by KubeRay.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub conditions: Option<Vec<Condition>>,
	/// Worker pods that are ready.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ready_worker_replicas: Option<i32>,
	/// Generation of the spec KubeRay last acted on.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub observed_generation: Option<i64>,
}
