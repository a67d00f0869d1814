use k8s_openapi::{
	api::core::v1::{Affinity, ResourceRequirements, Toleration, TopologySpreadConstraint, Volume},
	apimachinery::pkg::apis::meta::v1::Condition,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `RayCluster` custom resource owned by the KubeRay operator.
mod ray;

pub use self::ray::{
	HeadGroupSpec,
	RayCluster,
	RayClusterSpec,
	RayClusterStatus,
	WorkerGroupSpec,
};

/// GenAI deployment descriptor. This is the only object a user authors: the
/// controller derives the Ray cluster and both service deployments from it
/// and never writes anything but its status.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
	kind = "GenAIDeployment",
	group = "enterprise.splunk.com",
	version = "v4",
	singular = "genaideployment",
	plural = "genaideployments",
	shortname = "genai",
	status = "GenAIDeploymentStatus",
	derive = "PartialEq",
	namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GenAIDeploymentSpec {
	/// The distributed compute cluster. Nothing is created (or touched) unless
	/// `enabled` is set.
	#[serde(default)]
	pub ray_service: RayServiceSpec,
	/// The SAIS service deployment.
	#[serde(default)]
	pub sais_service: SaisServiceSpec,
	/// The vector database service deployment.
	#[serde(default)]
	pub vectordb_service: VectorDbServiceSpec,
}

/// Configuration of the Ray cluster backing a GenAI deployment.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RayServiceSpec {
	/// Whether the Ray cluster should exist at all.
	#[serde(default)]
	pub enabled: bool,
	/// The image used by both the head and the worker pods.
	#[serde(default)]
	pub image: String,
	/// Number of worker pods.
	#[serde(default = "default_replicas")]
	pub replicas: i32,
	/// The Ray head pod.
	#[serde(default)]
	pub head_group: RayHeadGroup,
	/// The Ray worker pods.
	#[serde(default)]
	pub worker_group: RayWorkerGroup,
}

/// Head node settings of the Ray cluster.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RayHeadGroup {
	/// Passed to `ray start` as `num-cpus`.
	#[serde(default)]
	pub num_cpus: String,
	#[serde(default)]
	pub resources: ResourceRequirements,
}

/// Worker node settings of the Ray cluster.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RayWorkerGroup {
	#[serde(default)]
	pub resources: ResourceRequirements,
}

/// Configuration of the SAIS service deployment.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaisServiceSpec {
	/// Number of pods.
	#[serde(default = "default_replicas")]
	pub replicas: i32,
	/// Image of the service container.
	#[serde(default)]
	pub image: String,
	/// Resource requests and limits of the service container.
	#[serde(default)]
	pub resources: ResourceRequirements,
	/// Volume mounted into the service container at `/data`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub volume: Option<Volume>,
	/// Scheduler for the pods, the default scheduler when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduler_name: Option<String>,
	/// Affinity of the pods.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub affinity: Option<Affinity>,
	/// Tolerations of the pods.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tolerations: Vec<Toleration>,
}

/// Configuration of the vector database service deployment.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VectorDbServiceSpec {
	/// Number of pods.
	#[serde(default = "default_replicas")]
	pub replicas: i32,
	/// Image of the database container.
	#[serde(default)]
	pub image: String,
	/// Resource requests and limits of the database container.
	#[serde(default)]
	pub resources: ResourceRequirements,
	/// Volume mounted into the database container at `/data`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub volume: Option<Volume>,
	/// Affinity of the pods.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub affinity: Option<Affinity>,
	/// Tolerations of the pods.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tolerations: Vec<Toleration>,
	/// How the pods are spread across the topology of the cluster.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub topology_spread_constraints: Vec<TopologySpreadConstraint>,
}

/// Services and Ray workers run a single pod unless told otherwise.
fn default_replicas() -> i32 {
	1
}

/// Observed state of a GenAI deployment. Everything in here is a projection of
/// the managed resources and is recomputed on every reconciliation.
///
/// Empty lists and missing summaries are serialized as `[]` and `null`, so a
/// merge patch of the status clears whatever was stored before.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenAIDeploymentStatus {
	/// The Ray cluster, if it was ever reconciled.
	#[serde(default)]
	pub ray_cluster_status: Option<RayClusterSummary>,
	/// The SAIS service deployment.
	#[serde(default)]
	pub sais_service_status: Option<ServiceSummary>,
	/// The vector database deployment.
	#[serde(default)]
	pub vectordb_service_status: Option<ServiceSummary>,
	/// Conditions set by the controller itself, e.g. `Reconciled`.
	#[serde(default)]
	pub conditions: Vec<Condition>,
	/// Generation of the descriptor the last pass worked from.
	#[serde(default)]
	pub observed_generation: Option<i64>,
}

/// Last observed state of the Ray cluster.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RayClusterSummary {
	/// Name of the `RayCluster` object.
	pub cluster_name: String,
	/// State reported by KubeRay, empty until it reports one.
	#[serde(default)]
	pub state: String,
	/// Conditions reported by KubeRay.
	#[serde(default)]
	pub conditions: Vec<Condition>,
}

/// Last observed state of one of the service deployments.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
	/// Name of the `Deployment` object.
	pub deployment_name: String,
	/// Pods created by the deployment.
	#[serde(default)]
	pub replicas: i32,
	/// Pods that pass their readiness checks.
	#[serde(default)]
	pub ready_replicas: i32,
	/// Pods that have been ready for at least `minReadySeconds`.
	#[serde(default)]
	pub available_replicas: i32,
}
