use std::collections::BTreeMap;

use k8s_openapi::{
	api::{
		apps::v1::{Deployment, DeploymentSpec},
		core::v1::{
			Affinity,
			Container,
			PodSpec,
			PodTemplateSpec,
			ResourceRequirements,
			Toleration,
			TopologySpreadConstraint,
			Volume,
			VolumeMount,
		},
	},
	apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{core::ObjectMeta, ResourceExt};

use crate::{
	diff,
	models::{HeadGroupSpec, RayClusterSpec, WorkerGroupSpec},
	ownership,
	prelude::*,
	registry::{KindRegistry, ManagedKind},
	resource::ManagedResource,
};

/// Where the service volumes are mounted inside their containers.
const DATA_MOUNT_PATH: &str = "/data";

/// Builds the desired state of the `kind` resource owned by `descriptor`.
///
/// This is a pure function of the descriptor: the same input always produces
/// the same object, including the spec hash annotation that the diff relies
/// on. The owner reference is stamped here, before the object is ever created.
pub fn construct(
	kind: ManagedKind,
	descriptor: &GenAIDeployment,
	registry: &KindRegistry,
) -> Result<ManagedResource, AppError> {
	let metadata = managed_metadata(kind, descriptor, registry)?;
	let name = descriptor.name_any();

	let mut resource = match kind {
		ManagedKind::RayCluster => ManagedResource::RayCluster(RayCluster {
			metadata,
			spec: ray_cluster_spec(descriptor),
			status: None,
		}),
		ManagedKind::SaisService => {
			let sais = &descriptor.spec.sais_service;
			ManagedResource::SaisService(service_deployment(
				metadata,
				ServiceTemplate {
					app: "sais-service",
					container: "sais-service-container",
					descriptor_name: &name,
					replicas: sais.replicas,
					image: &sais.image,
					resources: &sais.resources,
					volume: sais.volume.as_ref(),
					scheduler_name: sais.scheduler_name.as_ref(),
					affinity: sais.affinity.as_ref(),
					tolerations: &sais.tolerations,
					topology_spread_constraints: &[],
				},
			))
		}
		ManagedKind::VectorDbService => {
			let vectordb = &descriptor.spec.vectordb_service;
			ManagedResource::VectorDbService(service_deployment(
				metadata,
				ServiceTemplate {
					app: "vectordb-service",
					container: "vectordb-container",
					descriptor_name: &name,
					replicas: vectordb.replicas,
					image: &vectordb.image,
					resources: &vectordb.resources,
					volume: vectordb.volume.as_ref(),
					scheduler_name: None,
					affinity: vectordb.affinity.as_ref(),
					tolerations: &vectordb.tolerations,
					topology_spread_constraints: &vectordb.topology_spread_constraints,
				},
			))
		}
	};

	diff::stamp_spec_hash(&mut resource)?;
	Ok(resource)
}

/// Name, namespace and owner reference shared by every managed resource.
fn managed_metadata(
	kind: ManagedKind,
	descriptor: &GenAIDeployment,
	registry: &KindRegistry,
) -> Result<ObjectMeta, AppError> {
	let namespace = descriptor.namespace().ok_or_else(|| {
		AppError::Construction("The provided GenAIDeployment does not have a namespace".to_string())
	})?;

	let mut metadata = ObjectMeta {
		name: Some(registry.derived_name(kind, &descriptor.name_any())?),
		namespace: Some(namespace),
		..ObjectMeta::default()
	};
	ownership::link(&mut metadata, ownership::owner_reference(descriptor)?);

	Ok(metadata)
}

/// The `RayCluster` spec: one head and a single worker group, both running
/// the configured image.
fn ray_cluster_spec(descriptor: &GenAIDeployment) -> RayClusterSpec {
	let ray = &descriptor.spec.ray_service;

	let ray_start_params = if ray.head_group.num_cpus.is_empty() {
		BTreeMap::new()
	} else {
		[("num-cpus".to_string(), ray.head_group.num_cpus.clone())].into()
	};

	RayClusterSpec {
		head_group_spec: HeadGroupSpec {
			ray_start_params,
			template: PodTemplateSpec {
				spec: Some(PodSpec {
					containers: vec![Container {
						name: "ray-head".to_string(),
						image: Some(ray.image.clone()),
						resources: Some(ray.head_group.resources.clone()),
						..Container::default()
					}],
					..PodSpec::default()
				}),
				..PodTemplateSpec::default()
			},
		},
		worker_group_specs: vec![WorkerGroupSpec {
			group_name: "ray-worker".to_string(),
			replicas: Some(ray.replicas),
			ray_start_params: BTreeMap::new(),
			template: PodTemplateSpec {
				spec: Some(PodSpec {
					containers: vec![Container {
						name: "ray-worker".to_string(),
						image: Some(ray.image.clone()),
						resources: Some(ray.worker_group.resources.clone()),
						..Container::default()
					}],
					..PodSpec::default()
				}),
				..PodTemplateSpec::default()
			},
		}],
	}
}

/// The parts that differ between the two service deployments.
struct ServiceTemplate<'a> {
	/// Value of the `app` label.
	app: &'static str,
	/// Name of the only container.
	container: &'static str,
	/// Value of the `deployment` label.
	descriptor_name: &'a str,
	/// Number of pods.
	replicas: i32,
	/// Image of the container.
	image: &'a str,
	/// Resources of the container.
	resources: &'a ResourceRequirements,
	/// Volume mounted at `/data`, if any.
	volume: Option<&'a Volume>,
	/// Scheduler of the pods, the default one if unset.
	scheduler_name: Option<&'a String>,
	/// Affinity of the pods.
	affinity: Option<&'a Affinity>,
	/// Tolerations of the pods.
	tolerations: &'a [Toleration],
	/// Topology spread constraints of the pods.
	topology_spread_constraints: &'a [TopologySpreadConstraint],
}

/// The `Deployment` of a service. Pods are selected by their `app` and
/// `deployment` labels.
fn service_deployment(metadata: ObjectMeta, template: ServiceTemplate<'_>) -> Deployment {
	let labels = [
		("app".to_string(), template.app.to_string()),
		(
			"deployment".to_string(),
			template.descriptor_name.to_string(),
		),
	]
	.into_iter()
	.collect::<BTreeMap<_, _>>();

	Deployment {
		metadata,
		spec: Some(DeploymentSpec {
			replicas: Some(template.replicas),
			selector: LabelSelector {
				match_labels: Some(labels.clone()),
				..LabelSelector::default()
			},
			template: PodTemplateSpec {
				metadata: Some(ObjectMeta {
					labels: Some(labels),
					..ObjectMeta::default()
				}),
				spec: Some(PodSpec {
					containers: vec![Container {
						name: template.container.to_string(),
						image: Some(template.image.to_string()),
						resources: Some(template.resources.clone()),
						volume_mounts: template.volume.map(|volume| {
							vec![VolumeMount {
								name: volume.name.clone(),
								mount_path: DATA_MOUNT_PATH.to_string(),
								..VolumeMount::default()
							}]
						}),
						..Container::default()
					}],
					volumes: template.volume.map(|volume| vec![volume.clone()]),
					scheduler_name: template.scheduler_name.cloned(),
					affinity: template.affinity.cloned(),
					tolerations: non_empty(template.tolerations),
					topology_spread_constraints: non_empty(template.topology_spread_constraints),
					..PodSpec::default()
				}),
			},
			..DeploymentSpec::default()
		}),
		..Deployment::default()
	}
}

/// `None` for an empty list, which the API server would drop anyway.
fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
	if items.is_empty() {
		None
	} else {
		Some(items.to_vec())
	}
}
