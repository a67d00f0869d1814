use serde_json::Value;
use sha2::{Digest, Sha512};

use crate::{prelude::*, quantity, resource::ManagedResource};

/// Annotation recording the hash of the specification subtree the controller
/// last wrote to a managed resource.
pub const SPEC_HASH_ANNOTATION: &str = "genai.splunk.com/spec-hash";

/// SHA-512 of the canonical JSON form of a specification subtree. Object keys
/// are serialized in sorted order, so equal specs always hash equally.
pub fn spec_hash(spec: &Value) -> String {
	hex::encode(Sha512::digest(canonicalize(spec).to_string().as_bytes()))
}

/// `value` with the keys of every object in sorted order.
fn canonicalize(value: &Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut entries = map.iter().collect::<Vec<_>>();
			entries.sort_by(|(left, _), (right, _)| left.cmp(right));
			Value::Object(
				entries
					.into_iter()
					.map(|(key, value)| (key.clone(), canonicalize(value)))
					.collect(),
			)
		}
		Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
		value => value.clone(),
	}
}

/// Records the hash of `resource`'s own specification on it. Called by the
/// constructors once the spec is complete.
pub fn stamp_spec_hash(resource: &mut ManagedResource) -> Result<(), AppError> {
	let hash = spec_hash(&resource.spec_value()?);
	resource.set_annotation(SPEC_HASH_ANNOTATION, hash);
	Ok(())
}

/// Returns `true` when `existing` needs no update to match `desired`.
///
/// Two checks have to pass:
/// - the spec hash recorded on `existing` equals the hash of the desired spec,
///   which catches any change on the descriptor side, including optional
///   fields that were removed;
/// - every field of the desired spec is present with an equal value in the
///   live spec, which catches edits made to the live object by someone else.
///   Fields only present in the live spec are defaults filled in by the API
///   server and are ignored.
pub fn is_up_to_date(existing: &ManagedResource, desired: &ManagedResource) -> Result<bool, AppError> {
	if existing.kind() != desired.kind() {
		return Ok(false);
	}

	let desired_spec = desired.spec_value()?;
	if existing.annotation(SPEC_HASH_ANNOTATION) != Some(spec_hash(&desired_spec).as_str()) {
		return Ok(false);
	}

	Ok(contains(&existing.spec_value()?, &desired_spec))
}

/// Whether `live` carries every value of `desired`.
fn contains(live: &Value, desired: &Value) -> bool {
	contains_values(live, desired, false)
}

/// Resource maps whose values are quantities.
const QUANTITY_MAPS: [&str; 2] = ["limits", "requests"];

/// Does the work of [`contains`]. `quantities` is set below a resource map,
/// where strings are compared by the quantity they denote.
fn contains_values(live: &Value, desired: &Value, quantities: bool) -> bool {
	match (live, desired) {
		(Value::Object(live), Value::Object(desired)) => {
			desired.iter().all(|(key, desired)| match live.get(key) {
				Some(live) => contains_values(
					live,
					desired,
					quantities || QUANTITY_MAPS.contains(&key.as_str()),
				),
				None => is_empty(desired),
			})
		}
		(Value::Array(live), Value::Array(desired)) => {
			live.len() == desired.len() &&
				live
					.iter()
					.zip(desired)
					.all(|(live, desired)| contains_values(live, desired, false))
		}
		(Value::String(live), Value::String(desired)) if quantities => {
			live == desired || quantity::same_value(live, desired)
		}
		(Value::Null, desired) => is_empty(desired),
		(live, desired) => live == desired,
	}
}

/// Values the API server drops when they are written.
fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Object(map) => map.is_empty(),
		Value::Array(items) => items.is_empty(),
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use k8s_openapi::{
		api::{
			apps::v1::Deployment,
			core::v1::{ResourceRequirements, TopologySpreadConstraint},
		},
		apimachinery::pkg::api::resource::Quantity,
	};
	use serde_json::json;

	use super::*;
	use crate::{
		desired,
		models::{GenAIDeploymentSpec, VectorDbServiceSpec},
		registry::{KindRegistry, ManagedKind},
	};

	fn descriptor(spec: GenAIDeploymentSpec) -> GenAIDeployment {
		let mut descriptor = GenAIDeployment::new("x", spec);
		descriptor.metadata.namespace = Some("ns".to_string());
		descriptor.metadata.uid = Some("uid-1".to_string());
		descriptor
	}

	fn vectordb(spec: VectorDbServiceSpec) -> ManagedResource {
		desired::construct(
			ManagedKind::VectorDbService,
			&descriptor(GenAIDeploymentSpec {
				vectordb_service: spec,
				..GenAIDeploymentSpec::default()
			}),
			&KindRegistry::new(),
		)
		.unwrap()
	}

	fn spread(max_skew: i32) -> TopologySpreadConstraint {
		TopologySpreadConstraint {
			max_skew,
			topology_key: "topology.kubernetes.io/zone".to_string(),
			when_unsatisfiable: "DoNotSchedule".to_string(),
			..TopologySpreadConstraint::default()
		}
	}

	#[test]
	fn identical_specs_are_up_to_date() {
		let spec = VectorDbServiceSpec {
			image: "vectordb:1".to_string(),
			..VectorDbServiceSpec::default()
		};

		assert!(is_up_to_date(&vectordb(spec.clone()), &vectordb(spec)).unwrap());
	}

	#[test]
	fn topology_spread_constraints_participate() {
		let without = VectorDbServiceSpec {
			image: "vectordb:1".to_string(),
			..VectorDbServiceSpec::default()
		};
		let with = VectorDbServiceSpec {
			topology_spread_constraints: vec![spread(1)],
			..without.clone()
		};
		let changed = VectorDbServiceSpec {
			topology_spread_constraints: vec![spread(2)],
			..without.clone()
		};

		assert!(!is_up_to_date(&vectordb(without.clone()), &vectordb(with.clone())).unwrap());
		assert!(!is_up_to_date(&vectordb(with.clone()), &vectordb(without)).unwrap());
		assert!(!is_up_to_date(&vectordb(with), &vectordb(changed)).unwrap());
	}

	#[test]
	fn external_edits_to_the_live_spec_are_detected() {
		let spec = VectorDbServiceSpec {
			image: "vectordb:1".to_string(),
			replicas: 2,
			..VectorDbServiceSpec::default()
		};
		let desired = vectordb(spec.clone());
		let mut live = vectordb(spec);
		if let ManagedResource::VectorDbService(Deployment {
			spec: Some(spec), ..
		}) = &mut live
		{
			spec.replicas = Some(5);
		}

		assert!(!is_up_to_date(&live, &desired).unwrap());
	}

	#[test]
	fn server_defaults_are_ignored() {
		let spec = VectorDbServiceSpec {
			image: "vectordb:1".to_string(),
			..VectorDbServiceSpec::default()
		};
		let desired = vectordb(spec.clone());
		let mut live = vectordb(spec);
		if let ManagedResource::VectorDbService(Deployment {
			spec: Some(spec), ..
		}) = &mut live
		{
			spec.revision_history_limit = Some(10);
			spec.progress_deadline_seconds = Some(600);
			if let Some(pod) = spec.template.spec.as_mut() {
				pod.restart_policy = Some("Always".to_string());
				pod.containers[0].termination_message_path =
					Some("/dev/termination-log".to_string());
			}
		}

		assert!(is_up_to_date(&live, &desired).unwrap());
	}

	#[test]
	fn missing_hash_means_out_of_date() {
		let spec = VectorDbServiceSpec::default();
		let desired = vectordb(spec.clone());
		let mut live = vectordb(spec);
		live.meta_mut().annotations = None;

		assert!(!is_up_to_date(&live, &desired).unwrap());
	}

	#[test]
	fn hash_is_stable_for_equal_specs() {
		let first = json!({ "b": 1, "a": { "y": [1, 2], "x": null } });
		let second = json!({ "a": { "x": null, "y": [1, 2] }, "b": 1 });

		assert_eq!(spec_hash(&first), spec_hash(&second));
		assert_ne!(spec_hash(&first), spec_hash(&json!({ "b": 2 })));
	}

	#[test]
	fn containment_treats_empty_values_as_absent() {
		assert!(contains(&json!({}), &json!({ "resources": {}, "tolerations": [] })));
		assert!(!contains(&json!({}), &json!({ "image": "a" })));
		assert!(!contains(
			&json!({ "containers": [{ "name": "a" }, { "name": "b" }] }),
			&json!({ "containers": [{ "name": "a" }] })
		));
	}

	fn with_cpu(resource: &mut ManagedResource, amount: &str) {
		if let ManagedResource::VectorDbService(Deployment {
			spec: Some(spec), ..
		}) = resource
		{
			if let Some(pod) = spec.template.spec.as_mut() {
				pod.containers[0].resources = Some(cpu(amount));
			}
		}
	}

	fn cpu(amount: &str) -> ResourceRequirements {
		ResourceRequirements {
			requests: Some([("cpu".to_string(), Quantity(amount.to_string()))].into()),
			limits: Some([("memory".to_string(), Quantity("1024Mi".to_string()))].into()),
			..ResourceRequirements::default()
		}
	}

	#[test]
	fn quantities_rewritten_by_the_server_are_up_to_date() {
		let spec = VectorDbServiceSpec {
			image: "vectordb:1".to_string(),
			resources: cpu("0.5"),
			..VectorDbServiceSpec::default()
		};
		let desired = vectordb(spec.clone());
		let mut live = vectordb(spec);
		with_cpu(&mut live, "500m");
		if let ManagedResource::VectorDbService(Deployment {
			spec: Some(spec), ..
		}) = &mut live
		{
			if let Some(pod) = spec.template.spec.as_mut() {
				if let Some(resources) = pod.containers[0].resources.as_mut() {
					resources.limits =
						Some([("memory".to_string(), Quantity("1Gi".to_string()))].into());
				}
			}
		}

		assert!(is_up_to_date(&live, &desired).unwrap());
	}

	#[test]
	fn changed_quantities_are_detected() {
		let spec = VectorDbServiceSpec {
			image: "vectordb:1".to_string(),
			resources: cpu("0.5"),
			..VectorDbServiceSpec::default()
		};
		let desired = vectordb(spec.clone());
		let mut live = vectordb(spec);
		with_cpu(&mut live, "600m");

		assert!(!is_up_to_date(&live, &desired).unwrap());
	}

	#[test]
	fn only_resource_maps_compare_quantities() {
		assert!(contains(
			&json!({ "requests": { "cpu": "500m" } }),
			&json!({ "requests": { "cpu": "0.5" } })
		));
		assert!(!contains(&json!({ "image": "500m" }), &json!({ "image": "0.5" })));
	}

	#[test]
	fn different_kinds_are_never_up_to_date() {
		let sais = ManagedResource::SaisService(Deployment::default());

		assert!(!is_up_to_date(&sais, &vectordb(VectorDbServiceSpec::default())).unwrap());
	}
}
