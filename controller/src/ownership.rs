use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{core::ObjectMeta, Resource};

use crate::prelude::*;

/// The controller owner reference pointing at `descriptor`. Kubernetes garbage
/// collection uses it to delete the managed resources together with the
/// descriptor.
pub fn owner_reference(descriptor: &GenAIDeployment) -> Result<OwnerReference, AppError> {
	descriptor.controller_owner_ref(&()).ok_or_else(|| {
		AppError::Construction(
			"GenAIDeployment does not have a name and uid to own resources with".to_string(),
		)
	})
}

/// Stamps the owner reference on a freshly constructed object. Only ever
/// called at construction; updates copy the spec onto the live object and
/// leave its owner references as they are.
pub fn link(metadata: &mut ObjectMeta, owner: OwnerReference) {
	metadata.owner_references = Some(vec![owner]);
}

/// Whether `metadata` names `descriptor` as its controlling owner.
pub fn is_controlled_by(metadata: &ObjectMeta, descriptor: &GenAIDeployment) -> bool {
	let Some(uid) = descriptor.meta().uid.as_deref() else {
		return false;
	};

	metadata
		.owner_references
		.iter()
		.flatten()
		.any(|owner| owner.uid == uid && owner.controller == Some(true))
}
