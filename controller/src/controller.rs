use std::{sync::Arc, time::Duration};

use futures::{FutureExt, StreamExt};
use k8s_openapi::{api::apps::v1::Deployment, NamespaceResourceScope};
use kube::{
	runtime::{
		controller::{Action, Controller},
		watcher,
	},
	Api,
	Client,
	Resource,
	ResourceExt,
};
use tokio::{signal, sync::mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{prelude::*, reconcile::ReconcileOutcome};

/// Starts the GenAI deployment controller. This function will ideally run
/// forever, only exiting when a ctrl-c signal is received.
pub(super) async fn start_controller(client: Client, state: Arc<AppState>) {
	let namespace = state.settings.namespace.clone();
	let resync = resync_trigger(state.settings.resync_interval());

	info!(
		"Watching GenAIDeployments in {}",
		namespace.as_deref().unwrap_or("all namespaces")
	);

	Controller::new(
		scoped_api::<GenAIDeployment>(&client, namespace.as_deref()),
		watcher::Config::default(),
	)
	.owns(
		scoped_api::<RayCluster>(&client, namespace.as_deref()),
		watcher::Config::default(),
	)
	.owns(
		scoped_api::<Deployment>(&client, namespace.as_deref()),
		watcher::Config::default(),
	)
	.reconcile_all_on(resync)
	.graceful_shutdown_on(signal::ctrl_c().map(|_| ()))
	.run(reconcile, error_policy, state)
	.for_each(|result| async move {
		match result {
			Ok((object, _)) => trace!("Reconciled GenAIDeployment {}", object.name),
			Err(err) => debug!("Reconciliation did not complete: {}", err),
		}
	})
	.await;

	info!("Controller stopped");
}

/// An API handle for `K`, limited to `namespace` if one is given.
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
	K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
	match namespace {
		Some(namespace) => Api::namespaced(client.clone(), namespace),
		None => Api::all(client.clone()),
	}
}

/// Emits once every `interval`, asking the controller to reconcile every
/// descriptor it knows about. Stops when the controller goes away.
fn resync_trigger(interval: Duration) -> UnboundedReceiverStream<()> {
	let (sender, receiver) = mpsc::unbounded_channel();
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
		loop {
			ticker.tick().await;
			trace!("Triggering a resync of all GenAIDeployments");
			if sender.send(()).is_err() {
				break;
			}
		}
	});
	UnboundedReceiverStream::new(receiver)
}

/// Reconciles the resources owned by a `GenAIDeployment`. This is called
/// whenever a descriptor is created or updated, whenever one of the objects it
/// owns changes, and on every resync.
async fn reconcile(descriptor: Arc<GenAIDeployment>, state: Arc<AppState>) -> Result<Action, AppError> {
	let namespace = descriptor.namespace().ok_or_else(|| {
		AppError::Construction("GenAIDeployment does not have a namespace".to_string())
	})?;

	match state
		.reconciler
		.reconcile(&namespace, &descriptor.name_any())
		.await?
	{
		ReconcileOutcome::DescriptorAbsent => Ok(Action::await_change()),
		ReconcileOutcome::Converged => Ok(Action::requeue(state.settings.requeue_after())),
	}
}

/// Decides what to do with a failed reconciliation. Retryable errors are
/// requeued after a short backoff, anything else waits for the descriptor to
/// change.
fn error_policy(descriptor: Arc<GenAIDeployment>, err: &AppError, state: Arc<AppState>) -> Action {
	if err.is_retryable() {
		Action::requeue(state.settings.error_requeue())
	} else {
		warn!(
			"Not retrying GenAIDeployment {} until it changes: {}",
			descriptor.name_any(),
			err
		);
		Action::await_change()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		config::{ControllerSettings, RunningEnvironment},
		models::GenAIDeploymentSpec,
		reconcile::Reconciler,
		registry::KindRegistry,
		store::{memory::MemoryStore, StoreError},
	};

	fn state(store: Arc<MemoryStore>) -> Arc<AppState> {
		Arc::new(AppState {
			settings: ControllerSettings {
				environment: RunningEnvironment::Development,
				namespace: None,
				requeue_after_secs: 600,
				error_requeue_secs: 7,
				conflict_retries: 3,
				resync_interval_secs: 3600,
			},
			reconciler: Reconciler::new(store, Arc::new(KindRegistry::new()), 3),
		})
	}

	fn descriptor() -> GenAIDeployment {
		let mut descriptor = GenAIDeployment::new("x", GenAIDeploymentSpec::default());
		descriptor.metadata.namespace = Some("genai".to_string());
		descriptor.metadata.uid = Some("uid-1".to_string());
		descriptor
	}

	#[tokio::test]
	async fn converged_descriptor_is_requeued_after_the_resync_period() {
		let store = Arc::new(MemoryStore::new());
		store.put_descriptor(descriptor());

		let action = reconcile(Arc::new(descriptor()), state(store))
			.await
			.unwrap();

		assert_eq!(action, Action::requeue(Duration::from_secs(600)));
	}

	#[tokio::test]
	async fn deleted_descriptor_waits_for_changes() {
		let action = reconcile(Arc::new(descriptor()), state(Arc::new(MemoryStore::new())))
			.await
			.unwrap();

		assert_eq!(action, Action::await_change());
	}

	#[test]
	fn retryable_errors_are_requeued_after_the_backoff() {
		let state = state(Arc::new(MemoryStore::new()));

		assert_eq!(
			error_policy(
				Arc::new(descriptor()),
				&AppError::Store(StoreError::Conflict),
				state.clone()
			),
			Action::requeue(Duration::from_secs(7))
		);
		assert_eq!(
			error_policy(
				Arc::new(descriptor()),
				&AppError::Construction("bad volume".to_string()),
				state
			),
			Action::await_change()
		);
	}
}
