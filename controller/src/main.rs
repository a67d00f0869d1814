#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! A Kubernetes controller for GenAI deployments. Each `GenAIDeployment`
//! descriptor owns a Ray cluster (optional), a SAIS service deployment and a
//! vector database deployment. The controller watches the descriptors and the
//! objects they own, and keeps the owned objects in line with the descriptors,
//! reporting what it observed back onto the descriptor status.

use std::sync::Arc;

use kube::Client;
use tracing::{Dispatch, Level};
use tracing_subscriber::{
	filter::LevelFilter,
	fmt::{format::FmtSpan, Layer as FmtLayer},
	layer::SubscriberExt,
	Layer,
};

use crate::{
	config::{ControllerSettings, RunningEnvironment},
	prelude::*,
	reconcile::Reconciler,
	registry::KindRegistry,
	store::KubeStore,
};

/// The shared state of the controller and the errors a reconciliation can end
/// with.
mod app;
/// The configuration for the controller.
mod config;
/// Wires the reconciler into the controller runtime.
mod controller;
/// Builds the desired state of each managed resource from a descriptor.
mod desired;
/// Decides whether a live managed resource needs an update.
mod diff;
/// The custom resources the controller reads and writes.
mod models;
/// Owner references between descriptors and the resources they own.
mod ownership;
/// Compares resource quantities by value. The API server stores them in
/// canonical form, so `0.5` comes back as `500m` and `1024Mi` as `1Gi`.
mod quantity;
/// The reconciliation pass itself.
mod reconcile;
/// The kinds of resources a descriptor owns.
mod registry;
/// A single managed resource, whatever its kind.
mod resource;
/// Projects the state of the managed resources onto the descriptor status.
mod status;
/// Access to the objects in the cluster.
mod store;

/// The prelude module contains all the commonly used types and traits that are
/// used across the crate. This is mostly used to avoid having to import a lot
/// of things from different modules.
pub mod prelude {
	pub use tracing::{debug, error, info, instrument, trace, warn};

	pub use crate::{
		app::{AppError, AppState},
		models::{GenAIDeployment, RayCluster},
	};
}

/// Parses the settings, sets up logging and runs the controller until a
/// ctrl-c signal is received.
#[tokio::main]
async fn main() {
	let settings = ControllerSettings::parse(env!("CARGO_PKG_NAME"))
		.expect("Failed to parse controller settings");

	tracing::dispatcher::set_global_default(Dispatch::new(
		tracing_subscriber::registry().with(
			FmtLayer::new()
				.with_span_events(FmtSpan::NONE)
				.event_format(
					tracing_subscriber::fmt::format()
						.with_ansi(true)
						.with_file(false)
						.without_time()
						.compact(),
				)
				.with_filter(
					tracing_subscriber::filter::Targets::new()
						.with_target(env!("CARGO_CRATE_NAME"), LevelFilter::TRACE)
						.with_target("kube_runtime", LevelFilter::INFO),
				)
				.with_filter(LevelFilter::from_level(
					if settings.environment == RunningEnvironment::Development {
						Level::TRACE
					} else {
						Level::DEBUG
					},
				)),
		),
	))
	.expect("Failed to set global default subscriber");

	info!(
		"Configuration read. Running environment set to {}",
		settings.environment
	);

	let client = Client::try_default()
		.await
		.expect("Failed to get kubernetes client details");

	let registry = KindRegistry::new();
	for kind in registry.kinds() {
		if let Some(info) = registry.info(kind) {
			debug!(
				"Managing {} as {} {}",
				kind, info.api_version, info.object_kind
			);
		}
	}

	let state = AppState {
		reconciler: Reconciler::new(
			Arc::new(KubeStore::new(client.clone())),
			Arc::new(registry),
			settings.conflict_retries,
		),
		settings,
	};

	controller::start_controller(client, Arc::new(state)).await;
}
