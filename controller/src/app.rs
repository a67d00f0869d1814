use crate::{config::ControllerSettings, reconcile::Reconciler, store::StoreError};

/// Shared state handed to every reconciliation by the controller runtime.
pub struct AppState {
	/// The settings the controller was started with.
	pub settings: ControllerSettings,
	/// Runs the reconciliation passes.
	pub reconciler: Reconciler,
}

/// Errors that abort a reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	/// The state store failed to read or write an object.
	#[error("state store error: {0}")]
	Store(#[from] StoreError),
	/// A desired managed resource could not be built from the descriptor.
	#[error("unable to construct the desired resource: {0}")]
	Construction(String),
	/// A resource could not be converted to or from JSON.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl AppError {
	/// Whether running the same pass again later might succeed. Construction
	/// and serialization failures only go away when the descriptor changes.
	pub fn is_retryable(&self) -> bool {
		matches!(self, AppError::Store(_))
	}
}
