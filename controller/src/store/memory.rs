use std::{
	collections::{BTreeMap, VecDeque},
	sync::Mutex,
};

use async_trait::async_trait;
use kube::ResourceExt;

use super::{StateStore, StoreError};
use crate::{prelude::*, registry::ManagedKind, resource::ManagedResource};

/// A write issued against the [`MemoryStore`], successful or not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
	/// A create of the named managed resource.
	Create(ManagedKind, String),
	/// An update of the named managed resource.
	Update(ManagedKind, String),
	/// A status write of the named descriptor.
	UpdateStatus(String),
}

/// Kind, namespace and name of a managed resource.
type Key = (ManagedKind, String, String);

/// Everything the store holds, behind one lock.
#[derive(Default)]
struct Inner {
	/// Descriptors by namespace and name.
	descriptors: BTreeMap<(String, String), GenAIDeployment>,
	/// Managed resources by kind, namespace and name.
	resources: BTreeMap<Key, ManagedResource>,
	/// Every write attempted, in order.
	writes: Vec<Write>,
	/// Kinds of every managed resource lookup, in order.
	lookups: Vec<ManagedKind>,
	/// Failures waiting for a matching write.
	injected: VecDeque<(Write, StoreError)>,
	/// Last resource version handed out.
	next_version: u64,
}

/// Keeps objects in memory and behaves like the API server where the
/// reconciler can tell the difference: resource versions are checked on
/// update, names are unique on create and status writes leave the spec alone.
#[derive(Default)]
pub struct MemoryStore {
	/// The state of the store.
	inner: Mutex<Inner>,
}

impl MemoryStore {
	/// An empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a descriptor, replacing any previous one of the same name.
	pub fn put_descriptor(&self, descriptor: GenAIDeployment) {
		let mut inner = self.inner.lock().unwrap();
		let key = (
			descriptor.namespace().unwrap_or_default(),
			descriptor.name_any(),
		);
		inner.descriptors.insert(key, descriptor);
	}

	/// The stored descriptor `namespace/name`.
	pub fn descriptor(&self, namespace: &str, name: &str) -> Option<GenAIDeployment> {
		self.inner
			.lock()
			.unwrap()
			.descriptors
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	/// Stores a managed resource as if someone else had created it.
	pub fn put(&self, mut resource: ManagedResource) {
		let mut inner = self.inner.lock().unwrap();
		inner.next_version += 1;
		resource.meta_mut().resource_version = Some(inner.next_version.to_string());
		let key = key_of(&resource);
		inner.resources.insert(key, resource);
	}

	/// The stored managed resource, if any.
	pub fn resource(&self, kind: ManagedKind, namespace: &str, name: &str) -> Option<ManagedResource> {
		self.inner
			.lock()
			.unwrap()
			.resources
			.get(&(kind, namespace.to_string(), name.to_string()))
			.cloned()
	}

	/// Makes the next matching write fail with `error` instead of being
	/// applied.
	pub fn fail_next(&self, write: Write, error: StoreError) {
		self.inner
			.lock()
			.unwrap()
			.injected
			.push_back((write, error));
	}

	/// Every write attempted so far, in order.
	pub fn writes(&self) -> Vec<Write> {
		self.inner.lock().unwrap().writes.clone()
	}

	/// Kinds of every managed resource lookup so far, in order.
	pub fn lookups(&self) -> Vec<ManagedKind> {
		self.inner.lock().unwrap().lookups.clone()
	}

	/// Forgets the writes and lookups recorded so far.
	pub fn clear_log(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.writes.clear();
		inner.lookups.clear();
	}
}

/// Where `resource` is stored.
fn key_of(resource: &ManagedResource) -> Key {
	(
		resource.kind(),
		resource.namespace().unwrap_or_default(),
		resource.name(),
	)
}

impl Inner {
	/// Logs `write` and fails it if a matching failure was injected.
	fn record(&mut self, write: Write) -> Result<(), StoreError> {
		self.writes.push(write.clone());
		match self
			.injected
			.iter()
			.position(|(injected, _)| *injected == write)
		{
			Some(index) => Err(self
				.injected
				.remove(index)
				.map(|(_, error)| error)
				.unwrap_or(StoreError::Backend("injected".to_string()))),
			None => Ok(()),
		}
	}

	/// Hands out the next resource version.
	fn bump(&mut self) -> String {
		self.next_version += 1;
		self.next_version.to_string()
	}
}

#[async_trait]
impl StateStore for MemoryStore {
	async fn get_descriptor(
		&self,
		namespace: &str,
		name: &str,
	) -> Result<Option<GenAIDeployment>, StoreError> {
		Ok(self.descriptor(namespace, name))
	}

	async fn update_descriptor_status(
		&self,
		descriptor: &GenAIDeployment,
	) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		inner.record(Write::UpdateStatus(descriptor.name_any()))?;

		let key = (
			descriptor.namespace().unwrap_or_default(),
			descriptor.name_any(),
		);
		let version = inner.bump();
		let stored = inner
			.descriptors
			.get_mut(&key)
			.ok_or_else(|| StoreError::Backend("descriptor not found".to_string()))?;
		stored.status = descriptor.status.clone();
		stored.metadata.resource_version = Some(version);
		Ok(())
	}

	async fn get(
		&self,
		kind: ManagedKind,
		namespace: &str,
		name: &str,
	) -> Result<Option<ManagedResource>, StoreError> {
		self.inner.lock().unwrap().lookups.push(kind);
		Ok(self.resource(kind, namespace, name))
	}

	async fn create(&self, resource: &ManagedResource) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		inner.record(Write::Create(resource.kind(), resource.name()))?;

		let key = key_of(resource);
		if inner.resources.contains_key(&key) {
			return Err(StoreError::AlreadyExists);
		}
		let mut created = resource.clone();
		created.meta_mut().resource_version = Some(inner.bump());
		inner.resources.insert(key, created);
		Ok(())
	}

	async fn update(&self, resource: &ManagedResource) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		inner.record(Write::Update(resource.kind(), resource.name()))?;

		let key = key_of(resource);
		let current_version = inner
			.resources
			.get(&key)
			.ok_or_else(|| StoreError::Backend("not found".to_string()))?
			.meta()
			.resource_version
			.clone();
		if current_version != resource.meta().resource_version {
			return Err(StoreError::Conflict);
		}
		let mut updated = resource.clone();
		updated.meta_mut().resource_version = Some(inner.bump());
		inner.resources.insert(key, updated);
		Ok(())
	}
}
