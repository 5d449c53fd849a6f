//! Durable identity store.
//!
//! Maps provider-namespaced descriptor ids (`"{provider}:{internal}"`) to
//! durable face ids, and durable engine ids to the provider that serves
//! them. Providers only ever see their own internal ids; callers only ever
//! see durable ids.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

/// An engine known to the system and the provider that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRecord {
    pub engine_id: Uuid,
    /// Provider identity (`"{engine_type}-{major}-{minor}-{patch}"`).
    pub provider: String,
}

/// A durable face and the descriptors that represent it in engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub face_id: Uuid,
    pub engine_id: Uuid,
    pub descriptors: Vec<String>,
}

/// Persistence of engines, faces and descriptors.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolves a durable engine id.
    async fn get_engine(&self, engine_id: Uuid) -> Result<Option<EngineRecord>, IdentityError>;

    /// Creates a durable face with a single descriptor and returns its id.
    async fn create_face(&self, engine_id: Uuid, descriptor_id: &str)
        -> Result<Uuid, IdentityError>;

    /// Finds the durable face owning a descriptor.
    async fn get_face_by_descriptor(&self, descriptor_id: &str)
        -> Result<Option<Uuid>, IdentityError>;

    async fn get_face(&self, face_id: Uuid) -> Result<Option<FaceRecord>, IdentityError>;

    /// Descriptor ids of a face, or `None` if the face does not exist.
    async fn list_descriptors(&self, face_id: Uuid) -> Result<Option<Vec<String>>, IdentityError>;

    /// Deletes a face and its descriptors. Returns `false` if it did not
    /// exist.
    async fn delete_face(&self, face_id: Uuid) -> Result<bool, IdentityError>;
}

#[derive(Debug, Default)]
struct Inner {
    engines: HashMap<Uuid, EngineRecord>,
    faces: HashMap<Uuid, FaceRecord>,
    by_descriptor: HashMap<String, Uuid>,
}

/// Process-local [`IdentityStore`].
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<Inner>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an engine served by `provider` and returns its id.
    pub fn add_engine(&self, provider: impl Into<String>) -> Uuid {
        let engine_id = Uuid::new_v4();
        self.inner.write().engines.insert(
            engine_id,
            EngineRecord {
                engine_id,
                provider: provider.into(),
            },
        );
        engine_id
    }

    /// Attaches another descriptor to an existing face.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Backend`] if the face does not exist.
    pub fn add_descriptor(
        &self,
        face_id: Uuid,
        descriptor_id: impl Into<String>,
    ) -> Result<(), IdentityError> {
        let descriptor_id = descriptor_id.into();
        let mut inner = self.inner.write();
        let face = inner
            .faces
            .get_mut(&face_id)
            .ok_or_else(|| IdentityError::Backend(format!("no such face {face_id}")))?;
        face.descriptors.push(descriptor_id.clone());
        inner.by_descriptor.insert(descriptor_id, face_id);
        Ok(())
    }

    /// Creates a face with no descriptors.
    pub fn add_empty_face(&self, engine_id: Uuid) -> Uuid {
        let face_id = Uuid::new_v4();
        self.inner.write().faces.insert(
            face_id,
            FaceRecord {
                face_id,
                engine_id,
                descriptors: Vec::new(),
            },
        );
        face_id
    }

    pub fn face_count(&self) -> usize {
        self.inner.read().faces.len()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn get_engine(&self, engine_id: Uuid) -> Result<Option<EngineRecord>, IdentityError> {
        Ok(self.inner.read().engines.get(&engine_id).cloned())
    }

    async fn create_face(
        &self,
        engine_id: Uuid,
        descriptor_id: &str,
    ) -> Result<Uuid, IdentityError> {
        let mut inner = self.inner.write();
        if !inner.engines.contains_key(&engine_id) {
            return Err(IdentityError::UnknownEngine(engine_id));
        }
        let face_id = Uuid::new_v4();
        inner.faces.insert(
            face_id,
            FaceRecord {
                face_id,
                engine_id,
                descriptors: vec![descriptor_id.to_string()],
            },
        );
        inner.by_descriptor.insert(descriptor_id.to_string(), face_id);
        tracing::debug!(%face_id, descriptor = descriptor_id, "face created");
        Ok(face_id)
    }

    async fn get_face_by_descriptor(
        &self,
        descriptor_id: &str,
    ) -> Result<Option<Uuid>, IdentityError> {
        Ok(self.inner.read().by_descriptor.get(descriptor_id).copied())
    }

    async fn get_face(&self, face_id: Uuid) -> Result<Option<FaceRecord>, IdentityError> {
        Ok(self.inner.read().faces.get(&face_id).cloned())
    }

    async fn list_descriptors(&self, face_id: Uuid) -> Result<Option<Vec<String>>, IdentityError> {
        Ok(self
            .inner
            .read()
            .faces
            .get(&face_id)
            .map(|face| face.descriptors.clone()))
    }

    async fn delete_face(&self, face_id: Uuid) -> Result<bool, IdentityError> {
        let mut inner = self.inner.write();
        let Some(face) = inner.faces.remove(&face_id) else {
            return Ok(false);
        };
        for descriptor in &face.descriptors {
            inner.by_descriptor.remove(descriptor);
        }
        Ok(true)
    }
}
