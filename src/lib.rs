//! # faceapi
//!
//! Task orchestration over pluggable face-recognition engines.
//!
//! Engines are slow, so every operation (enroll, quality, liveness, best
//! match, match against a known face) is submitted as a task and executed
//! in the background. The caller gets a task id back immediately and polls
//! for the terminal record.
//!
//! ```text
//!  TaskService ──validate──▶ TaskStore (queued)
//!       │
//!       └─ tokio::spawn ─▶ Orchestrator ──▶ Provider (engine)
//!                              │   │
//!                              │   └──▶ IdentityStore (internal id ⇄ durable id)
//!                              └──▶ TaskStore (started, then finished | failed)
//! ```
//!
//! - [`provider`]: the [`Provider`](provider::Provider) contract, bundled
//!   engines and the [`ProviderRegistry`](provider::ProviderRegistry) that
//!   loads them from a provider namespace directory.
//! - [`orchestrator`]: runs one operation and writes its records.
//! - [`aggregate`]: reduces per-descriptor match outcomes.
//! - [`identity`]: durable faces, descriptors and engines.
//! - [`service`]: request validation and task dispatch.
//! - [`config`]: application configuration.
//!
//! Task records and the result store live in [`faceapi_tasks`], re-exported
//! here as [`tasks`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use faceapi::config::AppConfig;
//! use faceapi::identity::InMemoryIdentityStore;
//! use faceapi::provider::{ProviderCatalog, ProviderRegistry};
//! use faceapi::service::TaskService;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_file("faceapi.toml")?;
//! let (registry, _report) = ProviderRegistry::from_config(&config, &ProviderCatalog::builtin())?;
//! let store = config.store.open_task_store().await?;
//!
//! let identity = Arc::new(InMemoryIdentityStore::new());
//! let engine_id = identity.add_engine("facenet-0-0-1");
//!
//! let service = TaskService::new(Arc::new(registry), store, identity);
//! let task_id = service.check_face_quality(engine_id, std::fs::read("face.jpg")?).await?;
//! let task = service.get_task_result(&task_id.to_string()).await?;
//! println!("{}", task.status());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod provider;
pub mod service;

pub use faceapi_tasks as tasks;

pub use error::{ConfigError, IdentityError, RegistryError, ServiceError};
