//! Cloud database mutations for Converge
//!
//! This crate wraps a REST task API for managed database instances and
//! drives each mutation through `converge-core`.
//!
//! # Features
//!
//! - Replication start/stop
//! - SSL toggle
//! - Master switch (replica promotion)
//! - Parameter apply
//! - Security group / read-only group / parameter template attach and detach
//! - Waiting for an instance to reach a given state
//!
//! # Example
//!
//! ```ignore
//! use converge_cloud::{CloudClient, CloudConfig, DatabaseService, StartReplication};
//! use converge_core::{ConvergeConfig, Converger};
//!
//! let client = CloudClient::new(CloudConfig::from_env()?)?;
//! let service = DatabaseService::new(Converger::new(ConvergeConfig::default()));
//!
//! let done = service
//!     .mutate(&client, &StartReplication::new("cdb-1a2b")?)
//!     .await?;
//! println!("{}", done);
//! ```

pub mod backend;
pub mod client;
pub mod error;
pub mod mutation;
pub mod service;

pub use backend::{CloudTaskBackend, InstanceStateBackend, TASK_BACKEND, task_status_map};
pub use client::{CloudClient, CloudConfig, InstanceInfo, Scalar, TaskReport, request_key};
pub use error::{CloudError, Result};
pub use mutation::{
    ApplyConfig, AttachResource, DetachResource, Mutation, ResourceKind, StartReplication,
    StopReplication, SwitchMaster, ToggleSsl,
};
pub use service::DatabaseService;
