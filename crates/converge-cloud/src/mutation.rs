//! Typed database mutations
//!
//! Each mutation validates its inputs at construction and converts into an
//! [`Operation`] for the converge loop. Nothing here talks to the network.

use crate::error::{CloudError, Result};
use converge_core::Operation;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

const MAX_ID_LEN: usize = 64;

/// A mutation that can be driven to convergence
pub trait Mutation: Send + Sync {
    /// Action name used in the API path and in per-operation settings
    fn action(&self) -> &'static str;

    /// Target instance
    fn instance_id(&self) -> &str;

    /// Request body
    fn params(&self) -> serde_json::Value;

    fn to_operation(&self) -> Operation {
        Operation::new(self.action(), self.instance_id()).with_params(self.params())
    }
}

fn validate_id(kind: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CloudError::InvalidRequest(format!("{} is empty", kind)));
    }
    if value.len() > MAX_ID_LEN {
        return Err(CloudError::InvalidRequest(format!(
            "{} is longer than {} characters: {}",
            kind, MAX_ID_LEN, value
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CloudError::InvalidRequest(format!(
            "{} contains invalid characters: {}",
            kind, value
        )));
    }
    Ok(value.to_string())
}

/// Start replication on a replica instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReplication {
    instance_id: String,
}

impl StartReplication {
    pub fn new(instance_id: &str) -> Result<Self> {
        Ok(Self {
            instance_id: validate_id("instance id", instance_id)?,
        })
    }
}

impl Mutation for StartReplication {
    fn action(&self) -> &'static str {
        "start-replication"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({})
    }
}

/// Stop replication on a replica instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReplication {
    instance_id: String,
}

impl StopReplication {
    pub fn new(instance_id: &str) -> Result<Self> {
        Ok(Self {
            instance_id: validate_id("instance id", instance_id)?,
        })
    }
}

impl Mutation for StopReplication {
    fn action(&self) -> &'static str {
        "stop-replication"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({})
    }
}

/// Enable or disable SSL on an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleSsl {
    instance_id: String,
    enabled: bool,
}

impl ToggleSsl {
    pub fn new(instance_id: &str, enabled: bool) -> Result<Self> {
        Ok(Self {
            instance_id: validate_id("instance id", instance_id)?,
            enabled,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Mutation for ToggleSsl {
    fn action(&self) -> &'static str {
        "toggle-ssl"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({ "enabled": self.enabled })
    }
}

/// Promote a replica to master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchMaster {
    instance_id: String,
    replica_id: String,
    force: bool,
}

impl SwitchMaster {
    pub fn new(instance_id: &str, replica_id: &str) -> Result<Self> {
        let instance_id = validate_id("instance id", instance_id)?;
        let replica_id = validate_id("replica id", replica_id)?;
        if instance_id == replica_id {
            return Err(CloudError::InvalidRequest(format!(
                "replica id must differ from instance id: {}",
                instance_id
            )));
        }
        Ok(Self {
            instance_id,
            replica_id,
            force: false,
        })
    }

    /// Switch even if the replica is lagging
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Mutation for SwitchMaster {
    fn action(&self) -> &'static str {
        "switch-master"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({ "replica_id": self.replica_id, "force": self.force })
    }
}

/// Apply database parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfig {
    instance_id: String,
    parameters: BTreeMap<String, String>,
    restart: bool,
}

impl ApplyConfig {
    pub fn new(instance_id: &str, parameters: BTreeMap<String, String>) -> Result<Self> {
        let instance_id = validate_id("instance id", instance_id)?;
        if parameters.is_empty() {
            return Err(CloudError::InvalidRequest(
                "at least one parameter is required".to_string(),
            ));
        }
        for name in parameters.keys() {
            validate_id("parameter name", name)?;
        }
        Ok(Self {
            instance_id,
            parameters,
            restart: false,
        })
    }

    /// Parse `name=value` pairs
    pub fn from_pairs<S: AsRef<str>>(instance_id: &str, pairs: &[S]) -> Result<Self> {
        let mut parameters = BTreeMap::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                CloudError::InvalidRequest(format!("expected name=value, got '{}'", pair))
            })?;
            parameters.insert(name.trim().to_string(), value.trim().to_string());
        }
        Self::new(instance_id, parameters)
    }

    /// Allow the backend to restart the instance if a parameter requires it
    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }
}

impl Mutation for ApplyConfig {
    fn action(&self) -> &'static str {
        "apply-config"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({ "parameters": self.parameters, "restart": self.restart })
    }
}

/// Resources that can be attached to an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    SecurityGroup,
    ReadOnlyGroup,
    ParameterTemplate,
}

impl ResourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "security-group" | "security_group" => Some(Self::SecurityGroup),
            "read-only-group" | "read_only_group" | "ro-group" => Some(Self::ReadOnlyGroup),
            "parameter-template" | "parameter_template" => Some(Self::ParameterTemplate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityGroup => "security-group",
            Self::ReadOnlyGroup => "read-only-group",
            Self::ParameterTemplate => "parameter-template",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attach a resource to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachResource {
    instance_id: String,
    kind: ResourceKind,
    resource_id: String,
}

impl AttachResource {
    pub fn new(instance_id: &str, kind: ResourceKind, resource_id: &str) -> Result<Self> {
        Ok(Self {
            instance_id: validate_id("instance id", instance_id)?,
            kind,
            resource_id: validate_id("resource id", resource_id)?,
        })
    }
}

impl Mutation for AttachResource {
    fn action(&self) -> &'static str {
        "attach-resource"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({ "kind": self.kind, "resource_id": self.resource_id })
    }
}

/// Detach a resource from an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachResource {
    instance_id: String,
    kind: ResourceKind,
    resource_id: String,
}

impl DetachResource {
    pub fn new(instance_id: &str, kind: ResourceKind, resource_id: &str) -> Result<Self> {
        Ok(Self {
            instance_id: validate_id("instance id", instance_id)?,
            kind,
            resource_id: validate_id("resource id", resource_id)?,
        })
    }
}

impl Mutation for DetachResource {
    fn action(&self) -> &'static str {
        "detach-resource"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn params(&self) -> serde_json::Value {
        json!({ "kind": self.kind, "resource_id": self.resource_id })
    }
}
