//! Stack configuration types.
//!
//! Every knob has a default matching a small but real training stack, so an
//! empty configuration file provisions something sensible. Values here are
//! plain data; the provisioners revalidate everything they consume.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use trainstack_cloud::ExposureMode;
use trainstack_common::CapacityBounds;

/// Full stack configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    // Cluster identity
    /// Name of the cluster being provisioned.
    pub cluster_name: String,
    /// Region to provision in.
    pub region: String,

    // Network
    /// Address block of the isolated network.
    pub network_cidr: String,
    /// Whether DNS resolution is enabled on the network.
    pub dns_enabled: bool,

    // Baseline pool
    /// Minimum baseline node count.
    pub min_cluster_size: i32,
    /// Maximum baseline node count.
    pub max_cluster_size: i32,
    /// Desired baseline node count.
    pub desired_cluster_size: i32,
    /// Baseline instance class.
    pub node_instance_type: String,
    /// API endpoint exposure.
    pub exposure: ExposureMode,

    /// GPU pool sizing.
    pub gpu: GpuPoolConfig,

    /// Workload deployment.
    pub workload: WorkloadConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            cluster_name: "trainstack".to_string(),
            region: "us-east-1".to_string(),
            network_cidr: "10.0.0.0/16".to_string(),
            dns_enabled: true,
            min_cluster_size: 3,
            max_cluster_size: 6,
            desired_cluster_size: 3,
            node_instance_type: "t3.medium".to_string(),
            exposure: ExposureMode::Public,
            gpu: GpuPoolConfig::default(),
            workload: WorkloadConfig::default(),
        }
    }
}

/// GPU pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuPoolConfig {
    /// Node group name.
    pub pool_name: String,
    /// Eligible instance classes.
    pub instance_types: Vec<String>,
    /// Minimum node count.
    pub min_size: i32,
    /// Maximum node count.
    pub max_size: i32,
    /// Desired node count.
    pub desired_size: i32,
    /// Node disk size in GiB.
    pub disk_size_gb: i32,
}

impl Default for GpuPoolConfig {
    fn default() -> Self {
        Self {
            pool_name: "gpu-pool".to_string(),
            instance_types: vec!["g4dn.xlarge".to_string()],
            min_size: 1,
            max_size: 3,
            desired_size: 1,
            disk_size_gb: 500,
        }
    }
}

/// Workload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Deployment name.
    pub name: String,
    /// Namespace the workload is deployed into.
    pub namespace: String,
    /// Container image reference, supplied by the image build pipeline.
    pub image: String,
    /// Replica count.
    pub replicas: i32,
    /// CPU request.
    pub cpu_request: String,
    /// CPU limit.
    pub cpu_limit: String,
    /// Memory request.
    pub memory_request: String,
    /// Memory limit.
    pub memory_limit: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            name: "pytorch".to_string(),
            namespace: "default".to_string(),
            image: String::new(),
            replicas: 1,
            cpu_request: "2".to_string(),
            cpu_limit: "4".to_string(),
            memory_request: "2Gi".to_string(),
            memory_limit: "4Gi".to_string(),
        }
    }
}

impl StackConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Baseline pool scaling envelope.
    #[must_use]
    pub fn cluster_bounds(&self) -> CapacityBounds {
        CapacityBounds {
            min: self.min_cluster_size,
            desired: self.desired_cluster_size,
            max: self.max_cluster_size,
        }
    }

    /// GPU pool scaling envelope.
    #[must_use]
    pub fn gpu_bounds(&self) -> CapacityBounds {
        CapacityBounds {
            min: self.gpu.min_size,
            desired: self.gpu.desired_size,
            max: self.gpu.max_size,
        }
    }
}
