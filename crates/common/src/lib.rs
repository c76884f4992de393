//! Shared scheduling contract for the trainstack workspace.
//!
//! The GPU node pool (cloud side) and the in-cluster workloads (deploy side)
//! must agree character-for-character on a handful of strings: the label that
//! marks GPU nodes, the taint that reserves them, and the extended resource
//! name the device plugin advertises. Those literals live here as single
//! named constants so the two sides cannot drift.
//!
//! ```text
//! ┌──────────────────────┐         ┌──────────────────────────┐
//! │  GPU node pool       │         │  Device plugin / workload │
//! │  labels + taints ────┼── must ─┼── selector + tolerations  │
//! └──────────────────────┘  match  └──────────────────────────┘
//!             └───────── trainstack-common ─────────┘
//! ```

pub mod capacity;
pub mod scheduling;

pub use capacity::{CapacityBounds, InvalidBounds};
pub use scheduling::{PoolContract, Taint, TaintEffect, Toleration, TolerationOperator};

/// Label key applied to every node in the GPU pool; the device plugin
/// DaemonSet selects on it.
pub const GPU_NODE_LABEL_KEY: &str = "nvidia-device-plugin-enabled";

/// Label value paired with [`GPU_NODE_LABEL_KEY`].
pub const GPU_NODE_LABEL_VALUE: &str = "true";

/// Taint key reserving GPU nodes for accelerator workloads.
pub const GPU_TAINT_KEY: &str = "nvidia.com/gpu";

/// Taint value paired with [`GPU_TAINT_KEY`].
pub const GPU_TAINT_VALUE: &str = "true";

/// Extended resource name the device plugin advertises to the kubelet.
pub const GPU_RESOURCE: &str = "nvidia.com/gpu";

/// Node pool tag that opts the pool into cluster-autoscaler discovery.
pub const AUTOSCALER_ENABLED_TAG: &str = "k8s.io/cluster-autoscaler/enabled";

/// Node pool tag scoping autoscaler discovery to one cluster.
#[must_use]
pub fn autoscaler_cluster_tag(cluster_name: &str) -> String {
    format!("k8s.io/cluster-autoscaler/{cluster_name}")
}

/// The label set the GPU pool applies to its nodes.
#[must_use]
pub fn gpu_node_labels() -> std::collections::BTreeMap<String, String> {
    std::collections::BTreeMap::from([(
        GPU_NODE_LABEL_KEY.to_string(),
        GPU_NODE_LABEL_VALUE.to_string(),
    )])
}
