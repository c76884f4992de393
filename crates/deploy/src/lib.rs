//! In-cluster deployments for the trainstack GPU training stack.
//!
//! Two consumers of the GPU pool's scheduling contract live here:
//!
//! - the device plugin DaemonSet, which makes accelerators visible to the
//!   kubelet on every node the pool's label selects, and
//! - the training workload Deployment, which requests exactly one
//!   accelerator and must tolerate the pool's taint to land there.
//!
//! Both are checked against the [`trainstack_common::PoolContract`] at
//! construction time, so a taint/toleration or label/selector mismatch is a
//! local error rather than a pod stuck in `Pending`.

pub mod device_plugin;
pub mod error;
pub mod quantity;
pub mod workload;

pub use device_plugin::{
    build_daemonset, deploy_device_plugin, DevicePluginSpec, DEVICE_PLUGIN_IMAGE,
};
pub use error::DeployError;
pub use workload::{build_deployment, deploy_workload, ResourceSpec, WorkloadSpec};
