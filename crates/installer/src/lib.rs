//! Trainstack installer.
//!
//! Ties the cloud provisioners and the in-cluster deployers into one
//! workflow:
//!
//! ```text
//! role ──────────────┐
//!                    ▼
//! network ──► cluster ──► GPU pool ──► device plugin
//!                    │         └─────► workload
//!                    └── kubeconfig ──► cluster client
//! ```
//!
//! Configuration comes from a TOML file with sensible defaults; outputs are
//! the cluster credentials and the network identifier.

pub mod config;
pub mod stack;

pub use config::{GpuPoolConfig, StackConfig, WorkloadConfig};
pub use stack::{ProvisionedInfra, Stack, StackOutputs};
