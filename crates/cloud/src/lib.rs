//! AWS provisioning for the trainstack GPU training stack.
//!
//! This crate builds the cloud half of the stack as a dependency-ordered
//! workflow with typed handles:
//!
//! ```text
//! policy ──► role ─────────────┐
//!                              ▼
//! network ──► cluster ──► accelerator pool
//! ```
//!
//! Each provisioner validates its inputs before touching the provider,
//! adopts resources that already exist (re-running a converged workflow is a
//! no-op), and returns a handle its dependents take by reference, so any
//! correct scheduler, sequential or parallel, produces the same result.
//!
//! All provider I/O goes through the [`client::AwsApi`] trait; the
//! [`client::Aws`] implementation speaks the IAM, EC2, and EKS APIs.

pub mod client;
pub mod cluster;
pub mod error;
pub mod models;
pub mod network;
pub mod policy;
pub mod pool;
pub mod role;

pub use client::{Aws, AwsApi};
pub use cluster::{create_cluster, ClusterHandle, ExposureMode};
pub use error::ProvisionError;
pub use network::{create_network, validate_cidr, NetworkHandle};
pub use policy::{ecr_pull_policy, permission_policy, trust_policy, PolicyDocument};
pub use pool::{create_accelerator_pool, AcceleratorPoolSpec, PoolHandle};
pub use role::{create_node_role, RoleHandle, MANAGED_NODE_POLICY_ARNS};

#[cfg(any(test, feature = "mocks"))]
pub use client::MockAwsApi;
