//! Managed cluster provisioning.
//!
//! Validates capacity bounds and API exposure before any provider call,
//! creates the cluster bound to the network with a baseline autoscaling
//! pool, and waits for it to become active so dependents can consume the
//! returned handle without polling themselves.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use trainstack_common::CapacityBounds;

use crate::client::AwsApi;
use crate::error::ProvisionError;
use crate::models::{CreateVpcConfig, EksCluster, ScalingConfig};
use crate::network::NetworkHandle;

/// How long to wait for a created cluster to become active.
const CLUSTER_READY_TIMEOUT_SECS: u64 = 1800;

/// Polling interval while waiting for the cluster.
const POLL_INTERVAL_SECS: u64 = 15;

/// API endpoint exposure of the cluster.
///
/// The unreachable combination (neither public nor private) is rejected at
/// construction and cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMode {
    /// Public endpoint only.
    Public,
    /// Private endpoint only.
    Private,
    /// Both endpoints.
    Both,
}

impl ExposureMode {
    /// Build from a flag pair.
    ///
    /// # Errors
    /// Returns a validation error for (false, false), since the cluster
    /// would be unreachable.
    pub fn from_flags(public: bool, private: bool) -> Result<Self, ProvisionError> {
        match (public, private) {
            (true, false) => Ok(Self::Public),
            (false, true) => Ok(Self::Private),
            (true, true) => Ok(Self::Both),
            (false, false) => Err(ProvisionError::Validation(
                "cluster endpoint must be public, private, or both".to_string(),
            )),
        }
    }

    /// Whether the public endpoint is enabled.
    #[must_use]
    pub fn public_access(&self) -> bool {
        matches!(self, Self::Public | Self::Both)
    }

    /// Whether the private endpoint is enabled.
    #[must_use]
    pub fn private_access(&self) -> bool {
        matches!(self, Self::Private | Self::Both)
    }
}

impl std::fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for ExposureMode {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "both" => Ok(Self::Both),
            _ => Err(ProvisionError::Validation(format!(
                "unknown exposure mode: {s}. Supported: public, private, both"
            ))),
        }
    }
}

/// Stable handle to a provisioned, active cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHandle {
    /// Cluster name.
    pub name: String,
    /// Cluster ARN.
    pub arn: String,
    /// API server endpoint.
    pub endpoint: String,
    /// Access credentials for cluster clients.
    pub kubeconfig: String,
}

/// Create (or adopt) the managed cluster and wait for it to become active.
///
/// # Errors
/// Returns a validation error before any provider call for inverted
/// capacity bounds; provider errors propagate unchanged; times out if the
/// cluster does not become active.
pub async fn create_cluster(
    api: &dyn AwsApi,
    name: &str,
    network: &NetworkHandle,
    instance_class: &str,
    bounds: CapacityBounds,
    exposure: ExposureMode,
    region: &str,
) -> Result<ClusterHandle, ProvisionError> {
    bounds.validate()?;

    let existing = api.describe_cluster(name).await?;
    if let Some(ref cluster) = existing {
        info!(cluster_name = %name, status = %cluster.status, "Cluster already exists, adopting");
    } else {
        api.create_cluster(
            name,
            CreateVpcConfig {
                subnet_ids: network.all_subnet_ids(),
                endpoint_public_access: exposure.public_access(),
                endpoint_private_access: exposure.private_access(),
            },
            instance_class,
            ScalingConfig {
                min_size: bounds.min,
                max_size: bounds.max,
                desired_size: bounds.desired,
            },
        )
        .await?;
    }

    let cluster = wait_cluster_active(api, name).await?;
    let endpoint = cluster.endpoint.clone().ok_or_else(|| {
        ProvisionError::Config(format!("cluster {name} is active but has no endpoint"))
    })?;
    let kubeconfig = kubeconfig_for(name, &endpoint, region);

    Ok(ClusterHandle {
        name: cluster.name,
        arn: cluster.arn,
        endpoint,
        kubeconfig,
    })
}

/// Poll until the cluster reports ACTIVE.
async fn wait_cluster_active(
    api: &dyn AwsApi,
    name: &str,
) -> Result<EksCluster, ProvisionError> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(CLUSTER_READY_TIMEOUT_SECS);

    loop {
        let cluster = api
            .describe_cluster(name)
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("cluster not found: {name}")))?;

        debug!(
            cluster_name = %name,
            status = %cluster.status,
            elapsed_secs = start.elapsed().as_secs(),
            "Polling cluster status"
        );

        match cluster.status.as_str() {
            "ACTIVE" => {
                info!(cluster_name = %name, "Cluster is active");
                return Ok(cluster);
            }
            "FAILED" => {
                return Err(ProvisionError::Api {
                    status: 500,
                    message: format!("cluster {name} entered FAILED state"),
                });
            }
            _ => {}
        }

        if start.elapsed() > timeout {
            return Err(ProvisionError::Timeout(CLUSTER_READY_TIMEOUT_SECS));
        }

        tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
    }
}

/// Generate access credentials for the cluster.
fn kubeconfig_for(name: &str, endpoint: &str, region: &str) -> String {
    format!(
        r"apiVersion: v1
kind: Config
clusters:
- cluster:
    server: {endpoint}
  name: {name}
contexts:
- context:
    cluster: {name}
    user: {name}
  name: {name}
current-context: {name}
users:
- name: {name}
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1beta1
      command: aws
      args:
        - eks
        - get-token
        - --cluster-name
        - {name}
        - --region
        - {region}
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAwsApi;

    fn network() -> NetworkHandle {
        NetworkHandle {
            vpc_id: "vpc-123".to_string(),
            cidr: "10.0.0.0/16".to_string(),
            public_subnet_ids: vec!["subnet-1".to_string()],
            private_subnet_ids: vec!["subnet-2".to_string()],
        }
    }

    fn active_cluster(name: &str) -> EksCluster {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "arn": format!("arn:aws:eks:us-east-1:123456789012:cluster/{name}"),
            "status": "ACTIVE",
            "endpoint": "https://example.eks.amazonaws.com",
        }))
        .unwrap()
    }

    #[test]
    fn unreachable_exposure_is_rejected() {
        assert!(matches!(
            ExposureMode::from_flags(false, false),
            Err(ProvisionError::Validation(_))
        ));
        assert_eq!(
            ExposureMode::from_flags(true, false).unwrap(),
            ExposureMode::Public
        );
        assert_eq!(
            ExposureMode::from_flags(true, true).unwrap(),
            ExposureMode::Both
        );
    }

    #[test]
    fn exposure_mode_round_trips_from_str() {
        assert_eq!("public".parse::<ExposureMode>().unwrap(), ExposureMode::Public);
        assert_eq!("BOTH".parse::<ExposureMode>().unwrap(), ExposureMode::Both);
        assert!("nowhere".parse::<ExposureMode>().is_err());
    }

    #[tokio::test]
    async fn inverted_bounds_make_no_provider_calls() {
        let mut api = MockAwsApi::new();
        api.expect_describe_cluster().never();
        api.expect_create_cluster().never();

        let bounds = CapacityBounds {
            min: 6,
            desired: 3,
            max: 3,
        };
        let err = create_cluster(
            &api,
            "training",
            &network(),
            "t3.medium",
            bounds,
            ExposureMode::Public,
            "us-east-1",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[tokio::test]
    async fn fresh_cluster_is_created_and_waited_on() {
        let mut api = MockAwsApi::new();
        let mut described = false;
        api.expect_describe_cluster().returning(move |name| {
            if described {
                Ok(Some(active_cluster(name)))
            } else {
                described = true;
                Ok(None)
            }
        });
        api.expect_create_cluster()
            .withf(|name, vpc, instance, scaling| {
                name == "training"
                    && vpc.subnet_ids == vec!["subnet-1", "subnet-2"]
                    && vpc.endpoint_public_access
                    && !vpc.endpoint_private_access
                    && instance == "t3.medium"
                    && scaling.min_size == 3
                    && scaling.desired_size == 3
                    && scaling.max_size == 6
            })
            .returning(|name, _, _, _| {
                Ok(serde_json::from_value(serde_json::json!({
                    "name": name,
                    "arn": format!("arn:aws:eks:us-east-1:123456789012:cluster/{name}"),
                    "status": "CREATING",
                }))
                .unwrap())
            });

        let handle = create_cluster(
            &api,
            "training",
            &network(),
            "t3.medium",
            CapacityBounds::new(3, 3, 6).unwrap(),
            ExposureMode::Public,
            "us-east-1",
        )
        .await
        .unwrap();

        assert_eq!(handle.name, "training");
        assert_eq!(handle.endpoint, "https://example.eks.amazonaws.com");
        assert!(handle.kubeconfig.contains("server: https://example.eks.amazonaws.com"));
        assert!(handle.kubeconfig.contains("--cluster-name"));
        assert!(handle.kubeconfig.contains("us-east-1"));
    }

    #[tokio::test]
    async fn existing_cluster_is_adopted_without_create() {
        let mut api = MockAwsApi::new();
        api.expect_describe_cluster()
            .returning(|name| Ok(Some(active_cluster(name))));
        api.expect_create_cluster().never();

        let handle = create_cluster(
            &api,
            "training",
            &network(),
            "t3.medium",
            CapacityBounds::new(3, 3, 6).unwrap(),
            ExposureMode::Both,
            "us-east-1",
        )
        .await
        .unwrap();
        assert_eq!(handle.name, "training");
    }
}
