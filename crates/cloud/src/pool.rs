//! GPU node pool provisioning.
//!
//! Creates the accelerator-backed node group: bound to the cluster handle
//! (active by construction), running as the provisioned node identity,
//! placed on the network's private subnets, and carrying the scheduling
//! contract (labels + taints) its consumers check against. Exactly the
//! taints passed in are applied; nothing is invented here.

use serde::{Deserialize, Serialize};
use tracing::info;

use trainstack_common::{CapacityBounds, PoolContract};

use crate::client::AwsApi;
use crate::cluster::ClusterHandle;
use crate::error::ProvisionError;
use crate::models::{CreateNodeGroupRequest, NodeGroupTaint, ScalingConfig};
use crate::network::NetworkHandle;
use crate::role::RoleHandle;

/// AMI class for GPU nodes.
const GPU_AMI_TYPE: &str = "AL2023_x86_64_NVIDIA";

/// Sizing and placement of an accelerator pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorPoolSpec {
    /// Node group name.
    pub name: String,
    /// Eligible instance classes.
    pub instance_types: Vec<String>,
    /// Scaling envelope.
    pub bounds: CapacityBounds,
    /// Node disk size in GiB.
    pub disk_size_gb: i32,
    /// Autoscaler-relevant resource tags.
    pub tags: std::collections::BTreeMap<String, String>,
    /// Scheduling contract applied to every node.
    pub contract: PoolContract,
}

/// Stable handle to a provisioned accelerator pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHandle {
    /// Node group name.
    pub name: String,
    /// Node group ARN.
    pub arn: String,
    /// The scheduling contract the pool applies to its nodes.
    pub contract: PoolContract,
}

/// Create (or adopt) the accelerator pool.
///
/// # Errors
/// Returns a validation error before any provider call for inverted bounds,
/// an empty instance class set, or an empty taint set; provider errors
/// propagate unchanged.
pub async fn create_accelerator_pool(
    api: &dyn AwsApi,
    cluster: &ClusterHandle,
    identity: &RoleHandle,
    network: &NetworkHandle,
    spec: AcceleratorPoolSpec,
) -> Result<PoolHandle, ProvisionError> {
    spec.bounds.validate()?;
    if spec.instance_types.is_empty() {
        return Err(ProvisionError::Validation(
            "accelerator pool requires at least one instance class".to_string(),
        ));
    }
    if spec.contract.taints.is_empty() {
        return Err(ProvisionError::Validation(
            "accelerator pool requires at least one taint".to_string(),
        ));
    }

    if let Some(existing) = api.describe_nodegroup(&cluster.name, &spec.name).await? {
        info!(
            nodegroup_name = %existing.nodegroup_name,
            status = %existing.status,
            "Accelerator pool already exists, adopting"
        );
        return Ok(PoolHandle {
            name: existing.nodegroup_name,
            arn: existing.nodegroup_arn,
            contract: spec.contract,
        });
    }

    let taints = spec
        .contract
        .taints
        .iter()
        .map(|t| NodeGroupTaint {
            key: t.key.clone(),
            value: t.value.clone(),
            effect: t.effect.as_eks_str().to_string(),
        })
        .collect();

    let request = CreateNodeGroupRequest {
        nodegroup_name: spec.name.clone(),
        node_role: identity.arn.clone(),
        subnets: network.private_subnet_ids.clone(),
        instance_types: spec.instance_types.clone(),
        scaling_config: ScalingConfig {
            min_size: spec.bounds.min,
            max_size: spec.bounds.max,
            desired_size: spec.bounds.desired,
        },
        ami_type: GPU_AMI_TYPE.to_string(),
        disk_size: spec.disk_size_gb,
        labels: spec.contract.labels.clone(),
        taints,
        tags: spec.tags.clone(),
    };

    let nodegroup = api.create_nodegroup(&cluster.name, request).await?;

    info!(
        nodegroup_name = %nodegroup.nodegroup_name,
        cluster_name = %cluster.name,
        "Accelerator pool created"
    );

    Ok(PoolHandle {
        name: nodegroup.nodegroup_name,
        arn: nodegroup.nodegroup_arn,
        contract: spec.contract,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::client::MockAwsApi;
    use trainstack_common::{
        autoscaler_cluster_tag, AUTOSCALER_ENABLED_TAG, GPU_NODE_LABEL_KEY, GPU_TAINT_KEY,
    };

    fn cluster() -> ClusterHandle {
        ClusterHandle {
            name: "training".to_string(),
            arn: "arn:aws:eks:us-east-1:123456789012:cluster/training".to_string(),
            endpoint: "https://example.eks.amazonaws.com".to_string(),
            kubeconfig: String::new(),
        }
    }

    fn identity() -> RoleHandle {
        RoleHandle {
            name: "node-role".to_string(),
            arn: "arn:aws:iam::123456789012:role/node-role".to_string(),
        }
    }

    fn network() -> NetworkHandle {
        NetworkHandle {
            vpc_id: "vpc-123".to_string(),
            cidr: "10.0.0.0/16".to_string(),
            public_subnet_ids: vec!["subnet-pub".to_string()],
            private_subnet_ids: vec!["subnet-priv".to_string()],
        }
    }

    fn spec() -> AcceleratorPoolSpec {
        AcceleratorPoolSpec {
            name: "gpu-pool".to_string(),
            instance_types: vec!["g4dn.xlarge".to_string()],
            bounds: CapacityBounds::new(1, 1, 3).unwrap(),
            disk_size_gb: 500,
            tags: BTreeMap::from([
                (AUTOSCALER_ENABLED_TAG.to_string(), "true".to_string()),
                (autoscaler_cluster_tag("training"), "owned".to_string()),
            ]),
            contract: PoolContract::gpu(),
        }
    }

    #[tokio::test]
    async fn pool_request_carries_the_contract() {
        let mut api = MockAwsApi::new();
        api.expect_describe_nodegroup().returning(|_, _| Ok(None));
        api.expect_create_nodegroup()
            .withf(|cluster_name, req| {
                cluster_name == "training"
                    && req.node_role == "arn:aws:iam::123456789012:role/node-role"
                    && req.subnets == vec!["subnet-priv"]
                    && req.labels.contains_key(GPU_NODE_LABEL_KEY)
                    && req.taints.len() == 1
                    && req.taints[0].key == GPU_TAINT_KEY
                    && req.taints[0].effect == "NO_SCHEDULE"
                    && req.ami_type == GPU_AMI_TYPE
                    && req.disk_size == 500
                    && req.tags.contains_key(AUTOSCALER_ENABLED_TAG)
            })
            .returning(|cluster_name, req| {
                Ok(serde_json::from_value(serde_json::json!({
                    "nodegroupName": req.nodegroup_name,
                    "clusterName": cluster_name,
                    "nodegroupArn": format!(
                        "arn:aws:eks:us-east-1:123456789012:nodegroup/{cluster_name}/{}",
                        req.nodegroup_name
                    ),
                    "status": "CREATING",
                }))
                .unwrap())
            });

        let handle = create_accelerator_pool(&api, &cluster(), &identity(), &network(), spec())
            .await
            .unwrap();
        assert_eq!(handle.name, "gpu-pool");
        assert_eq!(handle.contract, PoolContract::gpu());
    }

    #[tokio::test]
    async fn empty_taint_set_is_rejected_before_any_call() {
        let mut api = MockAwsApi::new();
        api.expect_describe_nodegroup().never();
        api.expect_create_nodegroup().never();

        let mut spec = spec();
        spec.contract.taints.clear();

        let err = create_accelerator_pool(&api, &cluster(), &identity(), &network(), spec)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[tokio::test]
    async fn inverted_bounds_are_rejected_before_any_call() {
        let mut api = MockAwsApi::new();
        api.expect_describe_nodegroup().never();

        let mut spec = spec();
        spec.bounds = CapacityBounds {
            min: 3,
            desired: 1,
            max: 3,
        };

        let err = create_accelerator_pool(&api, &cluster(), &identity(), &network(), spec)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[tokio::test]
    async fn existing_pool_is_adopted() {
        let mut api = MockAwsApi::new();
        api.expect_describe_nodegroup().returning(|cluster, name| {
            Ok(Some(
                serde_json::from_value(serde_json::json!({
                    "nodegroupName": name,
                    "clusterName": cluster,
                    "nodegroupArn": format!(
                        "arn:aws:eks:us-east-1:123456789012:nodegroup/{cluster}/{name}"
                    ),
                    "status": "ACTIVE",
                }))
                .unwrap(),
            ))
        });
        api.expect_create_nodegroup().never();

        let handle = create_accelerator_pool(&api, &cluster(), &identity(), &network(), spec())
            .await
            .unwrap();
        assert_eq!(handle.name, "gpu-pool");
    }
}
