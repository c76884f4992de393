//! AWS API request and response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// IAM types
// ============================================================================

/// An IAM role.
#[derive(Debug, Clone, Deserialize)]
pub struct IamRole {
    /// Role name.
    #[serde(rename = "RoleName")]
    pub role_name: String,
    /// Role ARN.
    #[serde(rename = "Arn")]
    pub arn: String,
}

/// An IAM customer-managed policy.
#[derive(Debug, Clone, Deserialize)]
pub struct IamPolicy {
    /// Policy name.
    #[serde(rename = "PolicyName")]
    pub policy_name: String,
    /// Policy ARN.
    #[serde(rename = "Arn")]
    pub arn: String,
}

/// Get/Create role response envelope.
#[derive(Debug, Deserialize)]
pub struct RoleResponse {
    /// The role.
    #[serde(rename = "Role")]
    pub role: IamRole,
}

/// Create policy response envelope.
#[derive(Debug, Deserialize)]
pub struct PolicyResponse {
    /// The policy.
    #[serde(rename = "Policy")]
    pub policy: IamPolicy,
}

/// List policies response.
#[derive(Debug, Deserialize)]
pub struct ListPoliciesResponse {
    /// Customer-managed policies.
    #[serde(rename = "Policies", default)]
    pub policies: Vec<IamPolicy>,
}

/// A policy attached to a role.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachedPolicy {
    /// Policy name.
    #[serde(rename = "PolicyName")]
    pub policy_name: String,
    /// Policy ARN.
    #[serde(rename = "PolicyArn")]
    pub policy_arn: String,
}

/// List attached role policies response.
#[derive(Debug, Deserialize)]
pub struct ListAttachedRolePoliciesResponse {
    /// Attached policies.
    #[serde(rename = "AttachedPolicies", default)]
    pub attached_policies: Vec<AttachedPolicy>,
}

// ============================================================================
// EC2 (VPC) types
// ============================================================================

/// A VPC.
#[derive(Debug, Clone, Deserialize)]
pub struct Vpc {
    /// VPC ID.
    #[serde(rename = "VpcId")]
    pub vpc_id: String,
    /// Address block.
    #[serde(rename = "CidrBlock")]
    pub cidr_block: String,
    /// Lifecycle state.
    #[serde(rename = "State")]
    pub state: String,
}

/// Create VPC response envelope.
#[derive(Debug, Deserialize)]
pub struct CreateVpcResponse {
    /// The VPC.
    #[serde(rename = "Vpc")]
    pub vpc: Vpc,
}

/// Describe VPCs response.
#[derive(Debug, Deserialize)]
pub struct DescribeVpcsResponse {
    /// Matching VPCs.
    #[serde(rename = "Vpcs", default)]
    pub vpcs: Vec<Vpc>,
}

/// A subnet.
#[derive(Debug, Clone, Deserialize)]
pub struct Subnet {
    /// Subnet ID.
    #[serde(rename = "SubnetId")]
    pub subnet_id: String,
    /// VPC the subnet belongs to.
    #[serde(rename = "VpcId")]
    pub vpc_id: String,
    /// Address block.
    #[serde(rename = "CidrBlock")]
    pub cidr_block: String,
    /// Availability zone.
    #[serde(rename = "AvailabilityZone")]
    pub availability_zone: String,
    /// Tags.
    #[serde(rename = "Tags", default)]
    pub tags: Vec<Tag>,
}

/// Create subnet response envelope.
#[derive(Debug, Deserialize)]
pub struct CreateSubnetResponse {
    /// The subnet.
    #[serde(rename = "Subnet")]
    pub subnet: Subnet,
}

/// Describe subnets response.
#[derive(Debug, Deserialize)]
pub struct DescribeSubnetsResponse {
    /// Matching subnets.
    #[serde(rename = "Subnets", default)]
    pub subnets: Vec<Subnet>,
}

/// An availability zone.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityZone {
    /// Zone name (e.g. `us-east-1a`).
    #[serde(rename = "ZoneName")]
    pub zone_name: String,
    /// Zone state.
    #[serde(rename = "State")]
    pub state: String,
}

/// Describe availability zones response.
#[derive(Debug, Deserialize)]
pub struct DescribeAvailabilityZonesResponse {
    /// Zones in the region.
    #[serde(rename = "AvailabilityZones", default)]
    pub availability_zones: Vec<AvailabilityZone>,
}

/// Resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key.
    #[serde(rename = "Key")]
    pub key: String,
    /// Tag value.
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    /// Convenience constructor.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// EKS types
// ============================================================================

/// EKS cluster information.
#[derive(Debug, Clone, Deserialize)]
pub struct EksCluster {
    /// Cluster name.
    pub name: String,
    /// Cluster ARN.
    pub arn: String,
    /// Kubernetes version.
    pub version: Option<String>,
    /// Cluster status.
    pub status: String,
    /// API server endpoint.
    pub endpoint: Option<String>,
    /// VPC configuration.
    #[serde(rename = "resourcesVpcConfig")]
    pub resources_vpc_config: Option<VpcConfig>,
}

/// VPC configuration of an existing cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct VpcConfig {
    /// Subnet IDs.
    #[serde(rename = "subnetIds")]
    pub subnet_ids: Option<Vec<String>>,
    /// VPC ID.
    #[serde(rename = "vpcId")]
    pub vpc_id: Option<String>,
    /// Public access enabled.
    #[serde(rename = "endpointPublicAccess")]
    pub endpoint_public_access: Option<bool>,
    /// Private access enabled.
    #[serde(rename = "endpointPrivateAccess")]
    pub endpoint_private_access: Option<bool>,
}

/// Describe cluster response envelope.
#[derive(Debug, Deserialize)]
pub struct ClusterResponse {
    /// The cluster.
    pub cluster: EksCluster,
}

/// Cluster access configuration.
#[derive(Debug, Serialize)]
pub struct AccessConfig {
    /// Authentication mode; API-based access entries rather than the legacy
    /// aws-auth config map.
    #[serde(rename = "authenticationMode")]
    pub authentication_mode: String,
}

/// Create cluster request.
#[derive(Debug, Serialize)]
pub struct CreateClusterRequest {
    /// Cluster name.
    pub name: String,
    /// Cluster service role ARN.
    #[serde(rename = "roleArn")]
    pub role_arn: String,
    /// VPC configuration.
    #[serde(rename = "resourcesVpcConfig")]
    pub resources_vpc_config: CreateVpcConfig,
    /// Access configuration.
    #[serde(rename = "accessConfig")]
    pub access_config: AccessConfig,
    /// Baseline compute pool instance class.
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    /// Baseline compute pool scaling envelope.
    #[serde(rename = "scalingConfig")]
    pub scaling_config: ScalingConfig,
    /// Whether baseline nodes receive public addresses.
    #[serde(rename = "nodeAssociatePublicIpAddress")]
    pub node_associate_public_ip_address: bool,
}

/// VPC configuration for cluster creation.
#[derive(Debug, Serialize)]
pub struct CreateVpcConfig {
    /// Subnet IDs.
    #[serde(rename = "subnetIds")]
    pub subnet_ids: Vec<String>,
    /// Enable public API access.
    #[serde(rename = "endpointPublicAccess")]
    pub endpoint_public_access: bool,
    /// Enable private API access.
    #[serde(rename = "endpointPrivateAccess")]
    pub endpoint_private_access: bool,
}

/// Scaling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Minimum size.
    #[serde(rename = "minSize")]
    pub min_size: i32,
    /// Maximum size.
    #[serde(rename = "maxSize")]
    pub max_size: i32,
    /// Desired size.
    #[serde(rename = "desiredSize")]
    pub desired_size: i32,
}

/// EKS node group.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeGroup {
    /// Node group name.
    #[serde(rename = "nodegroupName")]
    pub nodegroup_name: String,
    /// Cluster name.
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    /// Node group ARN.
    #[serde(rename = "nodegroupArn")]
    pub nodegroup_arn: String,
    /// Status.
    pub status: String,
    /// Instance types.
    #[serde(rename = "instanceTypes")]
    pub instance_types: Option<Vec<String>>,
    /// Scaling configuration.
    #[serde(rename = "scalingConfig")]
    pub scaling_config: Option<ScalingConfig>,
    /// Node labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Node taints.
    #[serde(default)]
    pub taints: Vec<NodeGroupTaint>,
}

/// Describe node group response envelope.
#[derive(Debug, Deserialize)]
pub struct NodeGroupResponse {
    /// The node group.
    pub nodegroup: NodeGroup,
}

/// Node group taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroupTaint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    pub value: String,
    /// Effect in EKS spelling (e.g. `NO_SCHEDULE`).
    pub effect: String,
}

/// Create node group request.
#[derive(Debug, Serialize)]
pub struct CreateNodeGroupRequest {
    /// Node group name.
    #[serde(rename = "nodegroupName")]
    pub nodegroup_name: String,
    /// Node role ARN.
    #[serde(rename = "nodeRole")]
    pub node_role: String,
    /// Subnet IDs.
    pub subnets: Vec<String>,
    /// Instance types.
    #[serde(rename = "instanceTypes")]
    pub instance_types: Vec<String>,
    /// Scaling configuration.
    #[serde(rename = "scalingConfig")]
    pub scaling_config: ScalingConfig,
    /// AMI type.
    #[serde(rename = "amiType")]
    pub ami_type: String,
    /// Disk size in GiB.
    #[serde(rename = "diskSize")]
    pub disk_size: i32,
    /// Node labels.
    pub labels: BTreeMap<String, String>,
    /// Node taints.
    pub taints: Vec<NodeGroupTaint>,
    /// Resource tags.
    pub tags: BTreeMap<String, String>,
}
