//! AWS API client implementation.
//!
//! This client uses AWS SDK-style requests with IAM authentication. All
//! provisioning logic talks to it through the [`AwsApi`] trait so the
//! workflow can be exercised against mocks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::models::{
    AccessConfig, AttachedPolicy, AvailabilityZone, ClusterResponse, CreateClusterRequest,
    CreateNodeGroupRequest, CreateSubnetResponse, CreateVpcConfig, CreateVpcResponse,
    DescribeAvailabilityZonesResponse, DescribeSubnetsResponse, DescribeVpcsResponse, EksCluster,
    IamPolicy, IamRole, ListAttachedRolePoliciesResponse, ListPoliciesResponse, NodeGroup,
    NodeGroupResponse, PolicyResponse, RoleResponse, ScalingConfig, Subnet, Tag, Vpc,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// IAM query API version.
const IAM_API_VERSION: &str = "2010-05-08";

/// EC2 query API version.
const EC2_API_VERSION: &str = "2016-11-15";

/// Authentication mode for created clusters; API access entries, not the
/// legacy aws-auth config map.
const AUTHENTICATION_MODE: &str = "API";

/// Low-level AWS operations the provisioners are built on.
///
/// One method per wire call; idempotence and ordering live in the
/// provisioners, not here.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait AwsApi: Send + Sync {
    // ========================================================================
    // IAM operations
    // ========================================================================

    /// Look up a role by name; `None` if it does not exist.
    async fn get_role(&self, name: &str) -> Result<Option<IamRole>, ProvisionError>;

    /// Create a role with the given trust policy document.
    async fn create_role(
        &self,
        name: &str,
        assume_role_policy: &str,
    ) -> Result<IamRole, ProvisionError>;

    /// Create a customer-managed policy from a permission document.
    async fn create_policy(
        &self,
        name: &str,
        description: &str,
        document: &str,
    ) -> Result<IamPolicy, ProvisionError>;

    /// Look up a customer-managed policy by name; `None` if absent.
    async fn find_policy(&self, name: &str) -> Result<Option<IamPolicy>, ProvisionError>;

    /// List policies attached to a role.
    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<AttachedPolicy>, ProvisionError>;

    /// Attach a policy to a role.
    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProvisionError>;

    // ========================================================================
    // EC2 (VPC) operations
    // ========================================================================

    /// Create a VPC with the given address block and Name tag.
    async fn create_vpc(&self, cidr: &str, name: &str) -> Result<Vpc, ProvisionError>;

    /// Look up a VPC by Name tag; `None` if absent.
    async fn find_vpc(&self, name: &str) -> Result<Option<Vpc>, ProvisionError>;

    /// Enable or disable DNS support and hostnames on a VPC.
    async fn modify_vpc_attributes(
        &self,
        vpc_id: &str,
        dns_support: bool,
        dns_hostnames: bool,
    ) -> Result<(), ProvisionError>;

    /// List availability zones in the client's region.
    async fn describe_availability_zones(&self)
        -> Result<Vec<AvailabilityZone>, ProvisionError>;

    /// Create a subnet in a VPC.
    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: &str,
        availability_zone: &str,
        tags: Vec<Tag>,
    ) -> Result<Subnet, ProvisionError>;

    /// List subnets of a VPC.
    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<Subnet>, ProvisionError>;

    // ========================================================================
    // EKS operations
    // ========================================================================

    /// Look up a cluster by name; `None` if it does not exist.
    async fn describe_cluster(&self, name: &str) -> Result<Option<EksCluster>, ProvisionError>;

    /// Create a managed cluster with a baseline compute pool.
    async fn create_cluster(
        &self,
        name: &str,
        vpc_config: CreateVpcConfig,
        instance_type: &str,
        scaling: ScalingConfig,
    ) -> Result<EksCluster, ProvisionError>;

    /// Look up a node group by name; `None` if it does not exist.
    async fn describe_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<Option<NodeGroup>, ProvisionError>;

    /// Create a node group in a cluster.
    async fn create_nodegroup(
        &self,
        cluster_name: &str,
        req: CreateNodeGroupRequest,
    ) -> Result<NodeGroup, ProvisionError>;
}

/// AWS API client.
#[derive(Clone)]
pub struct Aws {
    /// HTTP client.
    client: Client,
    /// AWS access key ID.
    #[allow(dead_code)]
    access_key_id: String,
    /// AWS secret access key.
    #[allow(dead_code)]
    secret_access_key: String,
    /// AWS region.
    region: String,
    /// Service role ARN for created clusters.
    cluster_role_arn: Option<String>,
    /// Endpoint override, for tests.
    endpoint_override: Option<String>,
}

impl Aws {
    /// Create a new AWS client.
    ///
    /// # Arguments
    /// * `access_key_id` - AWS access key ID
    /// * `secret_access_key` - AWS secret access key
    /// * `region` - AWS region (e.g., "us-east-1")
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ProvisionError::Http)?;

        Ok(Self {
            client,
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            cluster_role_arn: None,
            endpoint_override: None,
        })
    }

    /// Set the cluster service role ARN.
    #[must_use]
    pub fn with_cluster_role(mut self, role_arn: impl Into<String>) -> Self {
        self.cluster_role_arn = Some(role_arn.into());
        self
    }

    /// Route all service endpoints to a fixed base URL. Test hook.
    #[must_use]
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint_override = Some(base_url.into());
        self
    }

    /// Get IAM API endpoint.
    fn iam_endpoint(&self) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| "https://iam.amazonaws.com".to_string())
    }

    /// Get EC2 API endpoint.
    fn ec2_endpoint(&self) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| format!("https://ec2.{}.amazonaws.com", self.region))
    }

    /// Get EKS API endpoint.
    fn eks_endpoint(&self) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| format!("https://eks.{}.amazonaws.com", self.region))
    }

    /// Sign and execute an AWS request.
    /// Note: In production, use aws-sigv4 crate for proper request signing.
    async fn aws_request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&impl serde::Serialize>,
    ) -> Result<T, ProvisionError> {
        let response = self.send(method, url, body).await?;
        self.handle_response(response).await
    }

    /// Execute an AWS request whose success response carries no body.
    async fn aws_request_empty(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&impl serde::Serialize>,
    ) -> Result<(), ProvisionError> {
        let response = self.send(method, url, body).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await?;
        Err(Self::status_error(status, text))
    }

    async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&impl serde::Serialize>,
    ) -> Result<reqwest::Response, ProvisionError> {
        debug!(url = %url, method = %method, "AWS request");

        // Note: This is a simplified implementation.
        // In production, implement AWS SigV4 signing.
        let mut request = self.client.request(method, url);

        request = request.header("Content-Type", "application/json").header(
            "X-Amz-Date",
            chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
        );

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Handle API response.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProvisionError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ProvisionError::Serialization(e)
            })
        } else {
            Err(Self::status_error(status, text))
        }
    }

    fn status_error(status: StatusCode, message: String) -> ProvisionError {
        if status == StatusCode::NOT_FOUND {
            ProvisionError::NotFound(message)
        } else {
            ProvisionError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl AwsApi for Aws {
    // ========================================================================
    // IAM operations
    // ========================================================================

    async fn get_role(&self, name: &str) -> Result<Option<IamRole>, ProvisionError> {
        let url = format!(
            "{}/?Action=GetRole&Version={IAM_API_VERSION}&RoleName={name}",
            self.iam_endpoint()
        );

        match self
            .aws_request::<RoleResponse>(reqwest::Method::GET, &url, None::<&()>)
            .await
        {
            Ok(response) => Ok(Some(response.role)),
            Err(ProvisionError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_role(
        &self,
        name: &str,
        assume_role_policy: &str,
    ) -> Result<IamRole, ProvisionError> {
        info!(role_name = %name, "Creating IAM role");

        let url = format!(
            "{}/?Action=CreateRole&Version={IAM_API_VERSION}",
            self.iam_endpoint()
        );
        let body = json!({
            "RoleName": name,
            "AssumeRolePolicyDocument": assume_role_policy,
        });

        let response: RoleResponse = self
            .aws_request(reqwest::Method::POST, &url, Some(&body))
            .await?;

        info!(role_name = %name, arn = %response.role.arn, "IAM role created");
        Ok(response.role)
    }

    async fn create_policy(
        &self,
        name: &str,
        description: &str,
        document: &str,
    ) -> Result<IamPolicy, ProvisionError> {
        info!(policy_name = %name, "Creating IAM policy");

        let url = format!(
            "{}/?Action=CreatePolicy&Version={IAM_API_VERSION}",
            self.iam_endpoint()
        );
        let body = json!({
            "PolicyName": name,
            "Description": description,
            "PolicyDocument": document,
        });

        let response: PolicyResponse = self
            .aws_request(reqwest::Method::POST, &url, Some(&body))
            .await?;

        info!(policy_name = %name, arn = %response.policy.arn, "IAM policy created");
        Ok(response.policy)
    }

    async fn find_policy(&self, name: &str) -> Result<Option<IamPolicy>, ProvisionError> {
        let url = format!(
            "{}/?Action=ListPolicies&Version={IAM_API_VERSION}&Scope=Local",
            self.iam_endpoint()
        );

        let response: ListPoliciesResponse = self
            .aws_request(reqwest::Method::GET, &url, None::<&()>)
            .await?;

        Ok(response
            .policies
            .into_iter()
            .find(|p| p.policy_name == name))
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<AttachedPolicy>, ProvisionError> {
        let url = format!(
            "{}/?Action=ListAttachedRolePolicies&Version={IAM_API_VERSION}&RoleName={role_name}",
            self.iam_endpoint()
        );

        let response: ListAttachedRolePoliciesResponse = self
            .aws_request(reqwest::Method::GET, &url, None::<&()>)
            .await?;

        Ok(response.attached_policies)
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProvisionError> {
        debug!(role_name = %role_name, policy_arn = %policy_arn, "Attaching role policy");

        let url = format!(
            "{}/?Action=AttachRolePolicy&Version={IAM_API_VERSION}",
            self.iam_endpoint()
        );
        let body = json!({
            "RoleName": role_name,
            "PolicyArn": policy_arn,
        });

        self.aws_request_empty(reqwest::Method::POST, &url, Some(&body))
            .await
    }

    // ========================================================================
    // EC2 (VPC) operations
    // ========================================================================

    async fn create_vpc(&self, cidr: &str, name: &str) -> Result<Vpc, ProvisionError> {
        info!(cidr = %cidr, name = %name, "Creating VPC");

        let url = format!(
            "{}/?Action=CreateVpc&Version={EC2_API_VERSION}",
            self.ec2_endpoint()
        );
        let body = json!({
            "CidrBlock": cidr,
            "TagSpecifications": [{
                "ResourceType": "vpc",
                "Tags": [{ "Key": "Name", "Value": name }],
            }],
        });

        let response: CreateVpcResponse = self
            .aws_request(reqwest::Method::POST, &url, Some(&body))
            .await?;

        info!(vpc_id = %response.vpc.vpc_id, "VPC created");
        Ok(response.vpc)
    }

    async fn find_vpc(&self, name: &str) -> Result<Option<Vpc>, ProvisionError> {
        let url = format!(
            "{}/?Action=DescribeVpcs&Version={EC2_API_VERSION}&Filter.1.Name=tag:Name&Filter.1.Value.1={name}",
            self.ec2_endpoint()
        );

        let response: DescribeVpcsResponse = self
            .aws_request(reqwest::Method::GET, &url, None::<&()>)
            .await?;

        Ok(response.vpcs.into_iter().next())
    }

    async fn modify_vpc_attributes(
        &self,
        vpc_id: &str,
        dns_support: bool,
        dns_hostnames: bool,
    ) -> Result<(), ProvisionError> {
        debug!(vpc_id = %vpc_id, dns_support, dns_hostnames, "Modifying VPC attributes");

        // One attribute per call, as the API requires.
        for (attribute, value) in [
            ("EnableDnsSupport", dns_support),
            ("EnableDnsHostnames", dns_hostnames),
        ] {
            let url = format!(
                "{}/?Action=ModifyVpcAttribute&Version={EC2_API_VERSION}&VpcId={vpc_id}",
                self.ec2_endpoint()
            );
            let body = json!({ (attribute): { "Value": value } });
            self.aws_request_empty(reqwest::Method::POST, &url, Some(&body))
                .await?;
        }

        Ok(())
    }

    async fn describe_availability_zones(
        &self,
    ) -> Result<Vec<AvailabilityZone>, ProvisionError> {
        let url = format!(
            "{}/?Action=DescribeAvailabilityZones&Version={EC2_API_VERSION}",
            self.ec2_endpoint()
        );

        let response: DescribeAvailabilityZonesResponse = self
            .aws_request(reqwest::Method::GET, &url, None::<&()>)
            .await?;

        Ok(response.availability_zones)
    }

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: &str,
        availability_zone: &str,
        tags: Vec<Tag>,
    ) -> Result<Subnet, ProvisionError> {
        debug!(vpc_id = %vpc_id, cidr = %cidr, az = %availability_zone, "Creating subnet");

        let url = format!(
            "{}/?Action=CreateSubnet&Version={EC2_API_VERSION}",
            self.ec2_endpoint()
        );
        let body = json!({
            "VpcId": vpc_id,
            "CidrBlock": cidr,
            "AvailabilityZone": availability_zone,
            "TagSpecifications": [{
                "ResourceType": "subnet",
                "Tags": tags,
            }],
        });

        let response: CreateSubnetResponse = self
            .aws_request(reqwest::Method::POST, &url, Some(&body))
            .await?;

        Ok(response.subnet)
    }

    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<Subnet>, ProvisionError> {
        let url = format!(
            "{}/?Action=DescribeSubnets&Version={EC2_API_VERSION}&Filter.1.Name=vpc-id&Filter.1.Value.1={vpc_id}",
            self.ec2_endpoint()
        );

        let response: DescribeSubnetsResponse = self
            .aws_request(reqwest::Method::GET, &url, None::<&()>)
            .await?;

        Ok(response.subnets)
    }

    // ========================================================================
    // EKS operations
    // ========================================================================

    async fn describe_cluster(&self, name: &str) -> Result<Option<EksCluster>, ProvisionError> {
        let url = format!("{}/clusters/{name}", self.eks_endpoint());

        match self
            .aws_request::<ClusterResponse>(reqwest::Method::GET, &url, None::<&()>)
            .await
        {
            Ok(response) => Ok(Some(response.cluster)),
            Err(ProvisionError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_cluster(
        &self,
        name: &str,
        vpc_config: CreateVpcConfig,
        instance_type: &str,
        scaling: ScalingConfig,
    ) -> Result<EksCluster, ProvisionError> {
        let role_arn = self.cluster_role_arn.as_ref().ok_or_else(|| {
            ProvisionError::Config("cluster service role ARN not configured".to_string())
        })?;

        info!(name = %name, instance_type = %instance_type, "Creating cluster");

        let body = CreateClusterRequest {
            name: name.to_string(),
            role_arn: role_arn.clone(),
            resources_vpc_config: vpc_config,
            access_config: AccessConfig {
                authentication_mode: AUTHENTICATION_MODE.to_string(),
            },
            instance_type: instance_type.to_string(),
            scaling_config: scaling,
            node_associate_public_ip_address: false,
        };

        let url = format!("{}/clusters", self.eks_endpoint());
        let response: ClusterResponse = self
            .aws_request(reqwest::Method::POST, &url, Some(&body))
            .await?;

        info!(
            cluster_name = %response.cluster.name,
            arn = %response.cluster.arn,
            "Cluster created"
        );
        Ok(response.cluster)
    }

    async fn describe_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<Option<NodeGroup>, ProvisionError> {
        let url = format!(
            "{}/clusters/{cluster_name}/node-groups/{nodegroup_name}",
            self.eks_endpoint()
        );

        match self
            .aws_request::<NodeGroupResponse>(reqwest::Method::GET, &url, None::<&()>)
            .await
        {
            Ok(response) => Ok(Some(response.nodegroup)),
            Err(ProvisionError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_nodegroup(
        &self,
        cluster_name: &str,
        req: CreateNodeGroupRequest,
    ) -> Result<NodeGroup, ProvisionError> {
        info!(
            cluster_name = %cluster_name,
            nodegroup_name = %req.nodegroup_name,
            "Creating node group"
        );

        let url = format!("{}/clusters/{cluster_name}/node-groups", self.eks_endpoint());
        let response: NodeGroupResponse = self
            .aws_request(reqwest::Method::POST, &url, Some(&req))
            .await?;

        info!(
            nodegroup_name = %response.nodegroup.nodegroup_name,
            arn = %response.nodegroup.nodegroup_arn,
            "Node group created"
        );
        Ok(response.nodegroup)
    }
}
