//! Compute-node role provisioning.
//!
//! Builds the identity worker nodes run as: a role trusted by the compute
//! service principal, the platform's managed worker-node grants, and one
//! role-scoped image-pull grant. Attachment is idempotent per grant; a
//! failure attaching one grant never rolls back the grants already attached,
//! and re-invocation converges on the same attachment set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::AwsApi;
use crate::error::ProvisionError;
use crate::policy::{self, EC2_SERVICE_PRINCIPAL};

/// Managed capability grants every worker-node role carries.
pub const MANAGED_NODE_POLICY_ARNS: [&str; 4] = [
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
    "arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore",
];

/// Stable handle to a provisioned role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleHandle {
    /// Role name.
    pub name: String,
    /// Role ARN.
    pub arn: String,
}

/// Name of the role-scoped image-pull grant.
#[must_use]
pub fn ecr_policy_name(role_name: &str) -> String {
    format!("{role_name}-ecr-policy")
}

/// Create (or adopt) the worker-node role and converge its grant set.
///
/// Attaches every managed grant in [`MANAGED_NODE_POLICY_ARNS`] plus a
/// role-scoped grant built from the image-pull allow-list. Already-attached
/// grants are skipped; an attach rejected as already-attached is a no-op.
///
/// # Errors
/// Propagates provider errors unchanged. Grants attached before a failure
/// remain attached; re-invoking resumes from the observed attachment set.
pub async fn create_node_role(
    api: &dyn AwsApi,
    name: &str,
) -> Result<RoleHandle, ProvisionError> {
    let trust = policy::trust_policy(EC2_SERVICE_PRINCIPAL)?;

    let role = match api.get_role(name).await? {
        Some(existing) => {
            info!(role_name = %name, "Role already exists, adopting");
            existing
        }
        None => api.create_role(name, &trust.to_json()?).await?,
    };

    let attached: HashSet<String> = api
        .list_attached_role_policies(name)
        .await?
        .into_iter()
        .map(|p| p.policy_arn)
        .collect();

    for policy_arn in MANAGED_NODE_POLICY_ARNS {
        attach_if_missing(api, name, policy_arn, &attached).await?;
    }

    let ecr_arn = ensure_ecr_policy(api, name).await?;
    attach_if_missing(api, name, &ecr_arn, &attached).await?;

    Ok(RoleHandle {
        name: role.role_name,
        arn: role.arn,
    })
}

async fn attach_if_missing(
    api: &dyn AwsApi,
    role_name: &str,
    policy_arn: &str,
    attached: &HashSet<String>,
) -> Result<(), ProvisionError> {
    if attached.contains(policy_arn) {
        debug!(role_name = %role_name, policy_arn = %policy_arn, "Grant already attached");
        return Ok(());
    }

    match api.attach_role_policy(role_name, policy_arn).await {
        Ok(()) => {
            info!(role_name = %role_name, policy_arn = %policy_arn, "Grant attached");
            Ok(())
        }
        // Attached concurrently or by a previous partial run.
        Err(ProvisionError::Api { status: 409, .. }) => {
            debug!(role_name = %role_name, policy_arn = %policy_arn, "Grant already attached");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Create the role-scoped image-pull policy, or adopt an existing one.
async fn ensure_ecr_policy(api: &dyn AwsApi, role_name: &str) -> Result<String, ProvisionError> {
    let policy_name = ecr_policy_name(role_name);
    let document = policy::ecr_pull_policy()?.to_json()?;

    if let Some(existing) = api.find_policy(&policy_name).await? {
        debug!(policy_name = %policy_name, "Image-pull policy already exists");
        return Ok(existing.arn);
    }

    match api
        .create_policy(
            &policy_name,
            "Image pull permissions for worker nodes",
            &document,
        )
        .await
    {
        Ok(created) => Ok(created.arn),
        // Created concurrently; fall back to lookup.
        Err(ProvisionError::Api { status: 409, .. }) => api
            .find_policy(&policy_name)
            .await?
            .map(|p| p.arn)
            .ok_or_else(|| ProvisionError::NotFound(policy_name)),
        Err(e) => Err(e),
    }
}
