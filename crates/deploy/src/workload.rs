//! Training workload deployment.
//!
//! Builds the application Deployment: tolerating the accelerator taint,
//! requesting exactly one accelerator unit (fractional or shared allocation
//! is not supported), and pulling the image fresh on every rollout since the
//! reference is a mutable tag rebuilt between deployments.

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, PostParams};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use trainstack_common::{PoolContract, Toleration, GPU_RESOURCE};

use crate::error::DeployError;
use crate::quantity::parse_quantity;

/// CPU and memory envelope of the workload, plus the accelerator request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// CPU request.
    pub cpu_request: String,
    /// CPU limit.
    pub cpu_limit: String,
    /// Memory request.
    pub memory_request: String,
    /// Memory limit.
    pub memory_limit: String,
    /// Whether the workload requests an accelerator. The accelerator count
    /// is always exactly one.
    pub gpu: bool,
}

impl ResourceSpec {
    /// Check that limits bound usage at or above requests.
    ///
    /// # Errors
    /// Returns a validation error for unparseable quantities and a
    /// consistency error when a limit falls below its request.
    pub fn validate(&self) -> Result<(), DeployError> {
        for (name, request, limit) in [
            ("cpu", &self.cpu_request, &self.cpu_limit),
            ("memory", &self.memory_request, &self.memory_limit),
        ] {
            if parse_quantity(request)? > parse_quantity(limit)? {
                return Err(DeployError::Consistency(format!(
                    "{name} limit {limit} is below request {request}"
                )));
            }
        }
        Ok(())
    }
}

/// What to deploy: image, scale, scheduling, and resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Deployment name.
    pub name: String,
    /// Container image reference; treated as an opaque versioned pointer.
    pub image: String,
    /// Replica count.
    pub replicas: i32,
    /// Resource envelope.
    pub resources: ResourceSpec,
    /// Tolerations carried by the pod template.
    pub tolerations: Vec<Toleration>,
}

/// Build the workload Deployment.
///
/// # Errors
/// Returns a validation error for a bad replica count or quantities, and a
/// consistency error when the workload requests an accelerator without
/// tolerating every taint of the pool it must land on.
pub fn build_deployment(
    spec: &WorkloadSpec,
    contract: &PoolContract,
) -> Result<Deployment, DeployError> {
    if spec.name.is_empty() {
        return Err(DeployError::Validation(
            "workload name must not be empty".to_string(),
        ));
    }
    if spec.image.is_empty() {
        return Err(DeployError::Validation(
            "workload image must not be empty".to_string(),
        ));
    }
    if spec.replicas < 0 {
        return Err(DeployError::Validation(format!(
            "replica count must be non-negative, got {}",
            spec.replicas
        )));
    }
    spec.resources.validate()?;

    if spec.resources.gpu && !contract.tolerated_by(&spec.tolerations) {
        return Err(DeployError::Consistency(format!(
            "workload requests {GPU_RESOURCE} but its tolerations {:?} do not cover the pool taints {:?}",
            spec.tolerations, contract.taints
        )));
    }

    let mut requests = json!({
        "cpu": spec.resources.cpu_request,
        "memory": spec.resources.memory_request,
    });
    let mut limits = json!({
        "cpu": spec.resources.cpu_limit,
        "memory": spec.resources.memory_limit,
    });
    if spec.resources.gpu {
        requests[GPU_RESOURCE] = json!("1");
        limits[GPU_RESOURCE] = json!("1");
    }

    let deployment = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.name,
        },
        "spec": {
            "replicas": spec.replicas,
            "selector": {
                "matchLabels": { "app": spec.name }
            },
            "template": {
                "metadata": {
                    "labels": { "app": spec.name }
                },
                "spec": {
                    "tolerations": spec.tolerations,
                    "containers": [{
                        "name": spec.name,
                        "image": spec.image,
                        "imagePullPolicy": "Always",
                        "resources": {
                            "requests": requests,
                            "limits": limits,
                        }
                    }]
                }
            }
        }
    });

    Ok(serde_json::from_value(deployment)?)
}

/// Apply the workload Deployment to the cluster.
///
/// Idempotent: an existing deployment is replaced with the latest content.
///
/// # Errors
/// Returns a validation or consistency error from [`build_deployment`], or
/// the API server error unchanged.
pub async fn deploy_workload(
    client: kube::Client,
    namespace: &str,
    spec: &WorkloadSpec,
    contract: &PoolContract,
) -> Result<Deployment, DeployError> {
    let deployment = build_deployment(spec, contract)?;
    let api: Api<Deployment> = Api::namespaced(client, namespace);

    match api.create(&PostParams::default(), &deployment).await {
        Ok(created) => {
            info!("✅ Created Deployment: {}", spec.name);
            Ok(created)
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            // Exists: fetch to preserve resourceVersion, then replace
            let existing = api.get(&spec.name).await?;
            let mut updated = deployment;
            updated.metadata.resource_version = existing.metadata.resource_version;

            let replaced = api
                .replace(&spec.name, &PostParams::default(), &updated)
                .await?;
            info!("🔄 Updated Deployment: {}", spec.name);
            Ok(replaced)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trainstack_common::{TaintEffect, GPU_TAINT_KEY, GPU_TAINT_VALUE};

    fn gpu_spec() -> WorkloadSpec {
        WorkloadSpec {
            name: "pytorch".to_string(),
            image: "123456789012.dkr.ecr.us-east-1.amazonaws.com/training:latest".to_string(),
            replicas: 1,
            resources: ResourceSpec {
                cpu_request: "2".to_string(),
                cpu_limit: "4".to_string(),
                memory_request: "2Gi".to_string(),
                memory_limit: "4Gi".to_string(),
                gpu: true,
            },
            tolerations: vec![Toleration::equal(
                GPU_TAINT_KEY,
                GPU_TAINT_VALUE,
                TaintEffect::NoSchedule,
            )],
        }
    }

    #[test]
    fn tolerating_workload_builds_with_one_accelerator() {
        let deployment = build_deployment(&gpu_spec(), &PoolContract::gpu()).unwrap();

        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.as_ref().unwrap();
        assert_eq!(
            resources.requests.as_ref().unwrap()[GPU_RESOURCE].0,
            "1"
        );
        assert_eq!(resources.limits.as_ref().unwrap()[GPU_RESOURCE].0, "1");
        assert_eq!(
            pod.containers[0].image_pull_policy.as_deref(),
            Some("Always")
        );
    }

    #[test]
    fn accelerator_request_without_toleration_is_a_consistency_error() {
        let mut spec = gpu_spec();
        spec.tolerations.clear();

        assert!(matches!(
            build_deployment(&spec, &PoolContract::gpu()),
            Err(DeployError::Consistency(_))
        ));
    }

    #[test]
    fn cpu_only_workload_needs_no_toleration() {
        let mut spec = gpu_spec();
        spec.tolerations.clear();
        spec.resources.gpu = false;

        let deployment = build_deployment(&spec, &PoolContract::gpu()).unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.as_ref().unwrap();
        assert!(!resources.requests.as_ref().unwrap().contains_key(GPU_RESOURCE));
    }

    #[test]
    fn limits_below_requests_are_rejected() {
        let mut spec = gpu_spec();
        spec.resources.memory_limit = "1Gi".to_string();

        assert!(matches!(
            build_deployment(&spec, &PoolContract::gpu()),
            Err(DeployError::Consistency(_))
        ));
    }

    #[test]
    fn limits_equal_to_requests_are_accepted() {
        let mut spec = gpu_spec();
        spec.resources.cpu_limit = spec.resources.cpu_request.clone();
        spec.resources.memory_limit = spec.resources.memory_request.clone();

        assert!(build_deployment(&spec, &PoolContract::gpu()).is_ok());
    }

    #[test]
    fn negative_replicas_are_rejected() {
        let mut spec = gpu_spec();
        spec.replicas = -1;

        assert!(matches!(
            build_deployment(&spec, &PoolContract::gpu()),
            Err(DeployError::Validation(_))
        ));
    }

    #[test]
    fn toleration_value_mismatch_is_a_consistency_error() {
        let mut spec = gpu_spec();
        spec.tolerations = vec![Toleration::equal(
            GPU_TAINT_KEY,
            "false",
            TaintEffect::NoSchedule,
        )];

        assert!(matches!(
            build_deployment(&spec, &PoolContract::gpu()),
            Err(DeployError::Consistency(_))
        ));
    }
}
