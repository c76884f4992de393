//! Device plugin DaemonSet deployment.
//!
//! Runs one plugin pod per GPU node so the kubelet can see the accelerator
//! devices. The pod needs host access to the kubelet's device-plugin socket
//! directory, so everything else about it is locked down: no privilege
//! escalation, all capabilities dropped. It runs at the highest scheduling
//! priority; if it is evicted, accelerators silently vanish from the node.

use k8s_openapi::api::apps::v1::DaemonSet;
use kube::api::{Api, PostParams};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use trainstack_common::{PoolContract, Toleration};

use crate::error::DeployError;

/// Device plugin image.
pub const DEVICE_PLUGIN_IMAGE: &str = "nvcr.io/nvidia/k8s-device-plugin:v0.17.0";

/// DaemonSet name.
pub const DAEMONSET_NAME: &str = "nvidia-device-plugin-daemonset";

/// Namespace the daemon runs in.
pub const DAEMONSET_NAMESPACE: &str = "kube-system";

/// Pod selector label of the daemon.
const POD_LABEL: &str = "nvidia-device-plugin-ds";

/// Kubelet device-plugin socket directory, host-mounted into the pod.
const DEVICE_PLUGIN_DIR: &str = "/var/lib/kubelet/device-plugins";

/// Priority class keeping the daemon schedulable under node pressure.
const PRIORITY_CLASS: &str = "system-node-critical";

/// What to deploy: image, node selection, and taint toleration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePluginSpec {
    /// Plugin image reference.
    pub image: String,
    /// Labels of the nodes the daemon runs on.
    pub node_selector: std::collections::BTreeMap<String, String>,
    /// Toleration for the accelerator taint.
    pub toleration: Toleration,
}

impl DevicePluginSpec {
    /// Spec targeting the nodes of `contract` with the stock plugin image.
    #[must_use]
    pub fn for_contract(contract: &PoolContract) -> Self {
        Self {
            image: DEVICE_PLUGIN_IMAGE.to_string(),
            node_selector: contract.labels.clone(),
            toleration: Toleration::exists(
                trainstack_common::GPU_TAINT_KEY,
                trainstack_common::TaintEffect::NoSchedule,
            ),
        }
    }
}

/// Build the device plugin DaemonSet.
///
/// # Errors
/// Returns a consistency error if the node selector does not equal the label
/// set the pool applies to its nodes, or if the toleration does not cover
/// the pool's taints.
pub fn build_daemonset(
    spec: &DevicePluginSpec,
    contract: &PoolContract,
) -> Result<DaemonSet, DeployError> {
    if spec.node_selector != contract.labels {
        return Err(DeployError::Consistency(format!(
            "device plugin node selector {:?} does not match pool labels {:?}",
            spec.node_selector, contract.labels
        )));
    }
    if !contract.tolerated_by(std::slice::from_ref(&spec.toleration)) {
        return Err(DeployError::Consistency(format!(
            "device plugin toleration {:?} does not cover pool taints {:?}",
            spec.toleration, contract.taints
        )));
    }

    let daemonset = json!({
        "apiVersion": "apps/v1",
        "kind": "DaemonSet",
        "metadata": {
            "name": DAEMONSET_NAME,
            "namespace": DAEMONSET_NAMESPACE,
        },
        "spec": {
            "selector": {
                "matchLabels": { "name": POD_LABEL }
            },
            "updateStrategy": {
                "type": "RollingUpdate"
            },
            "template": {
                "metadata": {
                    "labels": { "name": POD_LABEL }
                },
                "spec": {
                    "tolerations": [spec.toleration],
                    "nodeSelector": spec.node_selector,
                    "priorityClassName": PRIORITY_CLASS,
                    "containers": [{
                        "name": "nvidia-device-plugin-ctr",
                        "image": spec.image,
                        "env": [{
                            "name": "FAIL_ON_INIT_ERROR",
                            "value": "false"
                        }],
                        "securityContext": {
                            "allowPrivilegeEscalation": false,
                            "capabilities": { "drop": ["ALL"] }
                        },
                        "volumeMounts": [{
                            "name": "device-plugin",
                            "mountPath": DEVICE_PLUGIN_DIR
                        }]
                    }],
                    "volumes": [{
                        "name": "device-plugin",
                        "hostPath": { "path": DEVICE_PLUGIN_DIR }
                    }]
                }
            }
        }
    });

    Ok(serde_json::from_value(daemonset)?)
}

/// Apply the device plugin DaemonSet to the cluster.
///
/// Idempotent: an existing daemon is replaced with the latest content.
///
/// # Errors
/// Returns a consistency error from [`build_daemonset`], or the API server
/// error unchanged.
pub async fn deploy_device_plugin(
    client: kube::Client,
    spec: &DevicePluginSpec,
    contract: &PoolContract,
) -> Result<DaemonSet, DeployError> {
    let daemonset = build_daemonset(spec, contract)?;
    let api: Api<DaemonSet> = Api::namespaced(client, DAEMONSET_NAMESPACE);

    match api.create(&PostParams::default(), &daemonset).await {
        Ok(created) => {
            info!("✅ Created DaemonSet: {}", DAEMONSET_NAME);
            Ok(created)
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            // Exists: fetch to preserve resourceVersion, then replace
            let existing = api.get(DAEMONSET_NAME).await?;
            let mut updated = daemonset;
            updated.metadata.resource_version = existing.metadata.resource_version;

            let replaced = api
                .replace(DAEMONSET_NAME, &PostParams::default(), &updated)
                .await?;
            info!("🔄 Updated DaemonSet: {}", DAEMONSET_NAME);
            Ok(replaced)
        }
        Err(e) => Err(e.into()),
    }
}
