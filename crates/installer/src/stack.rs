//! Stack orchestration.
//!
//! Runs the provisioning workflow as its dependency graph dictates: the
//! role and the network are independent and run concurrently; the cluster
//! needs the network; the GPU pool needs all three; the in-cluster
//! deployments consume the pool's scheduling contract and the cluster's
//! credentials. Every edge is a typed handle passed by reference, so the
//! ordering lives in the data flow rather than in call-site convention.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use trainstack_cloud::{
    cluster, network, pool, role, AcceleratorPoolSpec, AwsApi, ClusterHandle, NetworkHandle,
    PoolHandle, RoleHandle,
};
use trainstack_common::{
    autoscaler_cluster_tag, PoolContract, TaintEffect, Toleration, AUTOSCALER_ENABLED_TAG,
    GPU_TAINT_KEY, GPU_TAINT_VALUE,
};
use trainstack_deploy::{deploy_device_plugin, deploy_workload, DevicePluginSpec, ResourceSpec, WorkloadSpec};

use crate::config::StackConfig;

/// Values exported once the stack converges.
#[derive(Debug, Clone, Serialize)]
pub struct StackOutputs {
    /// Cluster access credentials; consumers feed these to a cluster client.
    pub kubeconfig: String,
    /// Network identifier.
    pub vpc_id: String,
}

/// Handles of the provisioned cloud resources.
#[derive(Debug, Clone)]
pub struct ProvisionedInfra {
    /// Worker-node identity.
    pub identity: RoleHandle,
    /// Isolated network.
    pub network: NetworkHandle,
    /// Managed cluster.
    pub cluster: ClusterHandle,
    /// GPU node pool.
    pub pool: PoolHandle,
}

/// The full provisioning workflow.
pub struct Stack {
    api: Arc<dyn AwsApi>,
    config: StackConfig,
}

impl Stack {
    /// Create a new stack over an API client and configuration.
    #[must_use]
    pub fn new(api: Arc<dyn AwsApi>, config: StackConfig) -> Self {
        Self { api, config }
    }

    /// Provision the cloud resources, in dependency order.
    ///
    /// # Errors
    /// Returns the first provisioning error; re-invocation resumes from the
    /// converged resources.
    pub async fn provision_infra(&self) -> anyhow::Result<ProvisionedInfra> {
        let config = &self.config;
        let api = self.api.as_ref();

        info!(cluster_name = %config.cluster_name, "Provisioning stack");

        // Independent branches: the role and the network share no edge.
        let node_role_name = format!("{}-node-role", config.cluster_name);
        let vpc_name = format!("{}-vpc", config.cluster_name);
        let (identity, net) = tokio::try_join!(
            role::create_node_role(api, &node_role_name),
            network::create_network(
                api,
                &vpc_name,
                &config.network_cidr,
                config.dns_enabled,
            ),
        )
        .context("Failed to provision role and network")?;

        let cluster = cluster::create_cluster(
            api,
            &config.cluster_name,
            &net,
            &config.node_instance_type,
            config.cluster_bounds(),
            config.exposure,
            &config.region,
        )
        .await
        .context("Failed to provision cluster")?;

        let pool = pool::create_accelerator_pool(
            api,
            &cluster,
            &identity,
            &net,
            AcceleratorPoolSpec {
                name: config.gpu.pool_name.clone(),
                instance_types: config.gpu.instance_types.clone(),
                bounds: config.gpu_bounds(),
                disk_size_gb: config.gpu.disk_size_gb,
                tags: BTreeMap::from([
                    (AUTOSCALER_ENABLED_TAG.to_string(), "true".to_string()),
                    (autoscaler_cluster_tag(&cluster.name), "owned".to_string()),
                ]),
                contract: PoolContract::gpu(),
            },
        )
        .await
        .context("Failed to provision GPU pool")?;

        info!(
            cluster_name = %cluster.name,
            pool_name = %pool.name,
            "Cloud resources converged"
        );

        Ok(ProvisionedInfra {
            identity,
            network: net,
            cluster,
            pool,
        })
    }

    /// Deploy the device plugin and the workload onto a provisioned cluster.
    ///
    /// # Errors
    /// Returns consistency errors before anything reaches the API server,
    /// and API server errors unchanged.
    pub async fn deploy_workloads(
        &self,
        client: kube::Client,
        pool: &PoolHandle,
    ) -> anyhow::Result<()> {
        let contract = &pool.contract;

        deploy_device_plugin(
            client.clone(),
            &DevicePluginSpec::for_contract(contract),
            contract,
        )
        .await
        .context("Failed to deploy device plugin")?;

        let workload = &self.config.workload;
        deploy_workload(
            client,
            &workload.namespace,
            &WorkloadSpec {
                name: workload.name.clone(),
                image: workload.image.clone(),
                replicas: workload.replicas,
                resources: ResourceSpec {
                    cpu_request: workload.cpu_request.clone(),
                    cpu_limit: workload.cpu_limit.clone(),
                    memory_request: workload.memory_request.clone(),
                    memory_limit: workload.memory_limit.clone(),
                    gpu: true,
                },
                tolerations: vec![Toleration::equal(
                    GPU_TAINT_KEY,
                    GPU_TAINT_VALUE,
                    TaintEffect::NoSchedule,
                )],
            },
            contract,
        )
        .await
        .context("Failed to deploy workload")?;

        Ok(())
    }

    /// Provision everything and return the exported outputs.
    ///
    /// # Errors
    /// Returns the first provisioning or deployment error.
    pub async fn run(&self) -> anyhow::Result<StackOutputs> {
        let infra = self.provision_infra().await?;

        let client = cluster_client(&infra.cluster)
            .await
            .context("Failed to build cluster client from kubeconfig")?;
        self.deploy_workloads(client, &infra.pool).await?;

        Ok(Self::outputs(&infra))
    }

    /// Project the exported outputs from provisioned handles.
    #[must_use]
    pub fn outputs(infra: &ProvisionedInfra) -> StackOutputs {
        StackOutputs {
            kubeconfig: infra.cluster.kubeconfig.clone(),
            vpc_id: infra.network.vpc_id.clone(),
        }
    }
}

/// Build a cluster client from the generated access credentials.
async fn cluster_client(cluster: &ClusterHandle) -> anyhow::Result<kube::Client> {
    let kubeconfig = kube::config::Kubeconfig::from_yaml(&cluster.kubeconfig)
        .context("Failed to parse generated kubeconfig")?;
    let config = kube::Config::from_custom_kubeconfig(
        kubeconfig,
        &kube::config::KubeConfigOptions::default(),
    )
    .await
    .context("Failed to load cluster configuration")?;
    Ok(kube::Client::try_from(config)?)
}
