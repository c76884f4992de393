//! Taints, tolerations, and the pool scheduling contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{GPU_TAINT_KEY, GPU_TAINT_VALUE};

/// Scheduling effect of a taint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    /// Pods without a matching toleration are not scheduled.
    NoSchedule,
    /// The scheduler avoids the node but may still place pods there.
    PreferNoSchedule,
    /// Running pods without a matching toleration are evicted.
    NoExecute,
}

impl TaintEffect {
    /// Kubernetes spelling, as used in pod specs.
    #[must_use]
    pub fn as_k8s_str(&self) -> &'static str {
        match self {
            Self::NoSchedule => "NoSchedule",
            Self::PreferNoSchedule => "PreferNoSchedule",
            Self::NoExecute => "NoExecute",
        }
    }

    /// EKS node group API spelling.
    #[must_use]
    pub fn as_eks_str(&self) -> &'static str {
        match self {
            Self::NoSchedule => "NO_SCHEDULE",
            Self::PreferNoSchedule => "PREFER_NO_SCHEDULE",
            Self::NoExecute => "NO_EXECUTE",
        }
    }
}

impl std::fmt::Display for TaintEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_k8s_str())
    }
}

/// A marker on a compute node that repels pods lacking a matching toleration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    pub value: String,
    /// Scheduling effect.
    pub effect: TaintEffect,
}

impl Taint {
    /// The taint reserving GPU nodes for accelerator workloads.
    #[must_use]
    pub fn gpu() -> Self {
        Self {
            key: GPU_TAINT_KEY.to_string(),
            value: GPU_TAINT_VALUE.to_string(),
            effect: TaintEffect::NoSchedule,
        }
    }
}

/// Matching operator of a toleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    /// Key and value must both match.
    Equal,
    /// Key presence is sufficient; the value is ignored.
    Exists,
}

impl TolerationOperator {
    /// Kubernetes spelling, as used in pod specs.
    #[must_use]
    pub fn as_k8s_str(&self) -> &'static str {
        match self {
            Self::Equal => "Equal",
            Self::Exists => "Exists",
        }
    }
}

/// A pod-level declaration permitting scheduling onto tainted nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    /// Taint key this toleration applies to.
    pub key: String,
    /// Matching operator.
    pub operator: TolerationOperator,
    /// Taint value, required for [`TolerationOperator::Equal`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Tolerated effect.
    pub effect: TaintEffect,
}

impl Toleration {
    /// Toleration matching a taint by key, value, and effect.
    #[must_use]
    pub fn equal(key: impl Into<String>, value: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Equal,
            value: Some(value.into()),
            effect,
        }
    }

    /// Toleration matching any value of a taint key.
    #[must_use]
    pub fn exists(key: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Exists,
            value: None,
            effect,
        }
    }

    /// Whether this toleration permits scheduling onto a node bearing `taint`.
    #[must_use]
    pub fn tolerates(&self, taint: &Taint) -> bool {
        if self.key != taint.key || self.effect != taint.effect {
            return false;
        }
        match self.operator {
            TolerationOperator::Exists => true,
            TolerationOperator::Equal => self.value.as_deref() == Some(taint.value.as_str()),
        }
    }
}

/// The scheduling contract a GPU node pool publishes to its consumers.
///
/// Produced once by the pool provisioner and handed to the device plugin and
/// workload deployers, so selector and toleration checks run against the
/// labels and taints the pool actually applied, not against repeated
/// literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolContract {
    /// Labels applied to every node in the pool.
    pub labels: BTreeMap<String, String>,
    /// Taints applied to every node in the pool.
    pub taints: Vec<Taint>,
}

impl PoolContract {
    /// The default GPU pool contract.
    #[must_use]
    pub fn gpu() -> Self {
        Self {
            labels: crate::gpu_node_labels(),
            taints: vec![Taint::gpu()],
        }
    }

    /// Whether `tolerations` covers every taint in this contract.
    #[must_use]
    pub fn tolerated_by(&self, tolerations: &[Toleration]) -> bool {
        self.taints
            .iter()
            .all(|taint| tolerations.iter().any(|t| t.tolerates(taint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_toleration_matches_key_value_and_effect() {
        let taint = Taint::gpu();
        let toleration = Toleration::equal(GPU_TAINT_KEY, GPU_TAINT_VALUE, TaintEffect::NoSchedule);
        assert!(toleration.tolerates(&taint));
    }

    #[test]
    fn equal_toleration_rejects_value_mismatch() {
        let taint = Taint::gpu();
        let toleration = Toleration::equal(GPU_TAINT_KEY, "false", TaintEffect::NoSchedule);
        assert!(!toleration.tolerates(&taint));
    }

    #[test]
    fn exists_toleration_ignores_value() {
        let taint = Taint::gpu();
        let toleration = Toleration::exists(GPU_TAINT_KEY, TaintEffect::NoSchedule);
        assert!(toleration.tolerates(&taint));
    }

    #[test]
    fn effect_mismatch_is_not_tolerated() {
        let taint = Taint::gpu();
        let toleration = Toleration::exists(GPU_TAINT_KEY, TaintEffect::NoExecute);
        assert!(!toleration.tolerates(&taint));
    }

    #[test]
    fn contract_requires_every_taint_covered() {
        let mut contract = PoolContract::gpu();
        contract.taints.push(Taint {
            key: "dedicated".to_string(),
            value: "training".to_string(),
            effect: TaintEffect::NoExecute,
        });

        let partial = vec![Toleration::exists(GPU_TAINT_KEY, TaintEffect::NoSchedule)];
        assert!(!contract.tolerated_by(&partial));

        let full = vec![
            Toleration::exists(GPU_TAINT_KEY, TaintEffect::NoSchedule),
            Toleration::equal("dedicated", "training", TaintEffect::NoExecute),
        ];
        assert!(contract.tolerated_by(&full));
    }

    #[test]
    fn effect_spellings() {
        assert_eq!(TaintEffect::NoSchedule.as_k8s_str(), "NoSchedule");
        assert_eq!(TaintEffect::NoSchedule.as_eks_str(), "NO_SCHEDULE");
        assert_eq!(TaintEffect::NoExecute.as_eks_str(), "NO_EXECUTE");
    }
}
