//! IAM policy document construction.
//!
//! Documents are built as structured data and serialized once, at the point
//! they cross the wire. Building is pure: no I/O, and malformed input (empty
//! action list, unrecognized resource pattern) is a validation error rather
//! than a silently-dropped statement.

use serde::Serialize;

use crate::error::ProvisionError;

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Service principal allowed to assume the compute-node role.
pub const EC2_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

/// Actions the role-scoped image-pull grant may carry. The custom grant is
/// built from this list and nothing else.
pub const ECR_PULL_ACTIONS: [&str; 4] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:BatchGetImage",
    "ecr:GetDownloadUrlForLayer",
    "ecr:GetAuthorizationToken",
];

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Permit the listed actions.
    Allow,
    /// Deny the listed actions.
    Deny,
}

/// Principal of a trust statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Service principal (e.g. `ec2.amazonaws.com`).
    #[serde(rename = "Service")]
    pub service: String,
}

/// A single policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Statement effect.
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Actions the statement covers.
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    /// Trusted principal; only present in trust statements.
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Resource pattern; only present in permission statements.
    #[serde(rename = "Resource", skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// An IAM policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    /// Policy language version.
    #[serde(rename = "Version")]
    pub version: String,
    /// Ordered statements.
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    /// Serialize the document to its wire form.
    ///
    /// # Errors
    /// Returns a serialization error if the document cannot be encoded.
    pub fn to_json(&self) -> Result<String, ProvisionError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Trust policy allowing `service_principal` to assume the role.
///
/// # Errors
/// Returns a validation error for an empty principal.
pub fn trust_policy(service_principal: &str) -> Result<PolicyDocument, ProvisionError> {
    if service_principal.is_empty() {
        return Err(ProvisionError::Validation(
            "trust policy requires a service principal".to_string(),
        ));
    }

    Ok(PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statements: vec![Statement {
            effect: Effect::Allow,
            actions: vec!["sts:AssumeRole".to_string()],
            principal: Some(Principal {
                service: service_principal.to_string(),
            }),
            resource: None,
        }],
    })
}

/// Permission policy allowing `actions` on `resource`.
///
/// # Errors
/// Returns a validation error for an empty action list or a resource pattern
/// that is neither `*` nor an ARN.
pub fn permission_policy<S: AsRef<str>>(
    actions: &[S],
    resource: &str,
) -> Result<PolicyDocument, ProvisionError> {
    if actions.is_empty() {
        return Err(ProvisionError::Validation(
            "permission policy requires at least one action".to_string(),
        ));
    }
    if resource != "*" && !resource.starts_with("arn:") {
        return Err(ProvisionError::Validation(format!(
            "invalid resource pattern: {resource}"
        )));
    }

    Ok(PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statements: vec![Statement {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            principal: None,
            resource: Some(resource.to_string()),
        }],
    })
}

/// The role-scoped image-pull grant, built from [`ECR_PULL_ACTIONS`].
///
/// # Errors
/// Does not fail in practice; the signature matches the general builder.
pub fn ecr_pull_policy() -> Result<PolicyDocument, ProvisionError> {
    permission_policy(&ECR_PULL_ACTIONS, "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_policy_names_the_compute_node_principal() {
        let doc = trust_policy(EC2_SERVICE_PRINCIPAL).unwrap();
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(json["Version"], POLICY_VERSION);
        assert_eq!(json["Statement"][0]["Effect"], "Allow");
        assert_eq!(json["Statement"][0]["Action"][0], "sts:AssumeRole");
        assert_eq!(
            json["Statement"][0]["Principal"]["Service"],
            EC2_SERVICE_PRINCIPAL
        );
        assert!(json["Statement"][0].get("Resource").is_none());
    }

    #[test]
    fn empty_principal_is_rejected() {
        assert!(matches!(
            trust_policy(""),
            Err(ProvisionError::Validation(_))
        ));
    }

    #[test]
    fn empty_action_list_is_rejected() {
        let actions: [&str; 0] = [];
        assert!(matches!(
            permission_policy(&actions, "*"),
            Err(ProvisionError::Validation(_))
        ));
    }

    #[test]
    fn malformed_resource_pattern_is_rejected() {
        assert!(matches!(
            permission_policy(&["ecr:BatchGetImage"], "not-a-resource"),
            Err(ProvisionError::Validation(_))
        ));
    }

    #[test]
    fn arn_resource_patterns_are_accepted() {
        let doc =
            permission_policy(&["ecr:BatchGetImage"], "arn:aws:ecr:us-east-1:123:repository/*")
                .unwrap();
        assert_eq!(
            doc.statements[0].resource.as_deref(),
            Some("arn:aws:ecr:us-east-1:123:repository/*")
        );
    }

    #[test]
    fn ecr_grant_carries_exactly_the_allow_list() {
        let doc = ecr_pull_policy().unwrap();
        assert_eq!(doc.statements.len(), 1);
        assert_eq!(doc.statements[0].effect, Effect::Allow);
        assert_eq!(doc.statements[0].actions, ECR_PULL_ACTIONS.to_vec());
        assert_eq!(doc.statements[0].resource.as_deref(), Some("*"));
    }
}
