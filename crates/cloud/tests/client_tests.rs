//! HTTP-level tests for the AWS client and the provisioners built on it.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trainstack_cloud::client::{Aws, AwsApi};
use trainstack_cloud::models::ScalingConfig;
use trainstack_cloud::role::{create_node_role, MANAGED_NODE_POLICY_ARNS};
use trainstack_cloud::{create_network, ProvisionError};

fn client(server: &MockServer) -> Aws {
    Aws::new("AKIATEST", "secret", "us-east-1")
        .unwrap()
        .with_endpoint(server.uri())
}

#[tokio::test]
async fn missing_role_reads_as_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("Action", "GetRole"))
        .respond_with(ResponseTemplate::new(404).set_body_string("NoSuchEntity"))
        .mount(&server)
        .await;

    let api = client(&server);
    assert!(api.get_role("node-role").await.unwrap().is_none());
}

#[tokio::test]
async fn converged_role_makes_no_attach_calls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("Action", "GetRole"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Role": {
                "RoleName": "node-role",
                "Arn": "arn:aws:iam::123456789012:role/node-role",
            }
        })))
        .mount(&server)
        .await;

    let mut attached: Vec<serde_json::Value> = MANAGED_NODE_POLICY_ARNS
        .iter()
        .map(|arn| {
            json!({
                "PolicyName": arn.rsplit('/').next().unwrap(),
                "PolicyArn": arn,
            })
        })
        .collect();
    attached.push(json!({
        "PolicyName": "node-role-ecr-policy",
        "PolicyArn": "arn:aws:iam::123456789012:policy/node-role-ecr-policy",
    }));

    Mock::given(method("GET"))
        .and(query_param("Action", "ListAttachedRolePolicies"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "AttachedPolicies": attached })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("Action", "ListPolicies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Policies": [{
                "PolicyName": "node-role-ecr-policy",
                "Arn": "arn:aws:iam::123456789012:policy/node-role-ecr-policy",
            }]
        })))
        .mount(&server)
        .await;

    // A converged role must not be re-attached.
    Mock::given(method("POST"))
        .and(query_param("Action", "AttachRolePolicy"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = client(&server);
    let handle = create_node_role(&api, "node-role").await.unwrap();
    assert_eq!(handle.arn, "arn:aws:iam::123456789012:role/node-role");
}

#[tokio::test]
async fn attach_conflicts_read_as_already_attached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("Action", "GetRole"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Role": {
                "RoleName": "node-role",
                "Arn": "arn:aws:iam::123456789012:role/node-role",
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("Action", "ListAttachedRolePolicies"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "AttachedPolicies": [] })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("Action", "ListPolicies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Policies": [{
                "PolicyName": "node-role-ecr-policy",
                "Arn": "arn:aws:iam::123456789012:policy/node-role-ecr-policy",
            }]
        })))
        .mount(&server)
        .await;

    // Four managed grants plus the custom one, each rejected as a duplicate.
    Mock::given(method("POST"))
        .and(query_param("Action", "AttachRolePolicy"))
        .respond_with(ResponseTemplate::new(409).set_body_string("EntityAlreadyExists"))
        .expect(5)
        .mount(&server)
        .await;

    let api = client(&server);
    assert!(create_node_role(&api, "node-role").await.is_ok());
}

#[tokio::test]
async fn provider_rejection_surfaces_unchanged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("Action", "DescribeVpcs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Vpcs": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(query_param("Action", "CreateVpc"))
        .respond_with(ResponseTemplate::new(500).set_body_string("InternalError"))
        .mount(&server)
        .await;

    let api = client(&server);
    let err = create_network(&api, "net", "10.0.0.0/16", true)
        .await
        .unwrap_err();
    match err {
        ProvisionError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "InternalError");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn cluster_create_requires_a_configured_service_role() {
    let server = MockServer::start().await;
    let api = client(&server);

    let err = api
        .create_cluster(
            "training",
            trainstack_cloud::models::CreateVpcConfig {
                subnet_ids: vec!["subnet-1".to_string()],
                endpoint_public_access: true,
                endpoint_private_access: false,
            },
            "t3.medium",
            ScalingConfig {
                min_size: 3,
                max_size: 6,
                desired_size: 3,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Config(_)));
}
