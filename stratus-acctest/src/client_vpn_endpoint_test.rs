use std::collections::HashMap;

use stratus_core::resource::Value;

use crate::fixtures::{Certificate, ClientVpnFixture};
use crate::{
    TestCase, TestStep, acc_enabled, check_resource_attr, check_resource_attr_pair,
    check_resource_attr_set, check_resource_exists, compose, test_provider, test_provider_with,
};

const RESOURCE_NAME: &str = "aws_ec2_client_vpn_endpoint.test";
const ASSOCIATION_NAME: &str = "aws_ec2_client_vpn_network_association.test";

/// Fixture for one test case, or `None` when running against AWS without
/// certificate material
fn fixture() -> Option<ClientVpnFixture> {
    let _ = env_logger::builder().is_test(true).try_init();
    if !acc_enabled() {
        return Some(ClientVpnFixture::new(Certificate::placeholder()));
    }
    match Certificate::from_env() {
        Some(certificate) => Some(ClientVpnFixture::new(certificate)),
        None => {
            log::warn!("STRATUS_ACC_CERTIFICATE_BODY and STRATUS_ACC_PRIVATE_KEY must be set; skipping");
            None
        }
    }
}

#[tokio::test]
async fn client_vpn_endpoint_basic() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.basic()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr_set(RESOURCE_NAME, "description"),
            check_resource_attr_set(RESOURCE_NAME, "server_certificate_arn"),
            check_resource_attr(RESOURCE_NAME, "client_cidr_block", "10.0.0.0/16"),
            check_resource_attr(RESOURCE_NAME, "transport_protocol", "udp"),
            check_resource_attr(RESOURCE_NAME, "authentication_options.#", "1"),
            check_resource_attr(
                RESOURCE_NAME,
                "authentication_options.0.type",
                "certificate-authentication",
            ),
            check_resource_attr(RESOURCE_NAME, "connection_log_options.#", "1"),
            check_resource_attr(RESOURCE_NAME, "connection_log_options.0.enabled", "false"),
            check_resource_attr_set(RESOURCE_NAME, "dns_name"),
            check_resource_attr_pair(
                RESOURCE_NAME,
                "server_certificate_arn",
                "aws_acm_certificate.cert",
                "arn",
            ),
        ])))
        .step(TestStep::import(RESOURCE_NAME).verify())
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_microsoft_ad() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.with_microsoft_ad()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "authentication_options.#", "1"),
            check_resource_attr(
                RESOURCE_NAME,
                "authentication_options.0.type",
                "directory-service-authentication",
            ),
            check_resource_attr_pair(
                RESOURCE_NAME,
                "authentication_options.0.active_directory_id",
                "aws_directory_service_directory.test",
                "id",
            ),
            check_resource_attr(
                "aws_directory_service_directory.test",
                "vpc_settings.0.subnet_ids.#",
                "2",
            ),
        ])))
        .step(TestStep::import(RESOURCE_NAME).verify())
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_with_log_group() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.basic()).check(check_resource_exists(RESOURCE_NAME)))
        .step(TestStep::config(fixture.with_log_group()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "connection_log_options.#", "1"),
            check_resource_attr(RESOURCE_NAME, "connection_log_options.0.enabled", "true"),
            check_resource_attr_set(RESOURCE_NAME, "connection_log_options.0.cloudwatch_log_group"),
            check_resource_attr_set(RESOURCE_NAME, "connection_log_options.0.cloudwatch_log_stream"),
            check_resource_attr_pair(
                RESOURCE_NAME,
                "connection_log_options.0.cloudwatch_log_stream",
                "aws_cloudwatch_log_stream.ls",
                "name",
            ),
        ])))
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_with_dns_servers() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.basic()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "dns_servers.#", "0"),
        ])))
        .step(TestStep::config(fixture.with_dns_servers()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "dns_servers.#", "2"),
            check_resource_attr(RESOURCE_NAME, "dns_servers.0", "8.8.8.8"),
            check_resource_attr(RESOURCE_NAME, "dns_servers.1", "8.8.4.4"),
        ])))
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_with_network_association() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.basic()).check(check_resource_exists(RESOURCE_NAME)))
        .step(TestStep::config(fixture.with_network_association()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "network_association.#", "1"),
            check_resource_attr_pair(
                RESOURCE_NAME,
                "network_association.0.subnet_id",
                "aws_subnet.test",
                "id",
            ),
            check_resource_attr_set(RESOURCE_NAME, "network_association.0.id"),
        ])))
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_with_standalone_network_association() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(
            TestStep::config(fixture.with_standalone_network_association()).check(compose(vec![
                check_resource_exists(RESOURCE_NAME),
                check_resource_exists(ASSOCIATION_NAME),
                check_resource_attr_pair(
                    ASSOCIATION_NAME,
                    "client_vpn_endpoint_id",
                    RESOURCE_NAME,
                    "id",
                ),
                check_resource_attr(RESOURCE_NAME, "network_association.#", "1"),
                check_resource_attr_pair(
                    RESOURCE_NAME,
                    "network_association.0.id",
                    ASSOCIATION_NAME,
                    "id",
                ),
                check_resource_attr(RESOURCE_NAME, "route.#", "0"),
            ])),
        )
        .step(TestStep::import(RESOURCE_NAME).verify())
        .step(TestStep::config(fixture.basic()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "network_association.#", "0"),
        ])))
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_with_authorization_rules() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.basic()).check(check_resource_exists(RESOURCE_NAME)))
        .step(TestStep::config(fixture.with_authorization_rules()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "authorization_rule.#", "1"),
            check_resource_attr_set(RESOURCE_NAME, "authorization_rule.0.description"),
            check_resource_attr_set(RESOURCE_NAME, "authorization_rule.0.target_network_cidr"),
        ])))
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_with_routes() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.basic()).check(check_resource_exists(RESOURCE_NAME)))
        .step(TestStep::config(fixture.with_route()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "route.#", "1"),
        ])))
        .step(TestStep::config(fixture.with_routes()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "route.#", "2"),
        ])))
        .step(TestStep::config(fixture.with_route()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "route.#", "1"),
            check_resource_attr(RESOURCE_NAME, "route.0.description", "example route 1"),
        ])))
        .step(TestStep::import(RESOURCE_NAME).verify())
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_tags() {
    let Some(fixture) = fixture() else { return };

    TestCase::new()
        .step(TestStep::config(fixture.tags()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "tags.%", "2"),
            check_resource_attr(RESOURCE_NAME, "tags.Usage", "original"),
        ])))
        .step(TestStep::config(fixture.tags_changed()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "tags.%", "1"),
            check_resource_attr(RESOURCE_NAME, "tags.Usage", "changed"),
        ])))
        .step(TestStep::config(fixture.basic()).check(compose(vec![
            check_resource_exists(RESOURCE_NAME),
            check_resource_attr(RESOURCE_NAME, "tags.%", "0"),
        ])))
        .run(test_provider().await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn client_vpn_endpoint_inherits_default_tags() {
    let Some(fixture) = fixture() else { return };
    let default_tags = Value::List(vec![Value::Map(HashMap::from([(
        "tags".to_string(),
        Value::Map(HashMap::from([(
            "Team".to_string(),
            Value::string("network"),
        )])),
    )]))]);
    let provider = test_provider_with(HashMap::from([(
        "default_tags".to_string(),
        default_tags,
    )]))
    .await
    .unwrap();

    TestCase::new()
        .step(TestStep::config(fixture.with_default_tags_data_source()).check(compose(vec![
            check_resource_attr("data.aws_default_tags.current", "tags.%", "1"),
            check_resource_attr("data.aws_default_tags.current", "tags.Team", "network"),
            check_resource_attr(RESOURCE_NAME, "tags.%", "0"),
            check_resource_attr(RESOURCE_NAME, "tags_all.%", "1"),
            check_resource_attr(RESOURCE_NAME, "tags_all.Team", "network"),
        ])))
        .run(provider)
        .await
        .unwrap();
}
