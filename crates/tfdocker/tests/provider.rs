use serial_test::serial;
use std::collections::HashSet;
use tfdocker::DockerProvider;
use tfdocker_plugin::{Diagnostics, Provider, Value};

const DOCKER_VARS: [&str; 6] = [
    "DOCKER_HOST",
    "DOCKER_TLS_VERIFY",
    "DOCKER_CERT_PATH",
    "DOCKER_HUB_USERNAME",
    "DOCKER_HUB_PASSWORD",
    "DOCKER_HUB_TOKEN",
];

#[test]
fn test_resource_type_names() {
    let provider = DockerProvider::new();
    let names: Vec<&str> = provider.resources().iter().map(|r| r.type_name()).collect();

    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names.len(), 16);
    for expected in [
        "docker_image",
        "docker_network",
        "docker_volume",
        "docker_container",
        "docker_compose",
        "docker_secret",
        "docker_config",
        "docker_service",
        "docker_tag",
        "docker_registry_image",
        "docker_hub_repository",
        "docker_hub_repository_team_permission",
        "docker_org_team",
        "docker_org_member",
        "docker_org_team_member",
        "docker_access_token",
    ] {
        assert!(unique.contains(expected), "missing resource {}", expected);
    }
}

#[test]
fn test_data_source_type_names() {
    let provider = DockerProvider::new();
    let names: HashSet<&str> = provider
        .data_sources()
        .iter()
        .map(|d| d.type_name())
        .collect();

    for expected in [
        "docker_image",
        "docker_network",
        "docker_networks",
        "docker_container",
        "docker_compose",
        "docker_logs",
        "docker_plugin",
        "docker_registry_image",
        "docker_hub_repository",
        "docker_hub_repositories",
        "docker_hub_repository_tags",
        "docker_org",
        "docker_org_members",
        "docker_org_team",
        "docker_access_tokens",
    ] {
        assert!(names.contains(expected), "missing data source {}", expected);
    }
}

#[test]
fn test_every_schema_has_computed_id() {
    let provider = DockerProvider::new();
    for resource in provider.resources() {
        let schema = resource.schema();
        let id = schema
            .block
            .find_attribute("id")
            .unwrap_or_else(|| panic!("{} has no id", resource.type_name()));
        assert!(id.computed, "{} id is not computed", resource.type_name());
    }
    for data_source in provider.data_sources() {
        let schema = data_source.schema();
        assert!(
            schema.block.find_attribute("id").is_some(),
            "{} has no id",
            data_source.type_name()
        );
    }
}

#[test]
fn test_provider_schema_sensitive_attributes() {
    let schema = DockerProvider::new().schema();
    for name in ["ca_cert", "cert", "key", "hub_password", "hub_token"] {
        assert!(schema.block.find_attribute(name).unwrap().sensitive, "{}", name);
    }
    assert!(!schema.block.find_attribute("host").unwrap().sensitive);
}

#[test]
#[serial]
fn test_configure_requires_tls_material() {
    temp_env::with_vars_unset(DOCKER_VARS, || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut diags = Diagnostics::new();
        let config = Value::object([("tls_verify", Value::Bool(true))]);

        let data = runtime.block_on(DockerProvider::new().configure(&config, &mut diags));

        assert!(data.is_none());
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Missing TLS Configuration");
    });
}
