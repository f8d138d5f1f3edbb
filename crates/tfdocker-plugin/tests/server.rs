//! メモリ上のプロバイダーに対する PluginService のテスト

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tfdocker_plugin::generated::tfplugin6 as proto;
use tfdocker_plugin::generated::tfplugin6::provider_server::Provider as _;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, PluginService, Provider, Resource, Schema, Value,
    async_trait, decode, encode,
};
use tokio::sync::Notify;
use tonic::Request;

struct Store {
    creates: AtomicUsize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ThingModel {
    id: Option<String>,
    name: String,
    size: Option<i64>,
}

struct TestProvider;

#[async_trait]
impl Provider for TestProvider {
    type Data = Store;

    fn type_name(&self) -> &'static str {
        "test"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new().attribute(Attribute::optional_string("host")))
    }

    async fn configure(&self, config: &Value, diags: &mut Diagnostics) -> Option<Store> {
        if config.get("host").as_str() == Some("bad") {
            diags.attribute_error("host", "Invalid Host", "bad host");
            return None;
        }
        Some(Store {
            creates: AtomicUsize::new(0),
        })
    }

    fn resources(&self) -> Vec<Arc<dyn Resource<Store>>> {
        vec![Arc::new(ThingResource)]
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSource<Store>>> {
        vec![Arc::new(EchoDataSource)]
    }
}

struct ThingResource;

fn thing_schema() -> Schema {
    Schema::new(
        Block::new()
            .attribute(Attribute::computed_string("id").use_state_for_unknown())
            .attribute(Attribute::required_string("name").requires_replace())
            .attribute(Attribute::optional_number("size").with_default(1i64)),
    )
}

#[async_trait]
impl Resource<Store> for ThingResource {
    fn type_name(&self) -> &'static str {
        "test_thing"
    }

    fn schema(&self) -> Schema {
        thing_schema()
    }

    async fn create(&self, data: &Store, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ThingModel = decode(plan, diags)?;
        let n = data.creates.fetch_add(1, Ordering::SeqCst);
        model.id = Some(format!("thing-{}", n));
        encode(&model, &thing_schema(), diags)
    }

    async fn read(&self, _data: &Store, state: &Value, _diags: &mut Diagnostics) -> Option<Value> {
        if state.get("name").as_str() == Some("gone") {
            return None;
        }
        Some(state.clone())
    }

    async fn update(
        &self,
        _data: &Store,
        _prior: &Value,
        plan: &Value,
        _diags: &mut Diagnostics,
    ) -> Option<Value> {
        Some(plan.clone())
    }

    async fn delete(&self, _data: &Store, _state: &Value, _diags: &mut Diagnostics) {}

    async fn import(&self, _data: &Store, id: &str, _diags: &mut Diagnostics) -> Option<Value> {
        Some(Value::object([("id", Value::string(id))]))
    }
}

struct EchoDataSource;

#[async_trait]
impl DataSource<Store> for EchoDataSource {
    fn type_name(&self) -> &'static str {
        "test_echo"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attribute(Attribute::required_string("input"))
                .attribute(Attribute::computed_string("output")),
        )
    }

    async fn read(&self, _data: &Store, config: &Value, _diags: &mut Diagnostics) -> Option<Value> {
        let mut state = config.clone();
        state.set("output", config.get("input").clone());
        Some(state)
    }
}

fn service() -> PluginService<TestProvider> {
    PluginService::new(TestProvider, Arc::new(Notify::new()))
}

fn dynamic(value: &Value, schema: &Schema) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: value.to_msgpack(&schema.value_type()).unwrap(),
        json: Vec::new(),
    })
}

fn undynamic(value: Option<proto::DynamicValue>, schema: &Schema) -> Value {
    Value::from_msgpack(&value.unwrap().msgpack, &schema.value_type()).unwrap()
}

async fn configure(service: &PluginService<TestProvider>, host: &str) -> Vec<proto::Diagnostic> {
    let schema = TestProvider.schema();
    service
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: dynamic(&Value::object([("host", Value::string(host))]), &schema),
        }))
        .await
        .unwrap()
        .into_inner()
        .diagnostics
}

#[tokio::test]
async fn test_metadata_lists_registered_types() {
    let service = service();
    let response = service
        .get_metadata(Request::new(proto::get_metadata::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.resources[0].type_name, "test_thing");
    assert_eq!(response.data_sources[0].type_name, "test_echo");
    assert!(response.server_capabilities.unwrap().plan_destroy);
}

#[tokio::test]
async fn test_provider_schema() {
    let response = service()
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert!(response.provider.is_some());
    assert!(response.resource_schemas.contains_key("test_thing"));
    assert!(response.data_source_schemas.contains_key("test_echo"));
}

#[tokio::test]
async fn test_read_before_configure_fails() {
    let service = service();
    let schema = EchoDataSource.schema();
    let response = service
        .read_data_source(Request::new(proto::read_data_source::Request {
            type_name: "test_echo".to_string(),
            config: dynamic(&Value::object([("input", Value::string("x"))]), &schema),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.state.is_none());
    assert_eq!(response.diagnostics[0].summary, "Provider Not Configured");
}

#[tokio::test]
async fn test_configure_reports_attribute_error() {
    let service = service();
    let diagnostics = configure(&service, "bad").await;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].summary, "Invalid Host");
}

#[tokio::test]
async fn test_unknown_resource_type() {
    let service = service();
    let response = service
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "test_missing".to_string(),
            config: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics[0].summary, "Unknown Resource Type");
}

#[tokio::test]
async fn test_plan_and_apply_create() {
    let service = service();
    assert!(configure(&service, "local").await.is_empty());

    let schema = thing_schema();
    let config = Value::object([
        ("id", Value::Null),
        ("name", Value::string("alpha")),
        ("size", Value::Null),
    ]);

    let plan = service
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "test_thing".to_string(),
            prior_state: dynamic(&Value::Null, &schema),
            proposed_new_state: dynamic(&config, &schema),
            config: dynamic(&config, &schema),
            prior_private: Vec::new(),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(plan.diagnostics.is_empty());

    let planned = undynamic(plan.planned_state.clone(), &schema);
    assert!(planned.get("id").is_unknown());
    assert_eq!(planned.get("size"), &Value::Number(1.0));

    let apply = service
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "test_thing".to_string(),
            prior_state: dynamic(&Value::Null, &schema),
            planned_state: plan.planned_state,
            config: dynamic(&config, &schema),
            planned_private: Vec::new(),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(apply.diagnostics.is_empty());

    let state = undynamic(apply.new_state, &schema);
    assert_eq!(state.get("id"), &Value::string("thing-0"));
    assert_eq!(state.get("name"), &Value::string("alpha"));
}

#[tokio::test]
async fn test_read_removes_gone_resource() {
    let service = service();
    configure(&service, "local").await;

    let schema = thing_schema();
    let state = Value::object([
        ("id", Value::string("thing-9")),
        ("name", Value::string("gone")),
        ("size", Value::Number(1.0)),
    ]);

    let response = service
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "test_thing".to_string(),
            current_state: dynamic(&state, &schema),
            private: Vec::new(),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty());
    assert!(undynamic(response.new_state, &schema).is_null());
}

#[tokio::test]
async fn test_upgrade_state_from_json() {
    let service = service();
    let response = service
        .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
            type_name: "test_thing".to_string(),
            version: 0,
            raw_state: Some(proto::RawState {
                json: br#"{"id":"thing-1","name":"alpha","size":3}"#.to_vec(),
                flatmap: Default::default(),
            }),
        }))
        .await
        .unwrap()
        .into_inner();

    let state = undynamic(response.upgraded_state, &thing_schema());
    assert_eq!(state.get("size"), &Value::Number(3.0));
}

#[tokio::test]
async fn test_import_returns_state() {
    let service = service();
    configure(&service, "local").await;

    let response = service
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "test_thing".to_string(),
            id: "thing-42".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.imported_resources.len(), 1);
    let state = undynamic(response.imported_resources[0].state.clone(), &thing_schema());
    assert_eq!(state.get("id"), &Value::string("thing-42"));
}
