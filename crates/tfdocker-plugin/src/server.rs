//! [`Provider`] 実装を裏に持つ tfplugin6 gRPC サービス

use crate::diagnostics::Diagnostics;
use crate::error::PluginError;
use crate::generated::plugin;
use crate::generated::tfplugin6 as proto;
use crate::plan::plan_resource_change;
use crate::resource::{DataSource, Provider, Resource};
use crate::schema::Schema;
use crate::types::Type;
use crate::value::Value;
use proto::provider_server::Provider as ProviderRpc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tonic::{Request, Response, Status};

struct Registered<T: ?Sized> {
    handler: Arc<T>,
    schema: Schema,
}

/// プロバイダーの gRPC 窓口。`ConfigureProvider` で作ったデータを
/// 以降のリソース呼び出しまで保持する
pub struct PluginService<P: Provider> {
    provider: Arc<P>,
    schema: Schema,
    resources: HashMap<String, Registered<dyn Resource<P::Data>>>,
    data_sources: HashMap<String, Registered<dyn DataSource<P::Data>>>,
    data: RwLock<Option<Arc<P::Data>>>,
    shutdown: Arc<Notify>,
}

impl<P: Provider> PluginService<P> {
    pub fn new(provider: P, shutdown: Arc<Notify>) -> Self {
        let resources = provider
            .resources()
            .into_iter()
            .map(|handler| {
                let schema = handler.schema();
                (handler.type_name().to_string(), Registered { handler, schema })
            })
            .collect();
        let data_sources = provider
            .data_sources()
            .into_iter()
            .map(|handler| {
                let schema = handler.schema();
                (handler.type_name().to_string(), Registered { handler, schema })
            })
            .collect();

        Self {
            schema: provider.schema(),
            provider: Arc::new(provider),
            resources,
            data_sources,
            data: RwLock::new(None),
            shutdown,
        }
    }

    async fn provider_data(&self, diags: &mut Diagnostics) -> Option<Arc<P::Data>> {
        let data = self.data.read().await.clone();
        if data.is_none() {
            diags.error(
                "Provider Not Configured",
                format!(
                    "The {} provider was not configured before use. This is always a bug in the provider.",
                    self.provider.type_name()
                ),
            );
        }
        data
    }

    fn resource(
        &self,
        type_name: &str,
        diags: &mut Diagnostics,
    ) -> Option<&Registered<dyn Resource<P::Data>>> {
        let found = self.resources.get(type_name);
        if found.is_none() {
            diags.error(
                "Unknown Resource Type",
                format!("The resource type {} is not supported by this provider.", type_name),
            );
        }
        found
    }

    fn data_source(
        &self,
        type_name: &str,
        diags: &mut Diagnostics,
    ) -> Option<&Registered<dyn DataSource<P::Data>>> {
        let found = self.data_sources.get(type_name);
        if found.is_none() {
            diags.error(
                "Unknown Data Source Type",
                format!("The data source type {} is not supported by this provider.", type_name),
            );
        }
        found
    }
}

fn decode_dynamic(
    value: Option<&proto::DynamicValue>,
    ty: &Type,
    diags: &mut Diagnostics,
) -> Option<Value> {
    let Some(value) = value else {
        return Some(Value::Null);
    };

    let decoded = if !value.msgpack.is_empty() {
        Value::from_msgpack(&value.msgpack, ty)
    } else if !value.json.is_empty() {
        serde_json::from_slice::<serde_json::Value>(&value.json)
            .map_err(PluginError::from)
            .and_then(|json| Value::from_json(&json, ty))
    } else {
        Ok(Value::Null)
    };

    diags.ok(decoded, "Invalid Request Value")
}

fn encode_dynamic(value: &Value, ty: &Type, diags: &mut Diagnostics) -> Option<proto::DynamicValue> {
    let msgpack = diags.ok(value.to_msgpack(ty), "Invalid Response Value")?;
    Some(proto::DynamicValue {
        msgpack,
        json: Vec::new(),
    })
}

fn capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

#[tonic::async_trait]
impl<P: Provider> ProviderRpc for PluginService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(capabilities()),
            diagnostics: Vec::new(),
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        tracing::debug!("GetProviderSchema");

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(self.schema.to_proto()),
            resource_schemas: self
                .resources
                .iter()
                .map(|(name, r)| (name.clone(), r.schema.to_proto()))
                .collect(),
            data_source_schemas: self
                .data_sources
                .iter()
                .map(|(name, d)| (name.clone(), d.schema.to_proto()))
                .collect(),
            diagnostics: Vec::new(),
            provider_meta: None,
            server_capabilities: Some(capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();

        if let Some(config) =
            decode_dynamic(request.config.as_ref(), &self.schema.value_type(), &mut diags)
        {
            self.provider.validate(&config, &mut diags);
        }

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diags.to_proto(),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();

        if let Some(resource) = self.resource(&request.type_name, &mut diags)
            && let Some(config) = decode_dynamic(
                request.config.as_ref(),
                &resource.schema.value_type(),
                &mut diags,
            )
        {
            resource.handler.validate(&config, &mut diags);
        }

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diags.to_proto(),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();

        if let Some(data_source) = self.data_source(&request.type_name, &mut diags)
            && let Some(config) = decode_dynamic(
                request.config.as_ref(),
                &data_source.schema.value_type(),
                &mut diags,
            )
        {
            data_source.handler.validate(&config, &mut diags);
        }

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diags.to_proto(),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();
        let mut upgraded_state = None;

        if let Some(resource) = self.resource(&request.type_name, &mut diags) {
            let raw = request.raw_state.unwrap_or_default();
            if raw.json.is_empty() {
                diags.error(
                    "Unsupported State Format",
                    "Only JSON encoded state can be upgraded; flatmap state is not supported.",
                );
            } else if let Some(json) = diags.ok(
                serde_json::from_slice::<serde_json::Value>(&raw.json),
                "Invalid Stored State",
            ) && let Some(state) =
                diags.ok(resource.schema.block.value_from_json(&json), "Invalid Stored State")
            {
                upgraded_state = encode_dynamic(&state, &resource.schema.value_type(), &mut diags);
            }
        }

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state,
            diagnostics: diags.to_proto(),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();

        tracing::info!(
            terraform_version = %request.terraform_version,
            "Configuring {} provider",
            self.provider.type_name()
        );

        if let Some(config) =
            decode_dynamic(request.config.as_ref(), &self.schema.value_type(), &mut diags)
            && let Some(data) = self.provider.configure(&config, &mut diags).await
            && !diags.has_error()
        {
            *self.data.write().await = Some(Arc::new(data));
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diags.to_proto(),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();
        let mut new_state = request.current_state.clone();

        tracing::debug!(type_name = %request.type_name, "ReadResource");

        if let Some(resource) = self.resource(&request.type_name, &mut diags)
            && let Some(data) = self.provider_data(&mut diags).await
        {
            let ty = resource.schema.value_type();
            if let Some(current) = decode_dynamic(request.current_state.as_ref(), &ty, &mut diags) {
                let refreshed = resource.handler.read(&data, &current, &mut diags).await;
                match refreshed {
                    Some(state) => {
                        new_state = encode_dynamic(&state.without_unknowns(), &ty, &mut diags);
                    }
                    None if !diags.has_error() => {
                        tracing::debug!(type_name = %request.type_name, "Resource gone, removing from state");
                        new_state = encode_dynamic(&Value::Null, &ty, &mut diags);
                    }
                    None => {}
                }
            }
        }

        Ok(Response::new(proto::read_resource::Response {
            new_state,
            diagnostics: diags.to_proto(),
            private: request.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        use proto::attribute_path::Step;
        use proto::attribute_path::step::Selector;

        let request = request.into_inner();
        let mut diags = Diagnostics::new();
        let mut planned_state = None;
        let mut requires_replace = Vec::new();

        if let Some(resource) = self.resource(&request.type_name, &mut diags) {
            let ty = resource.schema.value_type();
            let prior = decode_dynamic(request.prior_state.as_ref(), &ty, &mut diags);
            let proposed = decode_dynamic(request.proposed_new_state.as_ref(), &ty, &mut diags);
            let config = decode_dynamic(request.config.as_ref(), &ty, &mut diags);

            if let (Some(prior), Some(proposed), Some(config)) = (prior, proposed, config) {
                let change = plan_resource_change(&resource.schema, &prior, &proposed, &config);
                planned_state = encode_dynamic(&change.planned, &ty, &mut diags);
                requires_replace = change
                    .requires_replace
                    .into_iter()
                    .map(|name| proto::AttributePath {
                        steps: vec![Step {
                            selector: Some(Selector::AttributeName(name)),
                        }],
                    })
                    .collect();
            }
        }

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state,
            requires_replace,
            planned_private: request.prior_private,
            diagnostics: diags.to_proto(),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();
        let mut new_state = request.prior_state.clone();

        if let Some(resource) = self.resource(&request.type_name, &mut diags)
            && let Some(data) = self.provider_data(&mut diags).await
        {
            let ty = resource.schema.value_type();
            let prior = decode_dynamic(request.prior_state.as_ref(), &ty, &mut diags);
            let planned = decode_dynamic(request.planned_state.as_ref(), &ty, &mut diags);

            if let (Some(prior), Some(planned)) = (prior, planned) {
                let handler = &resource.handler;
                let result = if planned.is_null() {
                    tracing::debug!(type_name = %request.type_name, "Deleting resource");
                    handler.delete(&data, &prior, &mut diags).await;
                    if diags.has_error() {
                        None
                    } else {
                        Some(Value::Null)
                    }
                } else if prior.is_null() {
                    tracing::debug!(type_name = %request.type_name, "Creating resource");
                    handler.create(&data, &planned, &mut diags).await
                } else {
                    tracing::debug!(type_name = %request.type_name, "Updating resource");
                    handler.update(&data, &prior, &planned, &mut diags).await
                };

                if let Some(state) = result {
                    new_state = encode_dynamic(&state.without_unknowns(), &ty, &mut diags);
                }
            }
        }

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state,
            private: request.planned_private,
            diagnostics: diags.to_proto(),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();
        let mut imported_resources = Vec::new();

        tracing::debug!(type_name = %request.type_name, id = %request.id, "ImportResourceState");

        if let Some(resource) = self.resource(&request.type_name, &mut diags)
            && let Some(data) = self.provider_data(&mut diags).await
            && let Some(state) = resource.handler.import(&data, &request.id, &mut diags).await
            && let Some(state) = encode_dynamic(
                &state.without_unknowns(),
                &resource.schema.value_type(),
                &mut diags,
            )
        {
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: request.type_name.clone(),
                state: Some(state),
                private: Vec::new(),
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diags.to_proto(),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let request = request.into_inner();
        let mut diags = Diagnostics::new();
        let mut state = None;

        tracing::debug!(type_name = %request.type_name, "ReadDataSource");

        if let Some(data_source) = self.data_source(&request.type_name, &mut diags)
            && let Some(data) = self.provider_data(&mut diags).await
        {
            let ty = data_source.schema.value_type();
            if let Some(config) = decode_dynamic(request.config.as_ref(), &ty, &mut diags)
                && let Some(result) = data_source.handler.read(&data, &config, &mut diags).await
            {
                let result = data_source.schema.block.normalize(result.without_unknowns());
                state = encode_dynamic(&result, &ty, &mut diags);
            }
        }

        Ok(Response::new(proto::read_data_source::Response {
            state,
            diagnostics: diags.to_proto(),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("StopProvider received, shutting down");
        self.shutdown.notify_one();
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

/// go-plugin コントローラー。Terraform は用が済むと `Shutdown` を呼ぶ
pub struct ControllerService {
    shutdown: Arc<Notify>,
}

impl ControllerService {
    pub fn new(shutdown: Arc<Notify>) -> Self {
        Self { shutdown }
    }
}

#[tonic::async_trait]
impl plugin::grpc_controller_server::GrpcController for ControllerService {
    async fn shutdown(
        &self,
        _request: Request<plugin::Empty>,
    ) -> Result<Response<plugin::Empty>, Status> {
        tracing::debug!("GRPCController.Shutdown received");
        self.shutdown.notify_one();
        Ok(Response::new(plugin::Empty {}))
    }
}
