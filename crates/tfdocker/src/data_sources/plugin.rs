//! docker_plugin データソース
//!
//! `/plugins/{name}/json` でインストール済みプラグインを参照する。無効なプラグインも読める。

use crate::ProviderData;
use serde::{Deserialize, Serialize};
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct PluginDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PluginDataModel {
    id: Option<String>,
    name: String,
    plugin_reference: Option<String>,
    enabled: Option<bool>,
    env: Option<Vec<String>>,
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads an installed Docker plugin.")
            .attribute(Attribute::computed_string("id").description("The plugin ID."))
            .attribute(Attribute::required_string("name").description("The plugin name or ID, e.g. vieux/sshfs."))
            .attribute(Attribute::computed_string("plugin_reference").description("The plugin reference."))
            .attribute(Attribute::computed_bool("enabled").description("Whether the plugin is enabled."))
            .attribute(Attribute::computed("env", Type::list(Type::String)).description("Plugin environment settings.")),
    )
}

#[async_trait]
impl DataSource<ProviderData> for PluginDataSource {
    fn type_name(&self) -> &'static str {
        "docker_plugin"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: PluginDataModel = decode(config, diags)?;

        let plugin = match data.api.inspect_plugin(&model.name).await {
            Ok(plugin) => plugin,
            Err(e) => {
                diags.error(
                    "Failed to Read Plugin",
                    format!("Unable to read plugin {}: {}", model.name, e),
                );
                return None;
            }
        };

        model.id = plugin.id;
        model.plugin_reference = plugin.plugin_reference;
        model.enabled = Some(plugin.enabled);
        // Settings.Env が無ければ null のまま
        model.env = plugin.settings.env;
        encode(&model, &schema(), diags)
    }
}
