//! docker_access_tokens データソース

use crate::ProviderData;
use crate::data_sources::object_type;
use serde::{Deserialize, Serialize};
use tfdocker_hub::AccessToken;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, encode,
};

pub struct AccessTokensDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TokenDataModel {
    uuid: String,
    label: String,
    is_active: bool,
    created_at: Option<String>,
    last_used_at: Option<String>,
    generated_by: Option<String>,
}

// トークン本体は一覧に含めない
impl From<AccessToken> for TokenDataModel {
    fn from(token: AccessToken) -> Self {
        Self {
            uuid: token.uuid,
            label: token.label,
            is_active: token.is_active,
            created_at: token.created_at,
            last_used_at: token.last_used_at,
            generated_by: token.generated_by,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TokensDataModel {
    id: Option<String>,
    tokens: Vec<TokenDataModel>,
}

fn schema() -> Schema {
    let token = object_type(vec![
        ("uuid", Type::String),
        ("label", Type::String),
        ("is_active", Type::Bool),
        ("created_at", Type::String),
        ("last_used_at", Type::String),
        ("generated_by", Type::String),
    ]);
    Schema::new(
        Block::new()
            .description("Lists the personal access tokens of the authenticated Docker Hub user.")
            .attribute(Attribute::computed_string("id").description("Fixed identifier."))
            .attribute(Attribute::computed("tokens", Type::list(token)).description("Access tokens, without secrets.")),
    )
}

#[async_trait]
impl DataSource<ProviderData> for AccessTokensDataSource {
    fn type_name(&self) -> &'static str {
        "docker_access_tokens"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, _config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;

        match hub.list_access_tokens().await {
            Ok(tokens) => {
                let model = TokensDataModel {
                    id: Some("access_tokens".to_string()),
                    tokens: tokens.into_iter().map(TokenDataModel::from).collect(),
                };
                encode(&model, &schema(), diags)
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Access Tokens Read Failed",
                    format!("Unable to list access tokens: {}", e),
                );
                None
            }
        }
    }
}
