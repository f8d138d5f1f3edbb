//! docker_access_token: Docker Hub の個人アクセストークン
//!
//! トークン本体は作成時のレスポンスにしか含まれないため、以後は state の値を保持する。

use crate::ProviderData;
use serde::{Deserialize, Serialize};
use tfdocker_hub::AccessToken;
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Type, Value, async_trait, decode, encode,
};

pub struct AccessTokenResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct AccessTokenModel {
    id: Option<String>,
    uuid: Option<String>,
    label: String,
    scopes: Option<Vec<String>>,
    is_active: Option<bool>,
    token: Option<String>,
}

impl AccessTokenModel {
    fn apply(&mut self, token: AccessToken) {
        self.id = Some(token.uuid.clone());
        self.uuid = Some(token.uuid);
        self.label = token.label;
        self.scopes = Some(token.scopes);
        self.is_active = Some(token.is_active);
        if let Some(secret) = token.token.filter(|t| !t.is_empty()) {
            self.token = Some(secret);
        }
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages a Docker Hub personal access token.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The token UUID.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::computed_string("uuid")
                    .description("The token UUID.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("label")
                    .description("The token label.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required("scopes", Type::list(Type::String))
                    .description("Token scopes, e.g. repo:read or repo:write.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_bool("is_active")
                    .description("Whether the token is active. Default is true.")
                    .with_default(true),
            )
            .attribute(
                Attribute::computed_string("token")
                    .description("The token secret. Only available after creation.")
                    .sensitive()
                    .use_state_for_unknown(),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for AccessTokenResource {
    fn type_name(&self) -> &'static str {
        "docker_access_token"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: AccessTokenModel = decode(plan, diags)?;
        let scopes = model.scopes.clone().unwrap_or_default();
        let is_active = model.is_active.unwrap_or(true);

        match hub.create_access_token(&model.label, &scopes).await {
            Ok(token) => model.apply(token),
            Err(e) => {
                diags.error(
                    "Docker Hub Access Token Create Failed",
                    format!("Unable to create access token {}: {}", model.label, e),
                );
                return None;
            }
        }

        // 新しいトークンは常に有効なので、無効指定ならここで切り替える。
        // 失敗時はエラーにしつつ実際の状態（有効）を返し、トークンを state に残す
        if !is_active {
            if let Some(uuid) = model.uuid.clone() {
                match hub.update_access_token(&uuid, false).await {
                    Ok(token) => model.is_active = Some(token.is_active),
                    Err(e) => diags.error(
                        "Access Token Deactivation Failed",
                        format!("Token {} was created but could not be deactivated: {}", uuid, e),
                    ),
                }
            }
        }

        diags.warning(
            "Access Token Created",
            "The token value is only available now. Store it securely; it cannot be retrieved again.",
        );
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: AccessTokenModel = decode(state, diags)?;
        let uuid = model.uuid.clone().or_else(|| model.id.clone()).unwrap_or_default();

        match hub.get_access_token(&uuid).await {
            Ok(token) => model.apply(token),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Access token {} not found, removing from state", uuid);
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Access Token Read Failed",
                    format!("Unable to read access token {}: {}", uuid, e),
                );
                return None;
            }
        }
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: AccessTokenModel = decode(plan, diags)?;
        let prior: AccessTokenModel = decode(prior, diags)?;
        let uuid = prior.uuid.clone().or_else(|| prior.id.clone()).unwrap_or_default();

        match hub
            .update_access_token(&uuid, model.is_active.unwrap_or(true))
            .await
        {
            Ok(token) => model.apply(token),
            Err(e) => {
                diags.error(
                    "Docker Hub Access Token Update Failed",
                    format!("Unable to update access token {}: {}", uuid, e),
                );
                return None;
            }
        }

        model.token = model.token.or(prior.token);
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(hub) = data.hub(diags) else {
            return;
        };
        let Some(model) = decode::<AccessTokenModel>(state, diags) else {
            return;
        };
        let uuid = model.uuid.or(model.id).unwrap_or_default();

        match hub.delete_access_token(&uuid).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Docker Hub Access Token Delete Failed",
                format!("Unable to delete access token {}: {}", uuid, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = AccessTokenModel {
            id: Some(id.to_string()),
            uuid: Some(id.to_string()),
            ..Default::default()
        };
        diags.warning(
            "Access Token Value Unavailable",
            "Imported access tokens do not include the token value; it is only returned at creation.",
        );
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_secret() {
        let mut model = AccessTokenModel {
            token: Some("dckr_pat_secret".to_string()),
            ..Default::default()
        };
        model.apply(AccessToken {
            uuid: "b30bbf97".to_string(),
            label: "ci".to_string(),
            scopes: vec!["repo:read".to_string()],
            is_active: true,
            token: None,
            ..Default::default()
        });

        assert_eq!(model.id.as_deref(), Some("b30bbf97"));
        assert_eq!(model.token.as_deref(), Some("dckr_pat_secret"));
        assert_eq!(model.scopes, Some(vec!["repo:read".to_string()]));
    }

    #[test]
    fn test_token_is_sensitive() {
        let schema = schema();
        let token = schema.block.find_attribute("token").unwrap();
        assert!(token.sensitive);
        assert!(token.computed);
    }
}
