//! プロバイダー、リソース、データソースのトレイト
//!
//! 実装は自身のスキーマに沿った [`Value`] を扱い、問題は [`Diagnostics`] で
//! 報告する。state を返す操作の `None` は「state なし」を意味する。
//! エラーを記録したか、`read` ではリモートのオブジェクトが消えて
//! リソースが state から外れる。

use crate::diagnostics::Diagnostics;
use crate::schema::Schema;
use crate::value::Value;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Terraform プロバイダー
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// `configure` 後にリソースへ渡す共有クライアント
    type Data: Send + Sync + 'static;

    /// プロバイダーの型名（例: `docker`）
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// provider ブロックの静的検証。値はまだ unknown のことがある
    fn validate(&self, _config: &Value, _diags: &mut Diagnostics) {}

    async fn configure(&self, config: &Value, diags: &mut Diagnostics) -> Option<Self::Data>;

    fn resources(&self) -> Vec<Arc<dyn Resource<Self::Data>>>;

    fn data_sources(&self) -> Vec<Arc<dyn DataSource<Self::Data>>>;
}

/// 管理対象リソース
#[async_trait]
pub trait Resource<D: Send + Sync + 'static>: Send + Sync {
    /// 完全な型名（例: `docker_container`）
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// resource ブロックの静的検証。値はまだ unknown のことがある
    fn validate(&self, _config: &Value, _diags: &mut Diagnostics) {}

    async fn create(&self, data: &D, plan: &Value, diags: &mut Diagnostics) -> Option<Value>;

    /// state を更新する。エラーなしの `None` はリソースを state から外す
    async fn read(&self, data: &D, state: &Value, diags: &mut Diagnostics) -> Option<Value>;

    async fn update(
        &self,
        data: &D,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value>;

    async fn delete(&self, data: &D, state: &Value, diags: &mut Diagnostics);

    /// `terraform import` の初期 state を作る。この後 read が続く
    async fn import(&self, data: &D, id: &str, diags: &mut Diagnostics) -> Option<Value>;
}

/// 読み取り専用のデータソース
#[async_trait]
pub trait DataSource<D: Send + Sync + 'static>: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn validate(&self, _config: &Value, _diags: &mut Diagnostics) {}

    async fn read(&self, data: &D, config: &Value, diags: &mut Diagnostics) -> Option<Value>;
}

/// 値を型付きモデルに読み込む。失敗時は診断を記録する
pub fn decode<M: DeserializeOwned>(value: &Value, diags: &mut Diagnostics) -> Option<M> {
    match value.to_model() {
        Ok(model) => Some(model),
        Err(e) => {
            diags.error(
                "Value Conversion Error",
                format!("Unable to read Terraform value: {}", e),
            );
            None
        }
    }
}

/// 型付きモデルを `schema` に沿った値に変換する
pub fn encode<M: Serialize>(model: &M, schema: &Schema, diags: &mut Diagnostics) -> Option<Value> {
    match Value::from_model(model, &schema.value_type()) {
        Ok(value) => Some(schema.block.normalize(value)),
        Err(e) => {
            diags.error(
                "Value Conversion Error",
                format!("Unable to build Terraform value: {}", e),
            );
            None
        }
    }
}
