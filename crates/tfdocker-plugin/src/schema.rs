//! プロバイダー、リソース、データソースのスキーマモデル
//!
//! 属性はワイヤ上の記述に加えて、サーバーが代わりに適用するプラン時の
//! 振る舞いを持つ。静的デフォルト値、置き換えの契機、computed 値を
//! 更新後も保持するかどうか。

use crate::error::Result;
use crate::generated::tfplugin6 as proto;
use crate::types::Type;
use crate::value::Value;
use std::collections::BTreeMap;

/// スキーマの属性 1 つ
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: Type,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub requires_replace: bool,
    pub use_state_for_unknown: bool,
}

impl Attribute {
    fn new(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            default: None,
            requires_replace: false,
            use_state_for_unknown: false,
        }
    }

    pub fn required(name: &str, ty: Type) -> Self {
        Self {
            required: true,
            ..Self::new(name, ty)
        }
    }

    pub fn optional(name: &str, ty: Type) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }

    pub fn computed(name: &str, ty: Type) -> Self {
        Self {
            computed: true,
            ..Self::new(name, ty)
        }
    }

    pub fn optional_computed(name: &str, ty: Type) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(name, ty)
        }
    }

    pub fn required_string(name: &str) -> Self {
        Self::required(name, Type::String)
    }

    pub fn optional_string(name: &str) -> Self {
        Self::optional(name, Type::String)
    }

    pub fn computed_string(name: &str) -> Self {
        Self::computed(name, Type::String)
    }

    pub fn optional_bool(name: &str) -> Self {
        Self::optional(name, Type::Bool)
    }

    pub fn optional_number(name: &str) -> Self {
        Self::optional(name, Type::Number)
    }

    pub fn computed_number(name: &str) -> Self {
        Self::computed(name, Type::Number)
    }

    pub fn computed_bool(name: &str) -> Self {
        Self::computed(name, Type::Bool)
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// この属性が変わるとリソースを作り直す
    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    /// 設定で null のときに使う静的デフォルト値。
    /// デフォルト値を持つ属性は常に computed
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.computed = true;
        self
    }

    /// 更新時に unknown にせず前回の state の値を保つ
    pub fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    fn to_proto(&self) -> proto::schema::Attribute {
        proto::schema::Attribute {
            name: self.name.clone(),
            r#type: self.ty.to_json_bytes(),
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            description_kind: proto::StringKind::Plain as i32,
            deprecated: false,
        }
    }
}

/// ネストしたブロックの繰り返し方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Single,
    List,
    Set,
}

/// ネストした設定ブロック
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: Nesting,
    pub min_items: i64,
    pub max_items: i64,
    pub requires_replace: bool,
}

impl NestedBlock {
    fn new(type_name: &str, block: Block, nesting: Nesting) -> Self {
        Self {
            type_name: type_name.to_string(),
            block,
            nesting,
            min_items: 0,
            max_items: 0,
            requires_replace: false,
        }
    }

    pub fn single(type_name: &str, block: Block) -> Self {
        Self::new(type_name, block, Nesting::Single)
    }

    pub fn list(type_name: &str, block: Block) -> Self {
        Self::new(type_name, block, Nesting::List)
    }

    pub fn set(type_name: &str, block: Block) -> Self {
        Self::new(type_name, block, Nesting::Set)
    }

    pub fn min_items(mut self, n: i64) -> Self {
        self.min_items = n;
        self
    }

    pub fn max_items(mut self, n: i64) -> Self {
        self.max_items = n;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn value_type(&self) -> Type {
        let object = self.block.value_type();
        match self.nesting {
            Nesting::Single => object,
            Nesting::List => Type::list(object),
            Nesting::Set => Type::set(object),
        }
    }

    fn to_proto(&self) -> proto::schema::NestedBlock {
        use proto::schema::nested_block::NestingMode;

        let nesting = match self.nesting {
            Nesting::Single => NestingMode::Single,
            Nesting::List => NestingMode::List,
            Nesting::Set => NestingMode::Set,
        };

        proto::schema::NestedBlock {
            type_name: self.type_name.clone(),
            block: Some(self.block.to_proto(0)),
            nesting: nesting as i32,
            min_items: self.min_items,
            max_items: self.max_items,
        }
    }
}

/// 属性とネストしたブロックからなるブロック
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<NestedBlock>,
    pub description: String,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// このブロックの値を表すオブジェクト型
    pub fn value_type(&self) -> Type {
        let mut attrs = BTreeMap::new();
        for attribute in &self.attributes {
            attrs.insert(attribute.name.clone(), attribute.ty.clone());
        }
        for block in &self.blocks {
            attrs.insert(block.type_name.clone(), block.value_type());
        }
        Type::Object(attrs)
    }

    /// Terraform は list / set ブロックを null で保存しない。
    /// 無い繰り返しブロックは空のコレクションになる
    pub fn normalize(&self, value: Value) -> Value {
        let Value::Map(mut entries) = value else {
            return value;
        };

        for nested in &self.blocks {
            let current = entries.remove(&nested.type_name).unwrap_or(Value::Null);
            let normalized = match (nested.nesting, current) {
                (Nesting::Single, Value::Null) => Value::Null,
                (Nesting::Single, v) => nested.block.normalize(v),
                (_, Value::Null) => Value::List(Vec::new()),
                (_, Value::List(items)) => Value::List(
                    items
                        .into_iter()
                        .map(|item| nested.block.normalize(item))
                        .collect(),
                ),
                (_, other) => other,
            };
            entries.insert(nested.type_name.clone(), normalized);
        }

        Value::Map(entries)
    }

    /// JSON（保存済みの state など）を正規化したブロック値にする
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<Value> {
        let value = Value::from_json(json, &self.value_type())?;
        Ok(self.normalize(value))
    }

    fn to_proto(&self, version: i64) -> proto::schema::Block {
        proto::schema::Block {
            version,
            attributes: self.attributes.iter().map(Attribute::to_proto).collect(),
            block_types: self.blocks.iter().map(NestedBlock::to_proto).collect(),
            description: self.description.clone(),
            description_kind: proto::StringKind::Plain as i32,
            deprecated: false,
        }
    }
}

/// バージョン付きのトップレベルスキーマ
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self { version: 0, block }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn value_type(&self) -> Type {
        self.block.value_type()
    }

    pub fn to_proto(&self) -> proto::Schema {
        proto::Schema {
            version: self.version,
            block: Some(self.block.to_proto(self.version)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container_like() -> Block {
        Block::new()
            .attribute(Attribute::computed_string("id").use_state_for_unknown())
            .attribute(Attribute::required_string("name").requires_replace())
            .attribute(Attribute::optional_bool("must_run").with_default(true))
            .block(NestedBlock::list(
                "ports",
                Block::new()
                    .attribute(Attribute::required("internal", Type::Number))
                    .attribute(Attribute::optional_string("protocol").with_default("tcp")),
            ))
            .block(NestedBlock::single(
                "healthcheck",
                Block::new().attribute(Attribute::required("test", Type::list(Type::String))),
            ))
    }

    #[test]
    fn test_value_type_includes_blocks() {
        let ty = container_like().value_type();
        let Type::Object(attrs) = ty else {
            panic!("expected object type");
        };
        assert_eq!(attrs.len(), 5);
        assert!(matches!(attrs.get("ports"), Some(Type::List(_))));
        assert!(matches!(attrs.get("healthcheck"), Some(Type::Object(_))));
    }

    #[test]
    fn test_default_marks_attribute_computed() {
        let attr = Attribute::optional_bool("keep_locally").with_default(false);
        assert!(attr.optional);
        assert!(attr.computed);
        assert_eq!(attr.default, Some(Value::Bool(false)));
    }

    #[test]
    fn test_normalize_null_list_block() {
        let block = container_like();
        let value = Value::object([("name", Value::string("web"))]);
        let normalized = block.normalize(value);
        assert_eq!(normalized.get("ports"), &Value::List(vec![]));
        assert!(normalized.get("healthcheck").is_null());
    }

    #[test]
    fn test_proto_conversion() {
        let schema = Schema::new(container_like()).version(1);
        let proto = schema.to_proto();
        assert_eq!(proto.version, 1);

        let block = proto.block.unwrap();
        assert_eq!(block.attributes.len(), 3);
        assert_eq!(block.block_types.len(), 2);

        let must_run = block
            .attributes
            .iter()
            .find(|a| a.name == "must_run")
            .unwrap();
        assert!(must_run.optional && must_run.computed);
        assert_eq!(must_run.r#type, b"\"bool\"".to_vec());

        let ports = block
            .block_types
            .iter()
            .find(|b| b.type_name == "ports")
            .unwrap();
        assert_eq!(
            ports.nesting,
            proto::schema::nested_block::NestingMode::List as i32
        );
    }

    #[test]
    fn test_value_from_json() {
        let block = container_like();
        let json = serde_json::json!({"id": "abc", "name": "web", "must_run": true});
        let value = block.value_from_json(&json).unwrap();
        assert_eq!(value.get("id"), &Value::string("abc"));
        assert_eq!(value.get("ports"), &Value::List(vec![]));
    }
}
