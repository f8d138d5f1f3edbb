//! Terraform がワイヤ上で使う cty の型システム

use serde_json::json;
use std::collections::BTreeMap;

/// Terraform（cty）の型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Bool,
    Number,
    String,
    List(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>),
    Object(BTreeMap<String, Type>),
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    pub fn map(element: Type) -> Self {
        Type::Map(Box::new(element))
    }

    /// JSON の型制約表現（`"string"`、`["list","string"]` など）
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Type::Bool => json!("bool"),
            Type::Number => json!("number"),
            Type::String => json!("string"),
            Type::List(t) => json!(["list", t.to_json()]),
            Type::Set(t) => json!(["set", t.to_json()]),
            Type::Map(t) => json!(["map", t.to_json()]),
            Type::Object(attrs) => {
                let attrs: serde_json::Map<String, serde_json::Value> = attrs
                    .iter()
                    .map(|(name, t)| (name.clone(), t.to_json()))
                    .collect();
                json!(["object", attrs])
            }
        }
    }

    /// `Schema.Attribute.type` に入れるバイト列
    pub fn to_json_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_encoding() {
        assert_eq!(Type::String.to_json(), json!("string"));
        assert_eq!(Type::Number.to_json(), json!("number"));
        assert_eq!(Type::Bool.to_json(), json!("bool"));
    }

    #[test]
    fn test_nested_encoding() {
        let mut attrs = BTreeMap::new();
        attrs.insert("internal".to_string(), Type::Number);
        attrs.insert("labels".to_string(), Type::map(Type::String));
        let ty = Type::list(Type::Object(attrs));

        assert_eq!(
            ty.to_json(),
            json!(["list", ["object", {"internal": "number", "labels": ["map", "string"]}]])
        );
        assert_eq!(
            String::from_utf8(Type::set(Type::String).to_json_bytes()).unwrap(),
            r#"["set","string"]"#
        );
    }
}
