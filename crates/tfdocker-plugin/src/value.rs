//! Terraform とやり取りする動的な値
//!
//! Terraform はスキーマの型に沿った msgpack ドキュメントで値を送受信する。
//! unknown 値（"known after apply"）は msgpack の拡張型 0 で運ばれる。
//! state のアップグレードは JSON で届く。

use crate::error::{PluginError, Result};
use crate::types::Type;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Terraform が unknown 値に使う msgpack 拡張コード
const UNKNOWN_EXT: i8 = 0;

/// `i64` を経由しても欠落しない最大の絶対値
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

static NULL: Value = Value::Null;

/// Terraform の値。list / set / tuple は `List`、map / object は `Map` を共有し、
/// エンコード時にスキーマの型で区別する
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Unknown,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// 名前と値の組からオブジェクト値を作る
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// この値にもネストした値にも unknown が無ければ true
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Value::Unknown => false,
            Value::List(items) => items.iter().all(Value::is_wholly_known),
            Value::Map(entries) => entries.values().all(Value::is_wholly_known),
            _ => true,
        }
    }

    /// オブジェクト値の属性を引く。無い属性は null
    pub fn get(&self, name: &str) -> &Value {
        match self {
            Value::Map(entries) => entries.get(name).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// オブジェクト値に属性を設定する。オブジェクト以外では何もしない
    pub fn set(&mut self, name: &str, value: Value) {
        if let Value::Map(entries) = self {
            entries.insert(name.to_string(), value);
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            _ => &[],
        }
    }

    /// ネストした unknown をすべて null に置き換える
    pub fn without_unknowns(self) -> Value {
        match self {
            Value::Unknown => Value::Null,
            Value::List(items) => {
                Value::List(items.into_iter().map(Value::without_unknowns).collect())
            }
            Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.without_unknowns()))
                    .collect(),
            ),
            other => other,
        }
    }

    // ============ msgpack ============

    /// 指定した型の msgpack ドキュメントをデコードする
    pub fn from_msgpack(bytes: &[u8], ty: &Type) -> Result<Value> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        let mut reader = bytes;
        let raw = rmpv::decode::read_value(&mut reader)
            .map_err(|e| PluginError::Decode(e.to_string()))?;
        from_rmpv(raw, ty)
    }

    /// 指定した型の msgpack ドキュメントにエンコードする
    pub fn to_msgpack(&self, ty: &Type) -> Result<Vec<u8>> {
        let raw = to_rmpv(self, ty)?;
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &raw)
            .map_err(|e| PluginError::Encode(e.to_string()))?;
        Ok(buf)
    }

    // ============ JSON ============

    /// JSON を指定した型の値に変換する。JSON に無い属性は null になり、
    /// 想定外のキーは捨てる
    pub fn from_json(json: &serde_json::Value, ty: &Type) -> Result<Value> {
        use serde_json::Value as Json;

        if json.is_null() {
            return Ok(Value::Null);
        }

        let mismatch = || PluginError::Decode(format!("expected {}, got {}", ty.to_json(), json));

        match ty {
            Type::Bool => match json {
                Json::Bool(b) => Ok(Value::Bool(*b)),
                Json::String(s) => s.parse().map(Value::Bool).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            Type::Number => match json {
                Json::Number(n) => n.as_f64().map(Value::Number).ok_or_else(mismatch),
                Json::String(s) => s.parse().map(Value::Number).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            Type::String => match json {
                Json::String(s) => Ok(Value::String(s.clone())),
                Json::Number(n) => Ok(Value::String(n.to_string())),
                Json::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(mismatch()),
            },
            Type::List(elem) | Type::Set(elem) => match json {
                Json::Array(items) => items
                    .iter()
                    .map(|item| Value::from_json(item, elem))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                _ => Err(mismatch()),
            },
            Type::Map(elem) => match json {
                Json::Object(entries) => entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Value::from_json(v, elem)?)))
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Value::Map),
                _ => Err(mismatch()),
            },
            Type::Object(attrs) => match json {
                Json::Object(entries) => attrs
                    .iter()
                    .map(|(name, attr_ty)| {
                        let value = match entries.get(name) {
                            Some(v) => Value::from_json(v, attr_ty)?,
                            None => Value::Null,
                        };
                        Ok((name.clone(), value))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Value::Map),
                _ => Err(mismatch()),
            },
        }
    }

    /// JSON に変換する。null と unknown の要素は省き、モデルへの
    /// デシリアライズ時に serde のデフォルト値が効くようにする
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null | Value::Unknown => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .filter(|(_, v)| !v.is_null() && !v.is_unknown())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    // ============ serde models ============

    /// 型付きモデルにデシリアライズする
    pub fn to_model<M: DeserializeOwned>(&self) -> Result<M> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// 型付きモデルを指定した型の値にシリアライズする
    pub fn from_model<M: Serialize>(model: &M, ty: &Type) -> Result<Value> {
        let json = serde_json::to_value(model)?;
        Value::from_json(&json, ty)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn from_rmpv(raw: rmpv::Value, ty: &Type) -> Result<Value> {
    use rmpv::Value as Raw;

    let mismatch = |raw: &Raw| PluginError::Decode(format!("expected {}, got {}", ty.to_json(), raw));

    match raw {
        Raw::Nil => return Ok(Value::Null),
        // refined unknown は別の拡張コードを使うが、どれも unknown として扱う
        Raw::Ext(_, _) => return Ok(Value::Unknown),
        _ => {}
    }

    match ty {
        Type::Bool => match raw {
            Raw::Boolean(b) => Ok(Value::Bool(b)),
            other => Err(mismatch(&other)),
        },
        Type::Number => match raw {
            Raw::Integer(i) => i
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| PluginError::Decode(format!("integer out of range: {:?}", i))),
            Raw::F32(f) => Ok(Value::Number(f as f64)),
            Raw::F64(f) => Ok(Value::Number(f)),
            Raw::String(s) => {
                let text = s.as_str().unwrap_or_default().to_string();
                text.parse()
                    .map(Value::Number)
                    .map_err(|_| PluginError::Decode(format!("invalid number: {}", text)))
            }
            other => Err(mismatch(&other)),
        },
        Type::String => match raw {
            Raw::String(s) => s
                .into_str()
                .map(Value::String)
                .ok_or_else(|| PluginError::Decode("invalid UTF-8 string".to_string())),
            other => Err(mismatch(&other)),
        },
        Type::List(elem) | Type::Set(elem) => match raw {
            Raw::Array(items) => items
                .into_iter()
                .map(|item| from_rmpv(item, elem))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(mismatch(&other)),
        },
        Type::Map(elem) => match raw {
            Raw::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((map_key(k)?, from_rmpv(v, elem)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Map),
            other => Err(mismatch(&other)),
        },
        Type::Object(attrs) => match raw {
            Raw::Map(entries) => {
                let mut decoded = BTreeMap::new();
                for (k, v) in entries {
                    let key = map_key(k)?;
                    if let Some(attr_ty) = attrs.get(&key) {
                        decoded.insert(key, from_rmpv(v, attr_ty)?);
                    }
                }
                for name in attrs.keys() {
                    decoded.entry(name.clone()).or_insert(Value::Null);
                }
                Ok(Value::Map(decoded))
            }
            other => Err(mismatch(&other)),
        },
    }
}

fn map_key(raw: rmpv::Value) -> Result<String> {
    match raw {
        rmpv::Value::String(s) => s
            .into_str()
            .ok_or_else(|| PluginError::Decode("invalid UTF-8 map key".to_string())),
        other => Err(PluginError::Decode(format!("map key must be a string, got {}", other))),
    }
}

fn to_rmpv(value: &Value, ty: &Type) -> Result<rmpv::Value> {
    use rmpv::Value as Raw;

    let mismatch = || PluginError::Encode(format!("value {:?} does not conform to {}", value, ty.to_json()));

    match (value, ty) {
        (Value::Null, _) => Ok(Raw::Nil),
        (Value::Unknown, _) => Ok(Raw::Ext(UNKNOWN_EXT, vec![0])),
        (Value::Bool(b), Type::Bool) => Ok(Raw::Boolean(*b)),
        (Value::Number(n), Type::Number) => {
            if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT {
                Ok(Raw::from(*n as i64))
            } else {
                Ok(Raw::F64(*n))
            }
        }
        (Value::String(s), Type::String) => Ok(Raw::from(s.as_str())),
        (Value::List(items), Type::List(elem) | Type::Set(elem)) => items
            .iter()
            .map(|item| to_rmpv(item, elem))
            .collect::<Result<Vec<_>>>()
            .map(Raw::Array),
        (Value::Map(entries), Type::Map(elem)) => entries
            .iter()
            .map(|(k, v)| Ok((Raw::from(k.as_str()), to_rmpv(v, elem)?)))
            .collect::<Result<Vec<_>>>()
            .map(Raw::Map),
        (Value::Map(entries), Type::Object(attrs)) => attrs
            .iter()
            .map(|(name, attr_ty)| {
                let v = entries.get(name).unwrap_or(&NULL);
                Ok((Raw::from(name.as_str()), to_rmpv(v, attr_ty)?))
            })
            .collect::<Result<Vec<_>>>()
            .map(Raw::Map),
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn object_type() -> Type {
        let mut attrs = BTreeMap::new();
        attrs.insert("id".to_string(), Type::String);
        attrs.insert("name".to_string(), Type::String);
        attrs.insert("replicas".to_string(), Type::Number);
        attrs.insert("labels".to_string(), Type::map(Type::String));
        attrs.insert("ports".to_string(), Type::list(Type::Number));
        Type::Object(attrs)
    }

    #[test]
    fn test_unknown_uses_extension_zero() {
        let bytes = Value::Unknown.to_msgpack(&Type::String).unwrap();
        // fixext1、型 0、ペイロード 0
        assert_eq!(bytes, vec![0xd4, 0x00, 0x00]);
        assert_eq!(Value::from_msgpack(&bytes, &Type::String).unwrap(), Value::Unknown);
    }

    #[test]
    fn test_integral_numbers_encode_as_integers() {
        let bytes = Value::Number(30.0).to_msgpack(&Type::Number).unwrap();
        assert_eq!(bytes, vec![30]);

        let bytes = Value::Number(1.5).to_msgpack(&Type::Number).unwrap();
        assert_eq!(bytes[0], 0xcb);
    }

    #[test]
    fn test_object_decode_fills_missing_attributes() {
        let raw = rmpv::Value::Map(vec![
            (rmpv::Value::from("name"), rmpv::Value::from("web")),
            (rmpv::Value::from("stale"), rmpv::Value::from(true)),
        ]);
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &raw).unwrap();

        let value = Value::from_msgpack(&bytes, &object_type()).unwrap();
        assert_eq!(value.get("name"), &Value::string("web"));
        assert!(value.get("id").is_null());
        assert!(value.get("stale").is_null());
        match &value {
            Value::Map(entries) => assert_eq!(entries.len(), 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_encode_rejects_mismatched_type() {
        let result = Value::Bool(true).to_msgpack(&Type::String);
        assert!(matches!(result, Err(PluginError::Encode(_))));
    }

    #[test]
    fn test_number_accepts_string_encoding() {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &rmpv::Value::from("42")).unwrap();
        assert_eq!(Value::from_msgpack(&bytes, &Type::Number).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_to_json_omits_null_attributes() {
        let value = Value::object([
            ("name", Value::string("web")),
            ("id", Value::Null),
            ("replicas", Value::Unknown),
            ("ports", Value::List(vec![Value::Number(80.0)])),
        ]);
        assert_eq!(value.to_json(), json!({"name": "web", "ports": [80]}));
    }

    #[derive(Debug, Deserialize, Serialize, Default)]
    #[serde(default)]
    struct Model {
        id: Option<String>,
        name: String,
        replicas: Option<i64>,
        labels: Option<BTreeMap<String, String>>,
        ports: Vec<i64>,
    }

    #[test]
    fn test_model_conversion() {
        let value = Value::object([
            ("name", Value::string("web")),
            ("replicas", Value::Number(3.0)),
            ("id", Value::Unknown),
            ("labels", Value::Null),
            ("ports", Value::Null),
        ]);
        let mut model: Model = value.to_model().unwrap();
        assert_eq!(model.name, "web");
        assert_eq!(model.replicas, Some(3));
        assert!(model.id.is_none());
        assert!(model.ports.is_empty());

        model.id = Some("abc".to_string());
        let back = Value::from_model(&model, &object_type()).unwrap();
        assert_eq!(back.get("id"), &Value::string("abc"));
        assert!(back.get("labels").is_null());
        assert_eq!(back.get("ports"), &Value::List(vec![]));
    }

    #[test]
    fn test_from_json_coerces_scalars() {
        let value = Value::from_json(&json!("8080"), &Type::Number).unwrap();
        assert_eq!(value, Value::Number(8080.0));
        let value = Value::from_json(&json!(true), &Type::String).unwrap();
        assert_eq!(value, Value::string("true"));
    }

    #[test]
    fn test_without_unknowns() {
        let value = Value::object([
            ("a", Value::Unknown),
            ("b", Value::List(vec![Value::Unknown, Value::Bool(true)])),
        ]);
        let cleaned = value.without_unknowns();
        assert!(cleaned.is_wholly_known());
        assert!(cleaned.get("a").is_null());
        assert_eq!(cleaned.get("b"), &Value::List(vec![Value::Null, Value::Bool(true)]));
    }
}
