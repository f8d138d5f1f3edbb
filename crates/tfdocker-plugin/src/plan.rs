//! `PlanResourceChange` のプラン計算
//!
//! Terraform は設定と前回の state をマージして新しい state を提案する。
//! プロバイダーは静的デフォルト値を埋め、apply 時に決まる computed 属性を
//! unknown にし、変更が置き換えを伴う属性を報告する。

use crate::schema::{Block, Nesting, Schema};
use crate::value::Value;

/// 1 リソースの変更をプランした結果
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub planned: Value,
    /// 置き換えを伴うトップレベルの属性名・ブロック名
    pub requires_replace: Vec<String>,
}

pub fn plan_resource_change(
    schema: &Schema,
    prior: &Value,
    proposed: &Value,
    config: &Value,
) -> PlannedChange {
    // 削除
    if proposed.is_null() {
        return PlannedChange {
            planned: Value::Null,
            requires_replace: Vec::new(),
        };
    }

    let mut planned = apply_defaults(&schema.block, proposed.clone(), config);

    if prior.is_null() {
        mark_unknown(&schema.block, &mut planned, config, None);
        return PlannedChange {
            planned,
            requires_replace: Vec::new(),
        };
    }

    if planned == *prior {
        return PlannedChange {
            planned,
            requires_replace: Vec::new(),
        };
    }

    mark_unknown(&schema.block, &mut planned, config, Some(prior));
    let requires_replace = replace_paths(&schema.block, prior, &planned);

    PlannedChange {
        planned,
        requires_replace,
    }
}

/// 設定が null の箇所に静的デフォルト値を埋める。ネストしたブロックも辿る
fn apply_defaults(block: &Block, mut value: Value, config: &Value) -> Value {
    if !matches!(value, Value::Map(_)) {
        return value;
    }

    for attribute in &block.attributes {
        if let Some(default) = &attribute.default
            && config.get(&attribute.name).is_null()
        {
            value.set(&attribute.name, default.clone());
        }
    }

    for nested in &block.blocks {
        let current = value.get(&nested.type_name).clone();
        let nested_config = config.get(&nested.type_name);
        let updated = match (nested.nesting, current) {
            (_, Value::Null) => Value::Null,
            (Nesting::Single, v) => apply_defaults(&nested.block, v, nested_config),
            (_, Value::List(items)) => {
                let configs = nested_config.as_list();
                Value::List(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| {
                            let item_config = configs.get(i).unwrap_or(&Value::Null);
                            apply_defaults(&nested.block, item, item_config)
                        })
                        .collect(),
                )
            }
            (_, other) => other,
        };
        value.set(&nested.type_name, updated);
    }

    value
}

fn mark_unknown(block: &Block, planned: &mut Value, config: &Value, prior: Option<&Value>) {
    for attribute in &block.attributes {
        if !attribute.computed
            || attribute.default.is_some()
            || !config.get(&attribute.name).is_null()
        {
            continue;
        }

        let value = match prior {
            Some(prior) if attribute.use_state_for_unknown => prior.get(&attribute.name).clone(),
            _ => Value::Unknown,
        };
        planned.set(&attribute.name, value);
    }
}

fn replace_paths(block: &Block, prior: &Value, planned: &Value) -> Vec<String> {
    let attributes = block
        .attributes
        .iter()
        .filter(|a| a.requires_replace)
        .map(|a| &a.name);
    let blocks = block
        .blocks
        .iter()
        .filter(|b| b.requires_replace)
        .map(|b| &b.type_name);

    attributes
        .chain(blocks)
        .filter(|name| prior.get(name) != planned.get(name))
        .cloned()
        .collect()
}
