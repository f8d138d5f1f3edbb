//! 各レスポンスとともに Terraform へ返す診断

use crate::generated::tfplugin6 as proto;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// 1 件のエラーまたは警告。トップレベル属性を指すこともある
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn to_proto(&self) -> proto::Diagnostic {
        use proto::attribute_path::Step;
        use proto::attribute_path::step::Selector;

        let severity = match self.severity {
            Severity::Error => proto::diagnostic::Severity::Error,
            Severity::Warning => proto::diagnostic::Severity::Warning,
        };

        proto::Diagnostic {
            severity: severity as i32,
            summary: self.summary.clone(),
            detail: self.detail.clone(),
            attribute: self.attribute.as_ref().map(|name| proto::AttributePath {
                steps: vec![Step {
                    selector: Some(Selector::AttributeName(name.clone())),
                }],
            }),
        }
    }
}

/// 1 回の RPC で集めた診断
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Severity::Error, summary.into(), detail.into(), None);
    }

    pub fn warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Severity::Warning, summary.into(), detail.into(), None);
    }

    pub fn attribute_error(
        &mut self,
        attribute: &str,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(
            Severity::Error,
            summary.into(),
            detail.into(),
            Some(attribute.to_string()),
        );
    }

    /// 失敗した結果のエラーを `summary` で記録する
    pub fn ok<T, E: Display>(&mut self, result: Result<T, E>, summary: &str) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.error(summary, e.to_string());
                None
            }
        }
    }

    pub fn has_error(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn to_proto(&self) -> Vec<proto::Diagnostic> {
        self.items.iter().map(Diagnostic::to_proto).collect()
    }

    fn push(&mut self, severity: Severity, summary: String, detail: String, attribute: Option<String>) {
        self.items.push(Diagnostic {
            severity,
            summary,
            detail,
            attribute,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_not_errors() {
        let mut diags = Diagnostics::new();
        diags.warning("Docker Hub Authentication Failed", "bad token");
        assert!(!diags.has_error());
        assert!(!diags.is_empty());

        diags.error("Unable to Create Docker Client", "connection refused");
        assert!(diags.has_error());
    }

    #[test]
    fn test_ok_records_error() {
        let mut diags = Diagnostics::new();
        let result: Result<u8, String> = Err("boom".to_string());
        assert_eq!(diags.ok(result, "Read Error"), None);
        let first = diags.iter().next().unwrap();
        assert_eq!(first.summary, "Read Error");
        assert_eq!(first.detail, "boom");
    }

    #[test]
    fn test_attribute_path_in_proto() {
        let mut diags = Diagnostics::new();
        diags.attribute_error("tls_verify", "Missing TLS Configuration", "detail");

        let proto = diags.to_proto();
        assert_eq!(proto.len(), 1);
        assert_eq!(proto[0].severity, proto::diagnostic::Severity::Error as i32);

        let steps = &proto[0].attribute.as_ref().unwrap().steps;
        assert_eq!(
            steps[0].selector,
            Some(proto::attribute_path::step::Selector::AttributeName(
                "tls_verify".to_string()
            ))
        );
    }
}
