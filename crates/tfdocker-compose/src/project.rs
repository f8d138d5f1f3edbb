//! プロジェクト単位の命名とラベル
//!
//! Compose CLI の状態ファイルは使わず、ラベルでプロジェクトを識別する。

use std::collections::HashMap;

pub const LABEL_PROJECT: &str = "com.docker.compose.project";
pub const LABEL_SERVICE: &str = "com.docker.compose.service";
pub const LABEL_NETWORK: &str = "com.docker.compose.network";
pub const LABEL_VOLUME: &str = "com.docker.compose.volume";

/// 既定ネットワークの論理名
pub const DEFAULT_NETWORK: &str = "default";

/// Compose プロジェクトの名前空間
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNaming {
    name: String,
}

impl ProjectNaming {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// コンテナ名 `{project}-{service}-1`
    pub fn container_name(&self, service: &str) -> String {
        format!("{}-{}-1", self.name, service)
    }

    /// ネットワーク・ボリューム名 `{project}_{name}`
    pub fn scoped_name(&self, name: &str) -> String {
        format!("{}_{}", self.name, name)
    }

    /// 既定ネットワーク `{project}_default`
    pub fn default_network(&self) -> String {
        self.scoped_name(DEFAULT_NETWORK)
    }

    /// サービスのコンテナに付けるラベル
    pub fn service_labels(&self, service: &str) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_PROJECT.to_string(), self.name.clone()),
            (LABEL_SERVICE.to_string(), service.to_string()),
        ])
    }

    /// ネットワークに付けるラベル
    pub fn network_labels(&self, network: &str) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_PROJECT.to_string(), self.name.clone()),
            (LABEL_NETWORK.to_string(), network.to_string()),
        ])
    }

    /// ボリュームに付けるラベル
    pub fn volume_labels(&self, volume: &str) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_PROJECT.to_string(), self.name.clone()),
            (LABEL_VOLUME.to_string(), volume.to_string()),
        ])
    }

    /// Engine API の一覧取得に使う filters
    pub fn label_filter(&self) -> HashMap<String, Vec<String>> {
        HashMap::from([(
            "label".to_string(),
            vec![format!("{}={}", LABEL_PROJECT, self.name)],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let project = ProjectNaming::new("shop");
        assert_eq!(project.container_name("web"), "shop-web-1");
        assert_eq!(project.scoped_name("cache"), "shop_cache");
        assert_eq!(project.default_network(), "shop_default");
    }

    #[test]
    fn test_labels() {
        let project = ProjectNaming::new("shop");
        let labels = project.service_labels("web");
        assert_eq!(labels[LABEL_PROJECT], "shop");
        assert_eq!(labels[LABEL_SERVICE], "web");
        assert_eq!(labels.len(), 2);

        assert_eq!(project.network_labels("default")[LABEL_NETWORK], "default");
        assert_eq!(project.volume_labels("data")[LABEL_VOLUME], "data");
    }

    #[test]
    fn test_label_filter() {
        let filter = ProjectNaming::new("shop").label_filter();
        assert_eq!(
            filter["label"],
            vec!["com.docker.compose.project=shop".to_string()]
        );
    }
}
