//! `docker_*` データソース

mod access_tokens;
mod compose;
mod container;
mod hub_repository;
mod image;
mod logs;
mod network;
mod org;
mod plugin;
mod registry_image;

pub use access_tokens::AccessTokensDataSource;
pub use compose::ComposeDataSource;
pub use container::ContainerDataSource;
pub use hub_repository::{
    HubRepositoriesDataSource, HubRepositoryDataSource, HubRepositoryTagsDataSource,
};
pub use image::ImageDataSource;
pub use logs::LogsDataSource;
pub use network::{NetworkDataSource, NetworksDataSource};
pub use org::{OrgDataSource, OrgMembersDataSource, OrgTeamDataSource};
pub use plugin::PluginDataSource;
pub use registry_image::RegistryImageDataSource;

use crate::ProviderData;
use std::sync::Arc;
use tfdocker_plugin::{DataSource, Type};

/// 計算属性に入れるオブジェクトのリスト要素の型
pub(crate) fn object_type(fields: Vec<(&str, Type)>) -> Type {
    Type::Object(
        fields
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .collect(),
    )
}

/// プロバイダーが提供する全データソース
pub fn all() -> Vec<Arc<dyn DataSource<ProviderData>>> {
    vec![
        // Docker Engine
        Arc::new(ImageDataSource),
        Arc::new(NetworkDataSource),
        Arc::new(NetworksDataSource),
        Arc::new(ContainerDataSource),
        Arc::new(ComposeDataSource),
        Arc::new(LogsDataSource),
        Arc::new(PluginDataSource),
        Arc::new(RegistryImageDataSource),
        // Docker Hub
        Arc::new(HubRepositoryDataSource),
        Arc::new(HubRepositoriesDataSource),
        Arc::new(HubRepositoryTagsDataSource),
        Arc::new(OrgDataSource),
        Arc::new(OrgMembersDataSource),
        Arc::new(OrgTeamDataSource),
        Arc::new(AccessTokensDataSource),
    ]
}
