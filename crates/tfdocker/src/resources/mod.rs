//! `docker_*` リソース

mod access_token;
mod compose;
mod config;
mod container;
mod hub_repository;
mod hub_repository_team_permission;
mod image;
mod network;
mod org_member;
mod org_team;
mod org_team_member;
mod registry_image;
mod secret;
mod service;
mod tag;
mod volume;

pub use access_token::AccessTokenResource;
pub use compose::ComposeResource;
pub use config::ConfigResource;
pub use container::ContainerResource;
pub use hub_repository::HubRepositoryResource;
pub use hub_repository_team_permission::HubRepositoryTeamPermissionResource;
pub use image::ImageResource;
pub use network::NetworkResource;
pub use org_member::OrgMemberResource;
pub use org_team::OrgTeamResource;
pub use org_team_member::OrgTeamMemberResource;
pub use registry_image::RegistryImageResource;
pub use secret::SecretResource;
pub use service::ServiceResource;
pub use tag::TagResource;
pub use volume::VolumeResource;

use crate::ProviderData;
use std::sync::Arc;
use tfdocker_plugin::Resource;

/// プロバイダーが提供する全リソース
pub fn all() -> Vec<Arc<dyn Resource<ProviderData>>> {
    vec![
        // Docker Engine
        Arc::new(ImageResource),
        Arc::new(NetworkResource),
        Arc::new(VolumeResource),
        Arc::new(ContainerResource),
        Arc::new(ComposeResource),
        Arc::new(TagResource),
        Arc::new(RegistryImageResource),
        // Docker Swarm
        Arc::new(SecretResource),
        Arc::new(ConfigResource),
        Arc::new(ServiceResource),
        // Docker Hub
        Arc::new(HubRepositoryResource),
        Arc::new(HubRepositoryTeamPermissionResource),
        Arc::new(OrgTeamResource),
        Arc::new(OrgMemberResource),
        Arc::new(OrgTeamMemberResource),
        Arc::new(AccessTokenResource),
    ]
}
