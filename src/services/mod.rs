pub mod achievement_icons;
pub mod api_client;
pub mod catalog_sync;
pub mod emulator_provisioner;
pub mod goldberg_service;
pub mod interfaces;
pub mod lookup_cache;
pub mod lookup_service;
pub mod settings_store;
pub mod status;
pub mod steam_metadata;

pub use achievement_icons::AchievementIcons;
pub use api_client::ApiClient;
pub use catalog_sync::{CatalogSync, SteamCatalogSource, SyncReport, TypeSyncOutcome};
pub use emulator_provisioner::{
    EmulatorProvisioner, GithubReleaseSource, ProvisioningOutcome, ProvisioningState,
};
pub use goldberg_service::GoldbergService;
pub use lookup_service::{DetectionResult, LookupService};
pub use settings_store::AppConfigStore;
pub use status::{StatusEvent, StatusLevel, StatusReporter};
pub use steam_metadata::{GameSchema, SteamMetadata};
