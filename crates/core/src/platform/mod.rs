//! Target platform (Omeka S) integration.
//!
//! `PlatformApi` is the raw REST seam: one method per resource call, no
//! policy. `TargetPlatform` builds the idempotent provisioning operations and
//! import-job templating on top of it.

mod adapter;
mod omeka;
pub mod templating;
mod types;

pub use adapter::{
    EditorRestrictionReport, EditorUpdate, EditorUpdateStatus, NewImportJob, PlatformSettings,
    TargetPlatform, ISOLATED_SITE_SETTINGS,
};
pub use omeka::OmekaApi;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the target platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Local I/O failed (e.g. reading an export artifact).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw resource operations of the target platform REST API.
///
/// Every non-2xx answer is an error; implementations never retry.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Sites matching a slug filter.
    async fn find_sites_by_slug(&self, slug: &str) -> Result<Vec<Site>, PlatformError>;

    async fn create_site(&self, site: &NewSite) -> Result<Site, PlatformError>;

    async fn get_site(&self, id: ResourceId) -> Result<Site, PlatformError>;

    /// Replace a site with the given full representation.
    async fn update_site(&self, site: &Site) -> Result<Site, PlatformError>;

    /// Users matching an email filter.
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, PlatformError>;

    async fn list_users(&self) -> Result<Vec<User>, PlatformError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, PlatformError>;

    async fn get_user(&self, id: ResourceId) -> Result<User, PlatformError>;

    /// Replace a user with the given full representation.
    async fn update_user(&self, user: &User) -> Result<User, PlatformError>;

    /// Bulk importers matching a label filter.
    async fn find_importers_by_label(&self, label: &str) -> Result<Vec<Importer>, PlatformError>;

    async fn get_importer(&self, id: ResourceId) -> Result<Importer, PlatformError>;

    async fn create_importer(&self, template: &ImporterTemplate)
        -> Result<Importer, PlatformError>;

    /// Bulk mappings matching a label filter.
    async fn find_mappings_by_label(&self, label: &str) -> Result<Vec<Mapping>, PlatformError>;

    async fn create_import(&self, request: &ImportRequest) -> Result<ImportJob, PlatformError>;
}
