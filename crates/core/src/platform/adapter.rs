//! Idempotent provisioning operations over the raw platform API.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;

use super::templating::{build_import_request, ImportOverrides};
use super::types::{
    ImportJob, Importer, ImporterTemplate, MapperRef, NewSite, NewUser, ResourceId, ResourceRef,
    Site, SitePermission, User,
};
use super::{PlatformApi, PlatformError};

/// User settings written by the isolated-sites module to confine editors.
pub const ISOLATED_SITE_SETTINGS: [&str; 2] = [
    "o-module-isolatedsites:limit_to_granted_sites",
    "o-module-isolatedsites:limit_to_own_assets",
];

/// Fixed values applied to provisioned resources.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformSettings {
    pub site_owner_id: ResourceId,
    pub site_theme: String,
    pub editor_role: String,
    pub preload_path: String,
    pub site_param_key: String,
    pub min_date_param_key: String,
}

impl From<&TargetConfig> for PlatformSettings {
    fn from(config: &TargetConfig) -> Self {
        Self {
            site_owner_id: config.site_owner_id,
            site_theme: config.site_theme.clone(),
            editor_role: config.editor_role.clone(),
            preload_path: config.preload_path.clone(),
            site_param_key: config.site_param_key.clone(),
            min_date_param_key: config.min_date_param_key.clone(),
        }
    }
}

/// Inputs of one import job.
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub importer_id: ResourceId,
    /// Local export artifact; its basename is what the server sees in the
    /// preload directory.
    pub artifact_path: PathBuf,
    pub channel_name: String,
    pub owner_id: Option<ResourceId>,
    pub site_id: Option<ResourceId>,
    pub min_post_date: Option<NaiveDate>,
}

/// Outcome of one editor account in a restriction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorUpdateStatus {
    WouldUpdate,
    Updated,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorUpdate {
    pub id: ResourceId,
    pub name: String,
    pub email: String,
    pub status: EditorUpdateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of an editor restriction batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorRestrictionReport {
    pub updated: usize,
    pub errors: usize,
    pub users: Vec<EditorUpdate>,
}

/// Target platform operations used by the migration.
///
/// Lookups go through the API's filters and are then matched exactly, so
/// repeated calls with the same key return the same resource.
pub struct TargetPlatform {
    api: Arc<dyn PlatformApi>,
    settings: PlatformSettings,
}

impl TargetPlatform {
    pub fn new(api: Arc<dyn PlatformApi>, settings: PlatformSettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    /// Return the site with `slug`, creating it if absent.
    pub async fn create_or_get_site(&self, name: &str, slug: &str) -> Result<Site, PlatformError> {
        if let Some(site) = self.api.find_sites_by_slug(slug).await?.into_iter().next() {
            info!("Site '{}' already exists with ID {}", slug, site.id);
            return Ok(site);
        }

        let new_site = NewSite {
            title: name.to_string(),
            slug: slug.to_string(),
            theme: self.settings.site_theme.clone(),
            is_public: true,
            assign_new_items: false,
            owner: ResourceRef::new(self.settings.site_owner_id),
        };
        let site = self.api.create_site(&new_site).await?;
        info!("Created site '{}' with ID {}", slug, site.id);
        Ok(site)
    }

    /// Return the user `username@domain`, creating it if absent.
    pub async fn create_or_get_user(
        &self,
        username: &str,
        domain: &str,
    ) -> Result<User, PlatformError> {
        let email = format!("{}@{}", username, domain);

        if let Some(user) = self.api.find_users_by_email(&email).await?.into_iter().next() {
            info!("User '{}' already exists with ID {}", email, user.id);
            return Ok(user);
        }

        let new_user = NewUser {
            name: username.to_string(),
            email: email.clone(),
            role: self.settings.editor_role.clone(),
            is_active: true,
            limit_to_granted_sites: true,
            limit_to_own_assets: true,
        };
        let user = self.api.create_user(&new_user).await?;
        info!("Created user '{}' with ID {}", email, user.id);
        Ok(user)
    }

    /// Give `user_id` a role on `site_id`.
    ///
    /// An existing entry for the user is left as is, whatever its role.
    /// The site is read, extended and written back whole with no version
    /// check: concurrent writers to the same site can lose entries.
    pub async fn grant_site_permission(
        &self,
        site_id: ResourceId,
        user_id: ResourceId,
        role: &str,
    ) -> Result<Site, PlatformError> {
        let mut site = self.api.get_site(site_id).await?;

        if let Some(existing) = site.permission_for(user_id) {
            debug!(
                "User {} already has role '{}' on site {}",
                user_id, existing.role, site_id
            );
            return Ok(site);
        }

        site.permissions.push(SitePermission {
            user: ResourceRef::new(user_id),
            role: role.to_string(),
            extra: Default::default(),
        });
        let site = self.api.update_site(&site).await?;
        info!("Granted role '{}' on site {} to user {}", role, site_id, user_id);
        Ok(site)
    }

    /// Return the importer labelled like `template`, creating it if absent.
    ///
    /// A symbolic mapper is resolved to the remote mapping with that label.
    /// When it cannot be resolved the template is posted with the symbolic
    /// value unchanged.
    pub async fn ensure_importer(
        &self,
        template: &ImporterTemplate,
    ) -> Result<Importer, PlatformError> {
        if let Some(importer) = self
            .api
            .find_importers_by_label(&template.label)
            .await?
            .into_iter()
            .next()
        {
            info!(
                "Importer '{}' already exists with ID {}",
                template.label, importer.id
            );
            return Ok(importer);
        }

        let mut template = template.clone();
        if let Some(label) = template.mapper.as_ref().and_then(MapperRef::symbolic_label) {
            if let Some(resolved) = self.resolve_mapper(label).await {
                template.mapper = Some(resolved);
            }
        }

        let importer = self.api.create_importer(&template).await?;
        info!("Created importer '{}' with ID {}", importer.label, importer.id);
        Ok(importer)
    }

    async fn resolve_mapper(&self, label: &str) -> Option<MapperRef> {
        match self.api.find_mappings_by_label(label).await {
            Ok(mappings) => match mappings.into_iter().next() {
                Some(mapping) => {
                    debug!("Resolved mapper '{}' to mapping {}", label, mapping.id);
                    Some(MapperRef::Resolved {
                        id: mapping.id,
                        label: mapping.label,
                    })
                }
                None => {
                    warn!("Mapping '{}' not found, keeping symbolic reference", label);
                    None
                }
            },
            Err(e) => {
                warn!(
                    "Failed to look up mapping '{}': {}, keeping symbolic reference",
                    label, e
                );
                None
            }
        }
    }

    /// Create one import job for an export artifact.
    ///
    /// The importer is fetched again so the job reflects its current
    /// configuration.
    pub async fn create_import_job(&self, new_job: &NewImportJob) -> Result<ImportJob, PlatformError> {
        let importer = self.api.get_importer(new_job.importer_id).await?;
        let file_size = tokio::fs::metadata(&new_job.artifact_path).await?.len();
        let file_name = new_job
            .artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let overrides = ImportOverrides {
            file_name,
            file_size,
            channel_name: new_job.channel_name.clone(),
            owner_id: new_job.owner_id,
            site_id: new_job.site_id,
            min_post_date: new_job.min_post_date,
        };
        let request = build_import_request(&importer, &overrides, &self.settings);

        let job = self.api.create_import(&request).await?;
        info!(
            "Created import job {} with importer '{}' for '{}'",
            job.id, importer.label, new_job.channel_name
        );
        Ok(job)
    }

    /// Confine every editor account to its granted sites and own assets.
    ///
    /// Per-user failures are recorded in the report and do not stop the
    /// batch. With `dry_run` nothing is written.
    pub async fn restrict_editor_users(
        &self,
        dry_run: bool,
    ) -> Result<EditorRestrictionReport, PlatformError> {
        let editors: Vec<User> = self
            .api
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.role == self.settings.editor_role)
            .collect();
        info!(
            "Found {} users with role '{}'",
            editors.len(),
            self.settings.editor_role
        );

        let mut report = EditorRestrictionReport::default();
        for editor in editors {
            let mut entry = EditorUpdate {
                id: editor.id,
                name: editor.name.clone(),
                email: editor.email.clone(),
                status: EditorUpdateStatus::WouldUpdate,
                error: None,
            };

            if !dry_run {
                match self.restrict_user(editor.id).await {
                    Ok(()) => {
                        entry.status = EditorUpdateStatus::Updated;
                        report.updated += 1;
                    }
                    Err(e) => {
                        warn!("Failed to restrict user {} ({}): {}", editor.id, editor.email, e);
                        entry.status = EditorUpdateStatus::Error;
                        entry.error = Some(e.to_string());
                        report.errors += 1;
                    }
                }
            }
            report.users.push(entry);
        }

        Ok(report)
    }

    async fn restrict_user(&self, user_id: ResourceId) -> Result<(), PlatformError> {
        let mut user = self.api.get_user(user_id).await?;
        for key in ISOLATED_SITE_SETTINGS {
            user.extra.insert(key.to_string(), Value::Bool(true));
        }
        self.api.update_user(&user).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockPlatformApi};
    use serde_json::json;
    use tempfile::TempDir;

    fn platform() -> (Arc<MockPlatformApi>, TargetPlatform) {
        let api = Arc::new(MockPlatformApi::new());
        let platform = TargetPlatform::new(api.clone(), fixtures::platform_settings());
        (api, platform)
    }

    #[tokio::test]
    async fn test_create_or_get_site_is_idempotent() {
        let (api, platform) = platform();

        let first = platform.create_or_get_site("Radio", "radio").await.unwrap();
        let second = platform.create_or_get_site("Radio", "radio").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(api.call_count("create_site").await, 1);
        assert_eq!(first.extra["o:theme"], json!("freedom"));
        assert_eq!(first.extra["o:owner"], json!({"o:id": 1}));
        assert_eq!(first.extra["o:assign_new_items"], json!(false));
    }

    #[tokio::test]
    async fn test_create_or_get_user_derives_email() {
        let (api, platform) = platform();

        let user = platform.create_or_get_user("jdoe", "example.org").await.unwrap();
        assert_eq!(user.email, "jdoe@example.org");
        assert_eq!(user.name, "jdoe");
        assert_eq!(user.role, "editor");
        assert!(user.is_active);
        for setting in ISOLATED_SITE_SETTINGS {
            assert_eq!(user.extra.get(setting), Some(&json!(true)), "{setting}");
        }

        let again = platform.create_or_get_user("jdoe", "example.org").await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(api.call_count("create_user").await, 1);
    }

    #[tokio::test]
    async fn test_grant_permission_once() {
        let (api, platform) = platform();
        let site = platform.create_or_get_site("Radio", "radio").await.unwrap();
        let user = platform.create_or_get_user("jdoe", "example.org").await.unwrap();

        let updated = platform
            .grant_site_permission(site.id, user.id, "viewer")
            .await
            .unwrap();
        assert_eq!(updated.permissions.len(), 1);
        assert_eq!(updated.permissions[0].role, "viewer");

        // Role differs, entry exists: nothing is written.
        let unchanged = platform
            .grant_site_permission(site.id, user.id, "editor")
            .await
            .unwrap();
        assert_eq!(unchanged.permissions.len(), 1);
        assert_eq!(unchanged.permissions[0].role, "viewer");
        assert_eq!(api.call_count("update_site").await, 1);
    }

    #[tokio::test]
    async fn test_grant_permission_on_missing_site_fails() {
        let (_api, platform) = platform();
        let err = platform.grant_site_permission(99, 1, "viewer").await.unwrap_err();
        assert!(matches!(err, PlatformError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_ensure_importer_resolves_mapper() {
        let (api, platform) = platform();
        let mapping = api.add_mapping("WP media").await;
        let template = fixtures::importer_template("Media", "WP media");

        let importer = platform.ensure_importer(&template).await.unwrap();
        let again = platform.ensure_importer(&template).await.unwrap();
        assert_eq!(importer.id, again.id);
        assert_eq!(api.call_count("create_importer").await, 1);

        let posted = api.created_importers().await;
        assert_eq!(
            posted[0].mapper,
            Some(MapperRef::Resolved {
                id: mapping.id,
                label: "WP media".to_string()
            })
        );
        assert_eq!(
            importer.extra["o-bulk:mapper"],
            json!({"@type": "o-bulk:Mapping", "o:id": mapping.id, "o:label": "WP media"})
        );
    }

    #[tokio::test]
    async fn test_ensure_importer_keeps_unresolved_mapper() {
        let (api, platform) = platform();
        api.fail("find_mappings_by_label", Some("Broken"), 500).await;

        platform
            .ensure_importer(&fixtures::importer_template("Media", "Missing"))
            .await
            .unwrap();
        platform
            .ensure_importer(&fixtures::importer_template("Posts", "Broken"))
            .await
            .unwrap();

        let posted = api.created_importers().await;
        assert_eq!(posted[0].mapper, Some(MapperRef::Symbolic("Missing".to_string())));
        assert_eq!(posted[1].mapper, Some(MapperRef::Symbolic("Broken".to_string())));
    }

    #[tokio::test]
    async fn test_create_import_job() {
        let (api, platform) = platform();
        let importer = platform
            .ensure_importer(&fixtures::importer_template("Media", "WP media"))
            .await
            .unwrap();
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("radio.xml");
        std::fs::write(&artifact, "0123456789").unwrap();

        let job = platform
            .create_import_job(&NewImportJob {
                importer_id: importer.id,
                artifact_path: artifact,
                channel_name: "Radio".to_string(),
                owner_id: Some(12),
                site_id: Some(42),
                min_post_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            })
            .await
            .unwrap();
        assert_eq!(job.comment.as_deref(), Some("Site: Radio, Importer: Media"));

        let imports = api.imports().await;
        assert_eq!(imports.len(), 1);
        let reader = &imports[0].params.reader;
        assert_eq!(
            reader["filename"],
            json!("/var/www/html/omeka-s/files/preload/radio.xml")
        );
        assert_eq!(reader["file"]["size"], json!(10));
        assert_eq!(
            reader["xsl_params"],
            json!({"SiteId": "42", "Lang": "fr", "MinPostDate": "2024-03-15"})
        );
        assert_eq!(imports[0].params.processor["o:owner"], json!(12));
        assert_eq!(imports[0].importer, importer.id);
    }

    #[tokio::test]
    async fn test_create_import_job_missing_artifact_is_io_error() {
        let (_api, platform) = platform();
        let importer = platform
            .ensure_importer(&fixtures::importer_template("Media", "WP media"))
            .await
            .unwrap();

        let err = platform
            .create_import_job(&NewImportJob {
                importer_id: importer.id,
                artifact_path: PathBuf::from("/nonexistent/radio.xml"),
                channel_name: "Radio".to_string(),
                owner_id: None,
                site_id: None,
                min_post_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Io(_)));
    }

    #[tokio::test]
    async fn test_restrict_editor_users() {
        let (api, platform) = platform();
        let alice = api.add_user("alice", "alice@example.org", "editor").await;
        let bob = api.add_user("bob", "bob@example.org", "editor").await;
        api.add_user("admin", "admin@example.org", "global_admin").await;
        api.fail("update_user", Some(&bob.id.to_string()), 500).await;

        let dry = platform.restrict_editor_users(true).await.unwrap();
        assert_eq!(dry.updated, 0);
        assert_eq!(dry.users.len(), 2);
        assert!(dry
            .users
            .iter()
            .all(|u| u.status == EditorUpdateStatus::WouldUpdate));
        assert_eq!(api.call_count("update_user").await, 0);

        let report = platform.restrict_editor_users(false).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.errors, 1);
        let bob_entry = report.users.iter().find(|u| u.id == bob.id).unwrap();
        assert_eq!(bob_entry.status, EditorUpdateStatus::Error);
        assert!(bob_entry.error.is_some());

        let alice = api.user(alice.id).await.unwrap();
        for key in ISOLATED_SITE_SETTINGS {
            assert_eq!(alice.extra[key], json!(true));
        }

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["users"][0]["status"], json!("updated"));
        assert!(json["users"][0].get("error").is_none());
    }
}
