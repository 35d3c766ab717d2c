//! In-memory target platform for testing.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::platform::{
    ImportJob, ImportRequest, Importer, ImporterTemplate, Mapping, NewSite, NewUser,
    PlatformApi, PlatformError, ResourceId, Site, User,
};

#[derive(Debug, Default)]
struct MockState {
    next_id: ResourceId,
    sites: BTreeMap<ResourceId, Site>,
    users: BTreeMap<ResourceId, User>,
    importers: BTreeMap<ResourceId, Importer>,
    mappings: BTreeMap<ResourceId, Mapping>,
    imports: Vec<ImportRequest>,
    created_importers: Vec<ImporterTemplate>,
    calls: HashMap<&'static str, usize>,
    /// Failing operations, keyed `op` or `op:key`, with the status returned.
    failures: HashMap<String, u16>,
}

impl MockState {
    fn allocate_id(&mut self) -> ResourceId {
        self.next_id += 1;
        self.next_id
    }

    /// Count the call and return the configured failure, if any.
    fn enter(&mut self, op: &'static str, key: &str) -> Result<(), PlatformError> {
        *self.calls.entry(op).or_default() += 1;
        let status = self
            .failures
            .get(&format!("{}:{}", op, key))
            .or_else(|| self.failures.get(op));
        match status {
            Some(&status) => Err(PlatformError::Http {
                status,
                body: format!("mock failure in {}", op),
            }),
            None => Ok(()),
        }
    }
}

/// Mock implementation of the PlatformApi trait.
///
/// Keeps sites, users, importers and mappings in memory, assigns ids from a
/// single counter and counts every call by operation name.
///
/// # Example
///
/// ```rust,ignore
/// let api = Arc::new(MockPlatformApi::new());
/// let platform = TargetPlatform::new(api.clone(), settings);
///
/// platform.create_or_get_site("Radio", "radio").await?;
/// platform.create_or_get_site("Radio", "radio").await?;
/// assert_eq!(api.call_count("create_site").await, 1);
///
/// // Fail every site creation for one slug
/// api.fail("create_site", Some("broken"), 500).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockPlatformApi {
    state: Arc<RwLock<MockState>>,
}

impl MockPlatformApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail with `status`, for every key or only for `key`
    /// (slug, email, label or id, depending on the operation).
    pub async fn fail(&self, op: &str, key: Option<&str>, status: u16) {
        let name = match key {
            Some(key) => format!("{}:{}", op, key),
            None => op.to_string(),
        };
        self.state.write().await.failures.insert(name, status);
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Number of calls made to `op`.
    pub async fn call_count(&self, op: &str) -> usize {
        self.state.read().await.calls.get(op).copied().unwrap_or(0)
    }

    pub async fn add_site(&self, slug: &str, title: &str) -> Site {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let site = Site {
            id,
            slug: slug.to_string(),
            title: title.to_string(),
            permissions: Vec::new(),
            extra: Map::new(),
        };
        state.sites.insert(id, site.clone());
        site
    }

    pub async fn add_user(&self, name: &str, email: &str, role: &str) -> User {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            is_active: true,
            extra: Map::new(),
        };
        state.users.insert(id, user.clone());
        user
    }

    pub async fn add_mapping(&self, label: &str) -> Mapping {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let mapping = Mapping {
            id,
            label: label.to_string(),
            extra: Map::new(),
        };
        state.mappings.insert(id, mapping.clone());
        mapping
    }

    /// Edit a stored importer's config in place, as a user would in the UI.
    /// Returns `false` if there is no such importer.
    pub async fn edit_importer_config(
        &self,
        id: ResourceId,
        edit: impl FnOnce(&mut Map<String, Value>),
    ) -> bool {
        let mut state = self.state.write().await;
        match state.importers.get_mut(&id) {
            Some(importer) => {
                edit(&mut importer.config);
                true
            }
            None => false,
        }
    }

    pub async fn sites(&self) -> Vec<Site> {
        self.state.read().await.sites.values().cloned().collect()
    }

    pub async fn users(&self) -> Vec<User> {
        self.state.read().await.users.values().cloned().collect()
    }

    pub async fn site(&self, id: ResourceId) -> Option<Site> {
        self.state.read().await.sites.get(&id).cloned()
    }

    pub async fn user(&self, id: ResourceId) -> Option<User> {
        self.state.read().await.users.get(&id).cloned()
    }

    /// Import requests received, in order.
    pub async fn imports(&self) -> Vec<ImportRequest> {
        self.state.read().await.imports.clone()
    }

    /// Importer templates as they were posted.
    pub async fn created_importers(&self) -> Vec<ImporterTemplate> {
        self.state.read().await.created_importers.clone()
    }

    fn not_found(kind: &str, id: ResourceId) -> PlatformError {
        PlatformError::Http {
            status: 404,
            body: format!("{} {} not found", kind, id),
        }
    }
}

#[async_trait]
impl PlatformApi for MockPlatformApi {
    async fn find_sites_by_slug(&self, slug: &str) -> Result<Vec<Site>, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("find_sites_by_slug", slug)?;
        Ok(state.sites.values().filter(|s| s.slug == slug).cloned().collect())
    }

    async fn create_site(&self, site: &NewSite) -> Result<Site, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("create_site", &site.slug)?;
        let id = state.allocate_id();
        let mut extra = Map::new();
        extra.insert("o:theme".to_string(), json!(site.theme));
        extra.insert("o:is_public".to_string(), json!(site.is_public));
        extra.insert("o:assign_new_items".to_string(), json!(site.assign_new_items));
        extra.insert("o:owner".to_string(), json!({"o:id": site.owner.id}));
        let created = Site {
            id,
            slug: site.slug.clone(),
            title: site.title.clone(),
            permissions: Vec::new(),
            extra,
        };
        state.sites.insert(id, created.clone());
        Ok(created)
    }

    async fn get_site(&self, id: ResourceId) -> Result<Site, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("get_site", &id.to_string())?;
        state
            .sites
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found("site", id))
    }

    async fn update_site(&self, site: &Site) -> Result<Site, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("update_site", &site.id.to_string())?;
        if !state.sites.contains_key(&site.id) {
            return Err(Self::not_found("site", site.id));
        }
        state.sites.insert(site.id, site.clone());
        Ok(site.clone())
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("find_users_by_email", email)?;
        Ok(state.users.values().filter(|u| u.email == email).cloned().collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("list_users", "")?;
        Ok(state.users.values().cloned().collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("create_user", &user.email)?;
        let id = state.allocate_id();
        // Module settings are stored as sent, like the server does.
        let extra = match serde_json::to_value(user) {
            Ok(Value::Object(fields)) => fields
                .into_iter()
                .filter(|(key, _)| !key.starts_with("o:"))
                .collect(),
            _ => Map::new(),
        };
        let created = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            is_active: user.is_active,
            extra,
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: ResourceId) -> Result<User, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("get_user", &id.to_string())?;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found("user", id))
    }

    async fn update_user(&self, user: &User) -> Result<User, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("update_user", &user.id.to_string())?;
        if !state.users.contains_key(&user.id) {
            return Err(Self::not_found("user", user.id));
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_importers_by_label(&self, label: &str) -> Result<Vec<Importer>, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("find_importers_by_label", label)?;
        Ok(state
            .importers
            .values()
            .filter(|i| i.label == label)
            .cloned()
            .collect())
    }

    async fn get_importer(&self, id: ResourceId) -> Result<Importer, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("get_importer", &id.to_string())?;
        state
            .importers
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found("importer", id))
    }

    async fn create_importer(
        &self,
        template: &ImporterTemplate,
    ) -> Result<Importer, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("create_importer", &template.label)?;
        let id = state.allocate_id();
        let mut extra = template.extra.clone();
        if let Some(mapper) = &template.mapper {
            extra.insert("o-bulk:mapper".to_string(), Value::from(mapper.clone()));
        }
        let importer = Importer {
            id,
            label: template.label.clone(),
            config: template.config.clone(),
            extra,
        };
        state.importers.insert(id, importer.clone());
        state.created_importers.push(template.clone());
        Ok(importer)
    }

    async fn find_mappings_by_label(&self, label: &str) -> Result<Vec<Mapping>, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("find_mappings_by_label", label)?;
        Ok(state
            .mappings
            .values()
            .filter(|m| m.label == label)
            .cloned()
            .collect())
    }

    async fn create_import(&self, request: &ImportRequest) -> Result<ImportJob, PlatformError> {
        let mut state = self.state.write().await;
        state.enter("create_import", &request.importer.to_string())?;
        let id = state.allocate_id();
        state.imports.push(request.clone());
        Ok(ImportJob {
            id,
            embedded_importer: None,
            importer: Some(json!({"o:id": request.importer})),
            comment: Some(request.comment.clone()),
            status: Some(request.status.clone()),
            extra: Map::new(),
        })
    }
}
