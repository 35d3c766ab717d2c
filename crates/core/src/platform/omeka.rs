//! Omeka S REST API client.
//!
//! Authenticates with the `key_identity`/`key_credential` query pair on every
//! request. Filtered lookups are re-checked client-side because the API
//! treats unknown filters as no filter at all.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::TargetConfig;

use super::types::{
    ImportJob, ImportRequest, Importer, ImporterTemplate, Mapping, NewSite, NewUser, ResourceId,
    Site, User,
};
use super::{PlatformApi, PlatformError};

/// Page size used when walking a full collection.
const PAGE_SIZE: usize = 100;

/// Omeka S API client.
pub struct OmekaApi {
    client: Client,
    base_url: String,
    key_identity: String,
    key_credential: String,
}

impl OmekaApi {
    /// Create a new Omeka S client.
    pub fn new(config: &TargetConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            key_identity: config.key_identity.clone(),
            key_credential: config.key_credential.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Attach credentials, send, and decode a 2xx JSON answer.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PlatformError> {
        let response = request
            .query(&[
                ("key_identity", self.key_identity.as_str()),
                ("key_credential", self.key_credential.as_str()),
            ])
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        debug!("GET {} {:?}", path, query);
        self.send(self.client.get(self.url(path)).query(query))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        debug!("POST {}", path);
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        debug!("PUT {}", path);
        self.send(self.client.put(self.url(path)).json(body)).await
    }
}

#[async_trait]
impl PlatformApi for OmekaApi {
    async fn find_sites_by_slug(&self, slug: &str) -> Result<Vec<Site>, PlatformError> {
        let sites: Vec<Site> = self.get("sites", &[("slug", slug)]).await?;
        Ok(sites.into_iter().filter(|s| s.slug == slug).collect())
    }

    async fn create_site(&self, site: &NewSite) -> Result<Site, PlatformError> {
        self.post("sites", site).await
    }

    async fn get_site(&self, id: ResourceId) -> Result<Site, PlatformError> {
        self.get(&format!("sites/{}", id), &[]).await
    }

    async fn update_site(&self, site: &Site) -> Result<Site, PlatformError> {
        self.put(&format!("sites/{}", site.id), site).await
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, PlatformError> {
        let users: Vec<User> = self.get("users", &[("email", email)]).await?;
        Ok(users.into_iter().filter(|u| u.email == email).collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, PlatformError> {
        let per_page = PAGE_SIZE.to_string();
        let mut users = Vec::new();
        let mut page = 1usize;

        loop {
            let page_str = page.to_string();
            let batch: Vec<User> = self
                .get(
                    "users",
                    &[("page", page_str.as_str()), ("per_page", per_page.as_str())],
                )
                .await?;
            let done = batch.len() < PAGE_SIZE;
            users.extend(batch);
            if done {
                return Ok(users);
            }
            page += 1;
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, PlatformError> {
        self.post("users", user).await
    }

    async fn get_user(&self, id: ResourceId) -> Result<User, PlatformError> {
        self.get(&format!("users/{}", id), &[]).await
    }

    async fn update_user(&self, user: &User) -> Result<User, PlatformError> {
        self.put(&format!("users/{}", user.id), user).await
    }

    async fn find_importers_by_label(&self, label: &str) -> Result<Vec<Importer>, PlatformError> {
        let importers: Vec<Importer> = self.get("bulk_importers", &[("label", label)]).await?;
        Ok(importers.into_iter().filter(|i| i.label == label).collect())
    }

    async fn get_importer(&self, id: ResourceId) -> Result<Importer, PlatformError> {
        self.get(&format!("bulk_importers/{}", id), &[]).await
    }

    async fn create_importer(
        &self,
        template: &ImporterTemplate,
    ) -> Result<Importer, PlatformError> {
        self.post("bulk_importers", template).await
    }

    async fn find_mappings_by_label(&self, label: &str) -> Result<Vec<Mapping>, PlatformError> {
        let mappings: Vec<Mapping> = self.get("bulk_mappings", &[("label", label)]).await?;
        Ok(mappings.into_iter().filter(|m| m.label == label).collect())
    }

    async fn create_import(&self, request: &ImportRequest) -> Result<ImportJob, PlatformError> {
        self.post("bulk_imports", request).await
    }
}
