//! WordPress export endpoint client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{error, info, warn};

use crate::config::SourceConfig;
use crate::sso::{CasAuthenticator, Session};

use super::retry::{get_with_retry, RetryConfig};
use super::{ChannelExporter, ExportArtifact, ExportWindow};

/// Start of the comment written into placeholder artifacts.
pub const PLACEHOLDER_PREFIX: &str = "<!-- Error exporting data:";

/// Full export endpoint URL of a channel.
pub fn export_url(channel_url: &str, export_path: &str) -> String {
    format!(
        "{}/{}",
        channel_url.trim_end_matches('/'),
        export_path.trim_start_matches('/')
    )
}

/// `<last path segment>.xml`, or `export.xml` for a bare host.
pub fn artifact_file_name(channel_url: &str) -> String {
    let segment = Url::parse(channel_url).ok().and_then(|url| {
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
    });
    format!("{}.xml", segment.unwrap_or_else(|| "export".to_string()))
}

fn export_query(window: Option<ExportWindow>) -> Vec<(&'static str, String)> {
    match window {
        None => vec![
            ("download", "true".to_string()),
            ("content", "all".to_string()),
        ],
        Some(window) => vec![
            ("download", "true".to_string()),
            ("content", "attachment".to_string()),
            ("attachment_start_date", window.month_param()),
            ("attachment_end_date", window.month_param()),
        ],
    }
}

/// Exports WordPress channels behind a CAS gateway.
pub struct WordPressExporter {
    authenticator: CasAuthenticator,
    username: String,
    password: String,
    export_path: String,
    retry: RetryConfig,
}

impl WordPressExporter {
    pub fn new(
        authenticator: CasAuthenticator,
        username: impl Into<String>,
        password: impl Into<String>,
        export_path: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            authenticator,
            username: username.into(),
            password: password.into(),
            export_path: export_path.into(),
            retry,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        let authenticator = CasAuthenticator::new(
            config.sso_gateway.clone(),
            Duration::from_secs(config.timeout_secs as u64),
        );
        Self::new(
            authenticator,
            config.username.clone(),
            config.password.clone(),
            config.export_path.clone(),
            config.retry.clone(),
        )
    }

    /// Download the export of `channel_url` with an existing session.
    pub async fn export(
        &self,
        session: &Session,
        channel_url: &str,
        output_dir: &Path,
        window: Option<ExportWindow>,
    ) -> ExportArtifact {
        let path = output_dir.join(artifact_file_name(channel_url));

        match self
            .download(session, channel_url, output_dir, &path, window)
            .await
        {
            Ok(()) => {
                info!("Exported {} to {}", channel_url, path.display());
                ExportArtifact {
                    path,
                    success: true,
                }
            }
            Err(message) => {
                error!("Failed to export {}: {}", channel_url, message);
                failed_artifact(path, &message).await
            }
        }
    }

    async fn download(
        &self,
        session: &Session,
        channel_url: &str,
        output_dir: &Path,
        path: &Path,
        window: Option<ExportWindow>,
    ) -> Result<(), String> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| format!("cannot create {}: {}", output_dir.display(), e))?;

        let url = export_url(channel_url, &self.export_path);
        let query = export_query(window);
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();

        info!("Exporting {}", url);
        let response = get_with_retry(session.client(), &url, &query, &self.retry)
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Export endpoint answered {}: {}", status, body);
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| format!("cannot write {}: {}", path.display(), e))
    }
}

#[async_trait]
impl ChannelExporter for WordPressExporter {
    async fn export_channel(
        &self,
        channel_url: &str,
        output_dir: &Path,
        window: Option<ExportWindow>,
    ) -> ExportArtifact {
        let url = export_url(channel_url, &self.export_path);
        info!("Logging in to {}", channel_url);

        match self
            .authenticator
            .login(&url, &self.username, &self.password)
            .await
        {
            Ok(session) => self.export(&session, channel_url, output_dir, window).await,
            Err(e) => {
                error!("Login failed for {}: {}", channel_url, e);
                let path = output_dir.join(artifact_file_name(channel_url));
                if let Err(io) = tokio::fs::create_dir_all(output_dir).await {
                    warn!("Cannot create {}: {}", output_dir.display(), io);
                }
                failed_artifact(path, &e.to_string()).await
            }
        }
    }
}

/// Write a placeholder for a failed export.
async fn failed_artifact(path: PathBuf, message: &str) -> ExportArtifact {
    let placeholder = format!("{} {} -->", PLACEHOLDER_PREFIX, message);
    if let Err(e) = tokio::fs::write(&path, placeholder).await {
        warn!("Cannot write placeholder {}: {}", path.display(), e);
    }
    ExportArtifact {
        path,
        success: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const LOGIN_FORM: &str = r#"<input type="hidden" name="execution" value="tok"/>"#;

    async fn export_handler(Query(q): Query<HashMap<String, String>>) -> Response {
        match q.get("content").map(String::as_str) {
            Some("all") if q.get("download").map(String::as_str) == Some("true") => {
                "<rss>all</rss>".into_response()
            }
            Some("attachment")
                if q.get("attachment_start_date").map(String::as_str) == Some("2024-03")
                    && q.get("attachment_end_date").map(String::as_str) == Some("2024-03") =>
            {
                "<rss>march</rss>".into_response()
            }
            _ => (StatusCode::BAD_REQUEST, "bad query").into_response(),
        }
    }

    async fn spawn_source() -> String {
        let router = Router::new()
            .route(
                "/cas/login",
                get(|| async { LOGIN_FORM }).post(|| async {
                    (StatusCode::FOUND, [(axum::http::header::LOCATION, "/done")])
                }),
            )
            .route("/done", get(|| async { "ok" }))
            .route("/radio/wp-admin/export.php", get(export_handler))
            .route(
                "/broken/wp-admin/export.php",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn exporter(gateway: &str) -> WordPressExporter {
        WordPressExporter::new(
            CasAuthenticator::new(gateway, Duration::from_secs(5)),
            "migrator",
            "pw",
            "wp-admin/export.php",
            RetryConfig {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                backoff_multiplier: 1.0,
            },
        )
    }

    #[test]
    fn test_export_url_and_file_name() {
        assert_eq!(
            export_url("https://blog.example.org/radio/", "wp-admin/export.php"),
            "https://blog.example.org/radio/wp-admin/export.php"
        );
        assert_eq!(artifact_file_name("https://blog.example.org/radio/"), "radio.xml");
        assert_eq!(artifact_file_name("https://blog.example.org"), "export.xml");
    }

    #[tokio::test]
    async fn test_full_export_writes_body() {
        let base = spawn_source().await;
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested");

        let artifact = exporter(&base)
            .export_channel(&format!("{}/radio/", base), &output, None)
            .await;

        assert!(artifact.success);
        assert_eq!(artifact.path, output.join("radio.xml"));
        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "<rss>all</rss>");
    }

    #[tokio::test]
    async fn test_windowed_export_uses_month_bounds() {
        let base = spawn_source().await;
        let dir = TempDir::new().unwrap();
        let window = ExportWindow::from_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        let artifact = exporter(&base)
            .export_channel(&format!("{}/radio", base), dir.path(), Some(window))
            .await;

        assert!(artifact.success);
        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "<rss>march</rss>");
    }

    #[tokio::test]
    async fn test_server_error_writes_placeholder() {
        let base = spawn_source().await;
        let dir = TempDir::new().unwrap();

        let artifact = exporter(&base)
            .export_channel(&format!("{}/broken", base), dir.path(), None)
            .await;

        assert!(!artifact.success);
        assert_eq!(artifact.path, dir.path().join("broken.xml"));
        let content = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(content.starts_with(PLACEHOLDER_PREFIX));
        assert!(content.contains("500"));
    }

    #[tokio::test]
    async fn test_login_failure_writes_placeholder() {
        let base = spawn_source().await;
        let dir = TempDir::new().unwrap();
        // No CAS endpoint under this gateway: the login form has no token.
        let artifact = exporter(&format!("{}/nowhere", base))
            .export_channel(&format!("{}/radio", base), dir.path(), None)
            .await;

        assert!(!artifact.success);
        let content = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(content.starts_with(PLACEHOLDER_PREFIX));
    }
}
