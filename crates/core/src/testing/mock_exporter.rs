//! Mock channel exporter for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::exporter::{
    artifact_file_name, ChannelExporter, ExportArtifact, ExportWindow, PLACEHOLDER_PREFIX,
};

/// A recorded export call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedExport {
    pub channel_url: String,
    pub output_dir: PathBuf,
    pub window: Option<ExportWindow>,
}

/// Mock implementation of the ChannelExporter trait.
///
/// Writes `document` for every channel except those marked as failing,
/// which get a placeholder and `success == false`, like the real exporter.
#[derive(Debug, Clone)]
pub struct MockExporter {
    document: Arc<RwLock<String>>,
    failing: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<RecordedExport>>>,
}

impl Default for MockExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExporter {
    pub fn new() -> Self {
        Self {
            document: Arc::new(RwLock::new(super::fixtures::WXR_DOCUMENT.to_string())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Content written for successful exports.
    pub async fn set_document(&self, document: impl Into<String>) {
        *self.document.write().await = document.into();
    }

    /// Make exports of `channel_url` fail.
    pub async fn fail_channel(&self, channel_url: impl Into<String>) {
        self.failing.write().await.insert(channel_url.into());
    }

    pub async fn calls(&self) -> Vec<RecordedExport> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ChannelExporter for MockExporter {
    async fn export_channel(
        &self,
        channel_url: &str,
        output_dir: &Path,
        window: Option<ExportWindow>,
    ) -> ExportArtifact {
        self.calls.write().await.push(RecordedExport {
            channel_url: channel_url.to_string(),
            output_dir: output_dir.to_path_buf(),
            window,
        });

        let path = output_dir.join(artifact_file_name(channel_url));
        let success = !self.failing.read().await.contains(channel_url);
        let content = if success {
            self.document.read().await.clone()
        } else {
            format!("{} HTTP 500 -->", PLACEHOLDER_PREFIX)
        };

        let written = match tokio::fs::create_dir_all(output_dir).await {
            Ok(()) => tokio::fs::write(&path, content).await.is_ok(),
            Err(_) => false,
        };

        ExportArtifact {
            path,
            success: success && written,
        }
    }
}
