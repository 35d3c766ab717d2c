//! Testing utilities and mock implementations.
//!
//! Mocks of the platform API and the channel exporter, so the orchestrator
//! can run end to end without a target platform or a source site.
//!
//! # Example
//!
//! ```rust,ignore
//! use channel_migrator_core::testing::{fixtures, MockExporter, MockPlatformApi};
//!
//! let api = Arc::new(MockPlatformApi::new());
//! let exporter = Arc::new(MockExporter::new());
//! exporter.fail_channel("https://blog.example.org/broken").await;
//! ```

mod mock_exporter;
mod mock_platform;

pub use mock_exporter::{MockExporter, RecordedExport};
pub use mock_platform::MockPlatformApi;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Map};

    use crate::channel::Channel;
    use crate::platform::{Importer, ImporterTemplate, PlatformSettings, Site, User};

    /// WXR export with one media category, one root attachment and one
    /// attached image.
    pub const WXR_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
  <wp:term><wp:term_id>3</wp:term_id><wp:term_taxonomy><![CDATA[media-category]]></wp:term_taxonomy></wp:term>
  <item>
    <title>cover.jpg</title>
    <wp:post_type><![CDATA[attachment]]></wp:post_type>
    <wp:post_parent>0</wp:post_parent>
  </item>
  <item>
    <title>figure.png</title>
    <wp:post_type><![CDATA[attachment]]></wp:post_type>
    <wp:post_parent>12</wp:post_parent>
  </item>
  <item>
    <title>Hello world</title>
    <wp:post_type><![CDATA[post]]></wp:post_type>
    <wp:post_parent>0</wp:post_parent>
  </item>
</channel>
</rss>"#;

    /// Channel at `https://blog.example.org/<slug>`.
    pub fn channel(name: &str, slug: &str, editor: &str) -> Channel {
        Channel::new(
            name,
            format!("https://blog.example.org/{}", slug),
            slug,
            editor,
        )
    }

    pub fn site(id: u64, slug: &str) -> Site {
        Site {
            id,
            slug: slug.to_string(),
            title: slug.to_string(),
            permissions: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn user(id: u64, name: &str, email: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role: "editor".to_string(),
            is_active: true,
            extra: Map::new(),
        }
    }

    pub fn importer(id: u64, label: &str) -> Importer {
        Importer {
            id,
            label: label.to_string(),
            config: Map::new(),
            extra: Map::new(),
        }
    }

    /// Importer template with a `SiteId` reader parameter and a symbolic
    /// mapper.
    pub fn importer_template(label: &str, mapping: &str) -> ImporterTemplate {
        serde_json::from_value(json!({
            "o:label": label,
            "o-bulk:reader": "BulkImport\\Reader\\XmlReader",
            "o-bulk:processor": "BulkImport\\Processor\\ResourceProcessor",
            "o-bulk:mapper": format!("mapping:{}", mapping),
            "o:config": {
                "importer": {"as_task": "0"},
                "reader": {"xsl_params": {"SiteId": "", "Lang": "fr"}},
                "processor": {"o:is_public": true}
            }
        }))
        .unwrap_or_else(|e| panic!("invalid importer template fixture: {e}"))
    }

    pub fn platform_settings() -> PlatformSettings {
        PlatformSettings {
            site_owner_id: 1,
            site_theme: "freedom".to_string(),
            editor_role: "editor".to_string(),
            preload_path: "/var/www/html/omeka-s/files/preload".to_string(),
            site_param_key: "SiteId".to_string(),
            min_date_param_key: "MinPostDate".to_string(),
        }
    }
}
