//! Import job templating.
//!
//! Turns an importer's current remote configuration plus per-job overrides
//! into an import request. Pure: no I/O, the caller supplies the file size.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use super::adapter::PlatformSettings;
use super::types::{ImportParams, ImportRequest, Importer, ResourceId};

pub const IMPORT_TYPE: &str = "o-bulk:Import";
pub const IMPORT_STATUS_READY: &str = "ready";
pub const EXPORT_MIME_TYPE: &str = "text/xml";

/// Per-job values merged into an importer's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOverrides {
    /// Basename of the export file in the preload directory.
    pub file_name: String,
    pub file_size: u64,
    pub channel_name: String,
    pub owner_id: Option<ResourceId>,
    pub site_id: Option<ResourceId>,
    pub min_post_date: Option<NaiveDate>,
}

/// Build the import request for one (channel, importer) pair.
pub fn build_import_request(
    importer: &Importer,
    overrides: &ImportOverrides,
    settings: &PlatformSettings,
) -> ImportRequest {
    let mut reader = importer.reader_config();
    let mut processor = importer.processor_config();

    let full_path = format!(
        "{}/{}",
        settings.preload_path.trim_end_matches('/'),
        overrides.file_name
    );
    reader.insert("filename".to_string(), Value::String(full_path.clone()));
    reader.insert(
        "file".to_string(),
        json!({
            "name": overrides.file_name,
            "full_path": full_path,
            "type": EXPORT_MIME_TYPE,
            "error": 0,
            "size": overrides.file_size,
        }),
    );

    if let Some(site_id) = overrides.site_id {
        inject_site_id(&mut reader, &settings.site_param_key, site_id);
    }

    if let Some(owner_id) = overrides.owner_id {
        processor.insert("o:owner".to_string(), json!(owner_id));
    }

    if let Some(date) = overrides.min_post_date {
        set_xsl_param(
            &mut reader,
            &settings.min_date_param_key,
            date.format("%Y-%m-%d").to_string(),
        );
    }

    ImportRequest {
        kind: IMPORT_TYPE.to_string(),
        job: None,
        comment: import_comment(&overrides.channel_name, &importer.label),
        status: IMPORT_STATUS_READY.to_string(),
        undo_job: None,
        importer: importer.id,
        params: ImportParams {
            reader,
            mapping: None,
            processor,
        },
    }
}

/// Comment attached to every import job.
pub fn import_comment(channel_name: &str, importer_label: &str) -> String {
    format!("Site: {}, Importer: {}", channel_name, importer_label)
}

/// Only an existing key is replaced; templates without it are left alone.
fn inject_site_id(reader: &mut Map<String, Value>, key: &str, site_id: ResourceId) {
    if let Some(Value::Object(params)) = reader.get_mut("xsl_params") {
        if let Some(slot) = params.get_mut(key) {
            *slot = Value::String(site_id.to_string());
        }
    }
}

fn set_xsl_param(reader: &mut Map<String, Value>, key: &str, value: String) {
    let params = reader
        .entry("xsl_params")
        .or_insert_with(|| Value::Object(Map::new()));
    if !params.is_object() {
        *params = Value::Object(Map::new());
    }
    if let Value::Object(params) = params {
        params.insert(key.to_string(), Value::String(value));
    }
}
