//! Importer template document loading.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

use super::ConfigError;
use crate::platform::ImporterTemplate;

#[derive(Debug, Deserialize)]
struct TemplateDocument {
    #[serde(default)]
    importers: Vec<Value>,
}

/// Load importer templates from a JSON document with an `importers` array.
pub fn load_importer_templates(path: &Path) -> Result<Vec<ImporterTemplate>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    info!("Loading importer templates from {:?}", path);
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
    parse_importer_templates(&raw)
}

/// Parse importer templates from a JSON string.
///
/// Entries that are not valid templates (e.g. without `o:label`) are skipped
/// with a warning.
pub fn parse_importer_templates(json: &str) -> Result<Vec<ImporterTemplate>, ConfigError> {
    let document: TemplateDocument =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let mut templates = Vec::with_capacity(document.importers.len());
    for (index, entry) in document.importers.into_iter().enumerate() {
        match serde_json::from_value::<ImporterTemplate>(entry) {
            Ok(template) => templates.push(template),
            Err(e) => warn!("Skipping importer template #{}: {}", index, e),
        }
    }

    info!("Loaded {} importer templates", templates.len());
    Ok(templates)
}

/// Set `o:config.importer.as_task` on every template.
///
/// `"1"` saves imports as queued tasks, `"0"` runs them immediately.
pub fn apply_task_mode(templates: &mut [ImporterTemplate], as_task: bool) {
    let task_value = if as_task { "1" } else { "0" };
    info!(
        "Setting as_task to '{}' for {} importers",
        task_value,
        templates.len()
    );

    for template in templates.iter_mut() {
        let importer = template
            .config
            .entry("importer")
            .or_insert_with(|| Value::Object(Map::new()));
        if !importer.is_object() {
            *importer = Value::Object(Map::new());
        }
        if let Value::Object(importer) = importer {
            importer.insert("as_task".to_string(), Value::String(task_value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MapperRef;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"{
        "importers": [
            {
                "o:label": "Media",
                "o-bulk:mapper": "mapping:WP media",
                "o:config": {
                    "importer": {"as_task": "0", "notify_end": "1"},
                    "reader": {"xsl_params": {"SiteId": ""}},
                    "processor": {"o:is_public": true}
                }
            },
            {
                "o:label": "Item sets"
            },
            {
                "o:config": {}
            }
        ]
    }"#;

    #[test]
    fn test_parse_templates_skips_entries_without_label() {
        let templates = parse_importer_templates(DOCUMENT).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].label, "Media");
        assert_eq!(
            templates[0].mapper,
            Some(MapperRef::Symbolic("WP media".to_string()))
        );
        assert!(templates[1].config.is_empty());
    }

    #[test]
    fn test_parse_invalid_document_fails() {
        let result = parse_importer_templates("not json");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_document_without_importers_is_empty() {
        let templates = parse_importer_templates("{}").unwrap();
        assert!(templates.is_empty());
    }

    #[test]
    fn test_apply_task_mode_overrides_and_creates() {
        let mut templates = parse_importer_templates(DOCUMENT).unwrap();
        apply_task_mode(&mut templates, true);

        assert_eq!(
            templates[0].config["importer"],
            json!({"as_task": "1", "notify_end": "1"})
        );
        assert_eq!(templates[1].config["importer"], json!({"as_task": "1"}));

        apply_task_mode(&mut templates, false);
        assert_eq!(templates[1].config["importer"]["as_task"], json!("0"));
    }

    #[test]
    fn test_load_templates_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", DOCUMENT).unwrap();

        let templates = load_importer_templates(file.path()).unwrap();
        assert_eq!(templates.len(), 2);
    }

    #[test]
    fn test_load_templates_missing_file() {
        let result = load_importer_templates(Path::new("/nonexistent/importers.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
