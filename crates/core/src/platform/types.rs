//! Resource types exchanged with the target platform API.
//!
//! Field names follow the platform's JSON-LD prefixes (`o:`, `o-bulk:`).
//! Records keep every field they do not model in `extra`, so a record read
//! from the API can be written back without losing data.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Numeric id of a remote resource.
pub type ResourceId = u64;

/// Reference to another resource, e.g. `{"o:id": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "o:id")]
    pub id: ResourceId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceRef {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            extra: Map::new(),
        }
    }
}

/// A site on the target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "o:id")]
    pub id: ResourceId,
    #[serde(rename = "o:slug")]
    pub slug: String,
    #[serde(rename = "o:title", default)]
    pub title: String,
    #[serde(rename = "o:site_permission", default)]
    pub permissions: Vec<SitePermission>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Site {
    /// Returns the permission entry held by `user_id`, if any.
    pub fn permission_for(&self, user_id: ResourceId) -> Option<&SitePermission> {
        self.permissions.iter().find(|p| p.user.id == user_id)
    }
}

/// One entry of a site's permission list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePermission {
    #[serde(rename = "o:user")]
    pub user: ResourceRef,
    #[serde(rename = "o:role")]
    pub role: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for creating a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSite {
    #[serde(rename = "o:title")]
    pub title: String,
    #[serde(rename = "o:slug")]
    pub slug: String,
    #[serde(rename = "o:theme")]
    pub theme: String,
    #[serde(rename = "o:is_public")]
    pub is_public: bool,
    #[serde(rename = "o:assign_new_items")]
    pub assign_new_items: bool,
    #[serde(rename = "o:owner")]
    pub owner: ResourceRef,
}

/// A user account on the target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "o:id")]
    pub id: ResourceId,
    #[serde(rename = "o:name", default)]
    pub name: String,
    #[serde(rename = "o:email")]
    pub email: String,
    #[serde(rename = "o:role", default)]
    pub role: String,
    #[serde(rename = "o:is_active", default)]
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for creating a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(rename = "o:name")]
    pub name: String,
    #[serde(rename = "o:email")]
    pub email: String,
    #[serde(rename = "o:role")]
    pub role: String,
    #[serde(rename = "o:is_active")]
    pub is_active: bool,
    #[serde(rename = "o-module-isolatedsites:limit_to_granted_sites")]
    pub limit_to_granted_sites: bool,
    #[serde(rename = "o-module-isolatedsites:limit_to_own_assets")]
    pub limit_to_own_assets: bool,
}

/// A bulk mapping (referenced by importers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(rename = "o:id")]
    pub id: ResourceId,
    #[serde(rename = "o:label")]
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A provisioned bulk importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Importer {
    #[serde(rename = "o:id")]
    pub id: ResourceId,
    #[serde(rename = "o:label")]
    pub label: String,
    #[serde(rename = "o:config", default)]
    pub config: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Importer {
    /// The `reader` sub-config, empty if absent or not an object.
    pub fn reader_config(&self) -> Map<String, Value> {
        sub_config(&self.config, "reader")
    }

    /// The `processor` sub-config, empty if absent or not an object.
    pub fn processor_config(&self) -> Map<String, Value> {
        sub_config(&self.config, "processor")
    }
}

fn sub_config(config: &Map<String, Value>, key: &str) -> Map<String, Value> {
    config
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Importer template as found in the importer configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImporterTemplate {
    #[serde(rename = "o:label")]
    pub label: String,
    #[serde(
        rename = "o-bulk:mapper",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mapper: Option<MapperRef>,
    #[serde(rename = "o:config", default)]
    pub config: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Prefix marking a mapper given by label instead of id.
pub const MAPPER_LABEL_PREFIX: &str = "mapping:";

/// An importer's mapper reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum MapperRef {
    /// `"mapping:<label>"`, still to be resolved to a remote mapping.
    Symbolic(String),
    /// A remote mapping found by label during provisioning.
    Resolved { id: ResourceId, label: String },
    /// Anything else, including mapping objects, passed through untouched.
    Other(Value),
}

impl MapperRef {
    pub fn symbolic_label(&self) -> Option<&str> {
        match self {
            MapperRef::Symbolic(label) => Some(label),
            _ => None,
        }
    }
}

impl From<Value> for MapperRef {
    fn from(value: Value) -> Self {
        match &value {
            Value::String(s) => match s.strip_prefix(MAPPER_LABEL_PREFIX) {
                Some(label) => MapperRef::Symbolic(label.to_string()),
                None => MapperRef::Other(value),
            },
            _ => MapperRef::Other(value),
        }
    }
}

impl From<MapperRef> for Value {
    fn from(mapper: MapperRef) -> Self {
        match mapper {
            MapperRef::Symbolic(label) => Value::String(format!("{MAPPER_LABEL_PREFIX}{label}")),
            MapperRef::Resolved { id, label } => json!({
                "@type": "o-bulk:Mapping",
                "o:id": id,
                "o:label": label,
            }),
            MapperRef::Other(value) => value,
        }
    }
}

/// Reader/mapping/processor bundle of an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportParams {
    pub reader: Map<String, Value>,
    pub mapping: Option<Value>,
    pub processor: Map<String, Value>,
}

/// Payload for creating a bulk import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "o:job")]
    pub job: Option<Value>,
    #[serde(rename = "o-bulk:comment")]
    pub comment: String,
    #[serde(rename = "o:status")]
    pub status: String,
    #[serde(rename = "o:undo_job")]
    pub undo_job: Option<Value>,
    #[serde(rename = "o:importer")]
    pub importer: ResourceId,
    #[serde(rename = "o:params")]
    pub params: ImportParams,
}

/// A created bulk import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    #[serde(rename = "o:id")]
    pub id: ResourceId,
    /// Embedded importer object, when the platform expands it.
    #[serde(rename = "o-bulk:importer", default, skip_serializing_if = "Option::is_none")]
    pub embedded_importer: Option<Value>,
    /// Importer reference, either an id or `{"o:id": …}`.
    #[serde(rename = "o:importer", default, skip_serializing_if = "Option::is_none")]
    pub importer: Option<Value>,
    #[serde(rename = "o-bulk:comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "o:status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImportJob {
    /// Label of the embedded importer object, if present.
    pub fn embedded_importer_label(&self) -> Option<&str> {
        self.embedded_importer
            .as_ref()
            .and_then(|v| v.get("o:label"))
            .and_then(Value::as_str)
    }

    /// Id of the importer this job runs, from either reference form.
    pub fn importer_id(&self) -> Option<ResourceId> {
        let reference = self.importer.as_ref().or(self.embedded_importer.as_ref())?;
        reference
            .as_u64()
            .or_else(|| reference.get("o:id").and_then(Value::as_u64))
    }
}
