//! Channel list model and CSV ingestion.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Columns every channel list must have.
pub const REQUIRED_COLUMNS: [&str; 4] = ["name", "url", "slug", "editor"];

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel list not found: {0}")]
    FileNotFound(String),

    #[error("Channel list is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source channel to migrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Source site URL.
    pub url: String,
    /// Identity of the channel across a run and on the target platform.
    pub slug: String,
    /// Source username of the channel's editor.
    pub editor: String,
}

impl Channel {
    /// Build a channel; an empty slug is derived from the name.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        slug: impl Into<String>,
        editor: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let slug = slug.into();
        let slug = if slug.is_empty() { slugify(&name) } else { slug };
        Self {
            name,
            url: url.into(),
            slug,
            editor: editor.into(),
        }
    }
}

/// Lowercase, spaces to hyphens, then drop anything but `[a-z0-9-]`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Load channels from a CSV file.
pub fn load_channels(path: &Path) -> Result<Vec<Channel>, ChannelError> {
    if !path.exists() {
        return Err(ChannelError::FileNotFound(path.display().to_string()));
    }
    info!("Reading channels from {:?}", path);
    let file = std::fs::File::open(path)?;
    parse_channels(file)
}

/// Parse a channel list.
///
/// Lines whose first non-blank character is `#` are ignored, values are
/// trimmed, extra columns are ignored and rows without a name or URL are
/// skipped.
pub fn parse_channels<R: Read>(mut reader: R) -> Result<Vec<Channel>, ChannelError> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    let content: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .map(|line| format!("{}\n", line))
        .collect();

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| column(**c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ChannelError::MissingColumns(missing));
    }
    // Every required column is present past this point.
    let [name_idx, url_idx, slug_idx, editor_idx] =
        REQUIRED_COLUMNS.map(|c| column(c).unwrap_or_default());

    let mut channels = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();

        let name = field(name_idx);
        let url = field(url_idx);
        if name.is_empty() {
            warn!("Skipping row {} with empty channel name", row + 1);
            continue;
        }
        if url.is_empty() {
            warn!("Skipping row {} ({}) with empty URL", row + 1, name);
            continue;
        }

        let channel = Channel::new(name, url, field(slug_idx), field(editor_idx));
        debug!("Read channel: {}", channel.name);
        channels.push(channel);
    }

    info!("Read {} channels", channels.len());
    Ok(channels)
}
