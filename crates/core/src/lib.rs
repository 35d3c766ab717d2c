pub mod channel;
pub mod config;
pub mod exporter;
pub mod orchestrator;
pub mod platform;
pub mod report;
pub mod sso;
pub mod testing;

pub use channel::{load_channels, parse_channels, slugify, Channel, ChannelError};
pub use config::{
    load_config, load_config_from_str, load_importer_templates, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use exporter::{ChannelExporter, ExportArtifact, ExportWindow, RetryConfig, WordPressExporter};
pub use orchestrator::{
    FailurePolicy, MigrationError, MigrationOrchestrator, MigrationResult, MigrationStatus,
    OrchestratorConfig, RunSummary,
};
pub use platform::{OmekaApi, PlatformApi, PlatformError, PlatformSettings, TargetPlatform};
pub use report::{ChannelReport, ReportError, ReportLedger, StructuralCounts};
pub use sso::{AuthError, CasAuthenticator, Session};
