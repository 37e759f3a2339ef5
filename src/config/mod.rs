//! # Notifier Configuration
//!
//! Externally supplied settings for the assembly availability notifier:
//! which items the query selects, how the batch fans out, who receives the
//! alert, and where the item database lives.
//!
//! ## Sources
//!
//! Configuration is layered by [`ConfigManager`]:
//!
//! 1. `config/notifier.toml` (base)
//! 2. `config/notifier.{environment}.toml` (optional override)
//! 3. `ASSEMBLY_NOTIFIER__SECTION__KEY` environment variables
//!
//! Every field has a default, so any layer may be sparse. The merged result is
//! validated before use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use assembly_notifier::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let page_size = manager.config().source.page_size;
//! let recipients = &manager.config().notification.recipients;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::ItemKind;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Default number of rows per query page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Default alert subject; `{count}` is replaced with the number of rows
pub const DEFAULT_SUBJECT_TEMPLATE: &str =
    "Alert: Main Warehouse Assemblies Below Availability Limit ({count})";

/// Accepts an address list either as an array or as one comma-separated string
fn deserialize_address_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AddressList {
        Joined(String),
        Listed(Vec<String>),
    }

    let addresses = match AddressList::deserialize(deserializer)? {
        AddressList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        AddressList::Listed(listed) => listed,
    };

    Ok(addresses
        .into_iter()
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .collect())
}

/// Root configuration structure mirroring notifier.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Item query filters and paging
    pub source: SourceConfig,

    /// Fan-out, concurrency caps and page retry policy
    pub batch: BatchConfig,

    /// Alert recipients and message template
    pub notification: NotificationConfig,

    /// Item database connection
    pub database: DatabaseConfig,
}

/// Item query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Warehouse whose availability is checked
    pub location_id: String,
    /// Warehouse used for component availability; defaults to `location_id`
    pub component_location_id: Option<String>,
    pub item_kinds: Vec<ItemKind>,
    pub component_kinds: Vec<ItemKind>,
    /// Only items flagged as assembled in-house
    pub assembled_in_house: bool,
    /// Entity field holding the per-item minimum; items without it are ignored
    pub threshold_field: String,
    /// Entity field stamped with the notification date; stamped items are ignored
    pub marker_field: String,
    pub page_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location_id: "1".to_string(),
            component_location_id: None,
            item_kinds: vec![ItemKind::Assembly],
            component_kinds: vec![ItemKind::Assembly, ItemKind::InventoryPart],
            assembled_in_house: true,
            threshold_field: "notify_min_quantity".to_string(),
            marker_field: "notify_date_added".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SourceConfig {
    pub fn component_location(&self) -> &str {
        self.component_location_id
            .as_deref()
            .unwrap_or(&self.location_id)
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pages processed at the same time
    pub page_concurrency: usize,
    /// Entity saves in flight at the same time, across all pages
    pub mutation_concurrency: usize,
    /// Additional attempts after a failed page fetch
    pub page_fetch_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_concurrency: 4,
            mutation_concurrency: 16,
            page_fetch_retries: 3,
            retry_backoff_ms: 250,
            max_backoff_ms: 5_000,
        }
    }
}

/// Alert delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    #[serde(deserialize_with = "deserialize_address_list")]
    pub recipients: Vec<String>,
    #[serde(deserialize_with = "deserialize_address_list")]
    pub bcc: Vec<String>,
    /// Sending employee/user reference understood by the mail sink
    pub author: Option<String>,
    pub reply_to: Option<String>,
    pub subject_template: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            bcc: Vec::new(),
            author: None,
            reply_to: None,
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn subject_for(&self, count: usize) -> String {
        self.subject_template.replace("{count}", &count.to_string())
    }
}

/// Item database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Explicit URL, falling back to `DATABASE_URL`
    pub fn database_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
    }
}

impl NotifierConfig {
    /// Validate the merged configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.source.location_id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "source.location_id",
                "source configuration",
            ));
        }

        if self.source.item_kinds.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "source.item_kinds",
                "source configuration",
            ));
        }

        if self.source.page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "source.page_size",
                "0",
                "page size must be greater than 0",
            ));
        }

        if self.source.marker_field.is_empty() || self.source.threshold_field.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "source.marker_field/source.threshold_field",
                "source configuration",
            ));
        }

        if self.source.marker_field == self.source.threshold_field {
            return Err(ConfigurationError::invalid_value(
                "source.marker_field",
                self.source.marker_field.clone(),
                "marker field must differ from threshold field",
            ));
        }

        if self.batch.page_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.page_concurrency",
                "0",
                "page concurrency must be greater than 0",
            ));
        }

        if self.batch.mutation_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.mutation_concurrency",
                "0",
                "mutation concurrency must be greater than 0",
            ));
        }

        if self.notification.recipients.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "notification.recipients",
                "notification configuration",
            ));
        }

        for address in self
            .notification
            .recipients
            .iter()
            .chain(self.notification.bcc.iter())
        {
            if !address.contains('@') {
                return Err(ConfigurationError::invalid_value(
                    "notification.recipients/bcc",
                    address.clone(),
                    "not an email address",
                ));
            }
        }

        if !self.notification.subject_template.contains("{count}") {
            return Err(ConfigurationError::invalid_value(
                "notification.subject_template",
                self.notification.subject_template.clone(),
                "subject template must contain {count}",
            ));
        }

        Ok(())
    }
}
