//! # Configuration
//!
//! Configuration is managed by [`clapfig`], which handles layered loading from TOML files,
//! environment variables, and compiled defaults.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `AEVIQUERY__TABLE_NAME`, `AEVIQUERY__LOCAL`, etc.
//! 2. **Working directory**: `./aeviquery.toml`.
//! 3. **Global Config**: `aeviquery.toml` in the OS config directory (via `directories`).
//! 4. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `table_name` | `prod-aevi-Transaction` | Transaction table |
//! | `region` | `eu-west-1` | Region the table lives in |
//! | `local` | `false` | Talk to a local table endpoint instead |
//! | `status_index` | `status` | Secondary index keyed on status |
//! | `filename_index` | `transaction_filename_id` | Secondary index keyed on file name |
//! | `id_attribute` | `_id` | Primary key attribute |
//! | `results_path` | `./results.json` | Default snapshot file |
//! | `filtered_page_size` | `1` | Items evaluated per request when filtering server-side |

use clapfig::{Clapfig, SearchMode, SearchPath};
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{QueryError, Result};
use crate::store::snapshot;

pub const APP_NAME: &str = "aeviquery";
pub const CONFIG_FILE_NAME: &str = "aeviquery.toml";

/// Settings for the transaction queries, stored in `aeviquery.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Table the client connects to. Read by [`TableClient`](crate::store::TableClient)
    /// implementations, together with `region` and `local`.
    #[config(default = "prod-aevi-Transaction")]
    pub table_name: String,

    #[config(default = "eu-west-1")]
    pub region: String,

    /// Use a local table endpoint (development).
    #[config(default = false)]
    pub local: bool,

    #[config(default = "status")]
    pub status_index: String,

    #[config(default = "transaction_filename_id")]
    pub filename_index: String,

    #[config(default = "_id")]
    pub id_attribute: String,

    #[config(default = "./results.json")]
    pub results_path: PathBuf,

    /// Items the table evaluates per request on a filtered status query.
    /// Small pages keep page markers frequent.
    #[config(default = 1)]
    pub filtered_page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            table_name: "prod-aevi-Transaction".to_string(),
            region: "eu-west-1".to_string(),
            local: false,
            status_index: "status".to_string(),
            filename_index: "transaction_filename_id".to_string(),
            id_attribute: "_id".to_string(),
            results_path: snapshot::default_path(),
            filtered_page_size: 1,
        }
    }
}

impl QueryConfig {
    /// Loads from the global config directory merged with the working directory.
    pub fn load() -> Result<Self> {
        let mut dirs = Vec::new();
        if let Some(proj_dirs) = ProjectDirs::from("com", APP_NAME, APP_NAME) {
            dirs.push(proj_dirs.config_dir().to_path_buf());
        }
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }
        Self::load_from(dirs)
    }

    /// Loads from the given directories; later directories override earlier ones.
    pub fn load_from(dirs: Vec<PathBuf>) -> Result<Self> {
        let config: QueryConfig = Clapfig::builder()
            .app_name(APP_NAME)
            .file_name(CONFIG_FILE_NAME)
            .search_paths(dirs.into_iter().map(SearchPath::Path).collect())
            .search_mode(SearchMode::Merge)
            .load()
            .map_err(|e| QueryError::Config(e.to_string()))?;
        config.validate()?;
        tracing::debug!(table = %config.table_label(), "loaded config");
        Ok(config)
    }

    /// Where queries go, for logs: `table@region` or `table@local`.
    pub fn table_label(&self) -> String {
        let location = if self.local { "local" } else { self.region.as_str() };
        format!("{}@{}", self.table_name, location)
    }

    pub fn validate(&self) -> Result<()> {
        if self.filtered_page_size == 0 {
            return Err(QueryError::Config(
                "filtered_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
