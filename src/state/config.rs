/// Dashboard configuration
///
/// Stored as JSON in the user's config directory:
/// - Linux: ~/.config/game-dash/config.json
/// - macOS: ~/Library/Application Support/game-dash/config.json
/// - Windows: %APPDATA%\game-dash\config.json
///
/// A missing file gives the defaults.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::data::SortMode;
use super::library::TIMESTAMP_FORMAT;
use crate::error::{DashError, DashResult};

/// Name of the page filled by the recently-played query
pub const RECENT_PAGE: &str = "Recent";

/// One page of the dashboard
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageDef {
    pub name: String,
}

impl PageDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DashConfig {
    /// Pages in display order
    pub pages: Vec<PageDef>,
    /// Per-page sort mode, `Name=index` entries separated by `;`
    pub page_sorts: String,
    /// Titles launched within this many days show on the Recent page
    pub recent_days: u32,
    /// Most titles shown on the Recent page
    pub max_recent: u32,
    /// Page shown at startup
    pub default_page: usize,
    /// Title database, defaults to the data directory
    pub database: Option<PathBuf>,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            pages: vec![
                PageDef::new(RECENT_PAGE),
                PageDef::new("Games"),
                PageDef::new("Applications"),
            ],
            page_sorts: String::new(),
            recent_days: 30,
            max_recent: 25,
            default_page: 1,
            database: None,
        }
    }
}

impl DashConfig {
    /// Load the config at `path`, or the defaults if it does not exist
    pub fn load(path: &Path) -> DashResult<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| DashError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| DashError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> DashResult<()> {
        let io_error = |source| DashError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let text = serde_json::to_string_pretty(self).map_err(|source| DashError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(io_error)
    }

    /// Get the path where the config should be stored
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        path.push("game-dash");
        path.push("config.json");
        path
    }

    /// The configured database, or `<data_dir>/game-dash/titles.db`
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."));

            path.push("game-dash");
            path.push("titles.db");
            path
        })
    }

    /// Sort mode configured for `page`, if any. Out-of-range values clamp.
    pub fn sort_for_page(&self, page: &str) -> Option<SortMode> {
        self.sort_entries()
            .find(|(name, _)| *name == page)
            .and_then(|(_, value)| value.parse::<i64>().ok())
            .map(SortMode::from_index)
    }

    /// Store `mode` for `page`, replacing any previous entry
    pub fn set_page_sort(&mut self, page: &str, mode: SortMode) {
        let mut entries: Vec<String> = self
            .sort_entries()
            .filter(|(name, _)| *name != page)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();

        entries.push(format!("{}={}", page, mode.index()));
        self.page_sorts = entries.join(";");
    }

    /// Oldest last-launch time that still counts as recent
    pub fn earliest_recent(&self, now: DateTime<Utc>) -> String {
        (now - Duration::days(i64::from(self.recent_days)))
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    fn sort_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.page_sorts
            .split(|c: char| c == ';' || c == ',')
            .filter_map(|entry| entry.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
    }
}
