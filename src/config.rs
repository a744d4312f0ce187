use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::GenreTableVersion;
use crate::store::WriteMode;

/// File looked up in the working directory when no `--config` is given.
const DEFAULT_FILE: &str = "imdb_pipeline";
const ENV_PREFIX: &str = "IMDB";
/// The tenth retry already backs off for about 34 minutes.
pub const MAX_RETRIES_LIMIT: u32 = 10;

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid table name {0:?}: expected letters, digits and underscores")]
    InvalidTable(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("max_retries must be at most {}, got {0}", MAX_RETRIES_LIMIT)]
    TooManyRetries(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Listing pages fetched by `scrape`.
    pub source_urls: Vec<String>,
    pub raw_csv: PathBuf,
    pub normalized_csv: PathBuf,
    pub db_path: PathBuf,
    pub table: String,
    /// Fetching stops once this many unique rows are collected.
    pub target_rows: usize,
    pub chunk_size: usize,
    pub write_mode: WriteMode,
    pub genre_table: GenreTableVersion,
    /// Drop unrated rows before storing or reporting.
    pub require_rating: bool,
    pub concurrency: usize,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            source_urls: vec![
                "https://www.imdb.com/search/title/?title_type=feature&release_date=2024-01-01,2024-12-31"
                    .into(),
            ],
            raw_csv: PathBuf::from("data/movies_raw.csv"),
            normalized_csv: PathBuf::from("data/movies_normalized.csv"),
            db_path: PathBuf::from("data/imdb.db"),
            table: "movies".into(),
            target_rows: 5000,
            chunk_size: 10_000,
            write_mode: WriteMode::Replace,
            genre_table: GenreTableVersion::V2,
            require_rating: false,
            concurrency: 4,
            max_retries: 3,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
        }
    }
}

impl Settings {
    /// Defaults, then the config file, then `IMDB_*` environment variables.
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("source_urls"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !is_valid_table(&self.table) {
            return Err(SettingsError::InvalidTable(self.table.clone()));
        }
        if self.chunk_size == 0 {
            return Err(SettingsError::Zero("chunk_size"));
        }
        if self.concurrency == 0 {
            return Err(SettingsError::Zero("concurrency"));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(SettingsError::TooManyRetries(self.max_retries));
        }
        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn is_valid_table(name: &str) -> bool {
    TABLE_RE.is_match(name)
}
