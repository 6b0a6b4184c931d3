//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_STORAGE__VECTOR_SIZE`). Typed
//! sections are extracted with [`Config::processor`] and [`Config::storage`];
//! a missing section falls back to its defaults.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self::from_figment(figment))
    }

    /// Build from an in-memory TOML document (tests, embedded defaults).
    pub fn from_toml_str(toml: &str) -> Self {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    /// Wrap an already layered figment, e.g. defaults joined with overrides.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn processor(&self) -> Result<ProcessorConfig> {
        self.section("processor")
    }

    pub fn storage(&self) -> Result<StorageConfig> {
        self.section("storage")
    }

    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(T::default()) }
    }
}

/// Options recognised by the document processor.
///
/// `strategy` stays a string here; it is parsed (and rejected if unknown)
/// when the processor is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: String,
    pub preserve_code_blocks: bool,
    pub enrich_metadata: bool,
    pub preserve_structure: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            strategy: "recursive".to_string(),
            preserve_code_blocks: true,
            enrich_metadata: true,
            preserve_structure: true,
        }
    }
}

/// Settings for the vector storage manager and its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Location of the vector database (a directory or a remote URI).
    pub uri: String,
    pub collection_name: String,
    pub vector_size: usize,
    pub distance_metric: String,
    pub connection_pool_size: usize,
    pub timeout_seconds: f64,
    /// Graph degree of the approximate index.
    pub hnsw_m: usize,
    pub hnsw_ef_construct: usize,
    /// Below this many points searches use an exact scan.
    pub full_scan_threshold: usize,
    /// Upper bound on the per-query exploration breadth.
    pub search_ef_cap: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uri: "data/vectors".to_string(),
            collection_name: "documents".to_string(),
            vector_size: 1024,
            distance_metric: "cosine".to_string(),
            connection_pool_size: 4,
            timeout_seconds: 30.0,
            hnsw_m: 16,
            hnsw_ef_construct: 100,
            full_scan_threshold: 10_000,
            search_ef_cap: 512,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
