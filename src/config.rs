use std::fs;
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::media_types::MediaType;
use crate::storage::StorageBackend;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MigrationConfig {
    pub page_size: u32,
    pub storage_provider: String,
    pub downloads_dir: String,
    pub uploaded_dir: String,
}

impl MigrationConfig {
    const PAGE_SIZE: u32 = 1000;
    const STORAGE_PROVIDER: &str = "file-system";
    const DOWNLOADS_DIR: &str = "Downloads";
    const UPLOADED_DIR: &str = "Uploaded";

    fn default() -> Self {
        MigrationConfig {
            page_size: Self::PAGE_SIZE,
            storage_provider: Self::STORAGE_PROVIDER.to_string(),
            downloads_dir: Self::DOWNLOADS_DIR.to_string(),
            uploaded_dir: Self::UPLOADED_DIR.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        if self.page_size == 0 {
            eprintln!(
                "Config error: page_size of 0 is invalid - using default of '{}'",
                Self::PAGE_SIZE
            );
            self.page_size = Self::PAGE_SIZE;
        }

        let str_original = self.storage_provider.clone();
        self.storage_provider = self.storage_provider.trim().to_ascii_lowercase();
        if StorageBackend::from_key(&self.storage_provider).is_err() {
            eprintln!(
                "Config error: storage provider of '{}' is invalid - using default of '{}'",
                str_original,
                Self::STORAGE_PROVIDER
            );
            self.storage_provider = Self::STORAGE_PROVIDER.to_owned();
        }
    }
}

/// Extension lists driving media type classification. Space-separated,
/// lowercase, no leading dots. These also seed the settings bootstrap.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MediaTypesConfig {
    pub image: String,
    pub video: String,
    pub audio: String,
    pub document: String,
    pub text: String,
}

impl MediaTypesConfig {
    fn default() -> Self {
        MediaTypesConfig {
            image: MediaType::Image.default_extensions().to_string(),
            video: MediaType::Video.default_extensions().to_string(),
            audio: MediaType::Audio.default_extensions().to_string(),
            document: MediaType::Document.default_extensions().to_string(),
            text: MediaType::Text.default_extensions().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub migration: MigrationConfig,
    pub media_types: MediaTypesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            migration: MigrationConfig::default(),
            media_types: MediaTypesConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file in the given directory,
    /// layered under `MEDIASHIFT_`-prefixed environment variables.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(config_dir: &Path) -> Self {
        let config_path = config_dir.join("config.toml");

        let default_config = Config::default();

        // If the config file doesn't exist, write the default configuration to disk.
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!(
                        "Failed to create configuration directory {}: {}",
                        parent.display(),
                        e
                    );
                }
            }
            if let Ok(toml_string) = toml::to_string_pretty(&default_config) {
                if let Err(e) = fs::write(&config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            } else {
                eprintln!("Failed to serialize default config.");
            }
        }

        // Build a Figment instance that uses the defaults merged with the TOML
        // file (if it exists) and the environment
        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("MEDIASHIFT_").split("__"));

        // Attempt to extract the configuration; on error, log a message and fall back to defaults.
        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn ensure_valid(&mut self) {
        self.migration.ensure_valid();
    }
}
