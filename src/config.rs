// src/config.rs

//! Defines the configuration structures for the `srparse` parser.
//!
//! The configuration is read from a JSON file whose path is given by the
//! `SRPARSE_CONFIG` environment variable. Every section and field has a
//! default, so a partial file (or no file at all) is valid.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::objective::ObjectiveOptions;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SRPARSE_CONFIG";

/// Process-wide configuration, loaded on first use.
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

// --- Top-Level Configuration Structure ---

/// The complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Model geometry and initialization.
    pub model: ModelConfig,
    /// Transition bounds enforced by replay.
    pub parser: ParserConfig,
    /// Objective tuning.
    pub objective: ObjectiveOptions,
}

impl Config {
    /// Reads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads the file named by `SRPARSE_CONFIG`, falling back to defaults
    /// when the variable is unset or the file cannot be read.
    pub fn from_env() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)).unwrap_or_else(|e| {
                warn!(
                    "ignoring configuration {}: {}; using defaults",
                    Path::new(&path).display(),
                    e
                );
                Config::default()
            }),
            None => Config::default(),
        }
    }
}

// --- Model Configuration ---

/// Sizes and seed used when a fresh model is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hidden layer size.
    pub hidden: usize,
    /// Word embedding size.
    pub embedding: usize,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            hidden: 64,
            embedding: 32,
            seed: 1,
        }
    }
}

// --- Parser Configuration ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Longest chain of consecutive UNARY transitions accepted by replay.
    pub unary_limit: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig { unary_limit: 3 }
    }
}
