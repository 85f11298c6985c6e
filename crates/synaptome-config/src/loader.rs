// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, SynaptomeConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "synaptome.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `SYNAPTOME_CONFIG_PATH` environment variable
/// 2. Current working directory: `./synaptome.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SYNAPTOME_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SYNAPTOME_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SYNAPTOME_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SynaptomeConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SynaptomeConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SYNAPTOME_NUM_RANKS` -> `kernel.num_ranks`
/// - `SYNAPTOME_THREADS_PER_RANK` -> `kernel.threads_per_rank`
/// - `SYNAPTOME_RNG_SEED` -> `kernel.rng_seed`
/// - `SYNAPTOME_RESOLUTION` -> `kernel.resolution`
/// - `SYNAPTOME_LOG_LEVEL` -> `logging.level`
///
/// A value that does not parse is an error rather than being skipped.
pub fn apply_environment_overrides(config: &mut SynaptomeConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("SYNAPTOME_NUM_RANKS") {
        config.kernel.num_ranks = parse_value("SYNAPTOME_NUM_RANKS", &value)?;
    }
    if let Ok(value) = env::var("SYNAPTOME_THREADS_PER_RANK") {
        config.kernel.threads_per_rank = parse_value("SYNAPTOME_THREADS_PER_RANK", &value)?;
    }
    if let Ok(value) = env::var("SYNAPTOME_RNG_SEED") {
        config.kernel.rng_seed = parse_value("SYNAPTOME_RNG_SEED", &value)?;
    }
    if let Ok(value) = env::var("SYNAPTOME_RESOLUTION") {
        config.kernel.resolution = parse_value("SYNAPTOME_RESOLUTION", &value)?;
    }
    if let Ok(value) = env::var("SYNAPTOME_LOG_LEVEL") {
        config.logging.level = value.to_lowercase();
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"threads": "4", "seed": "12"}`)
pub fn apply_cli_overrides(
    config: &mut SynaptomeConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("ranks") {
        config.kernel.num_ranks = parse_value("ranks", value)?;
    }
    if let Some(value) = cli_args.get("threads") {
        config.kernel.threads_per_rank = parse_value("threads", value)?;
    }
    if let Some(value) = cli_args.get("seed") {
        config.kernel.rng_seed = parse_value("seed", value)?;
    }
    if let Some(value) = cli_args.get("resolution") {
        config.kernel.resolution = parse_value("resolution", value)?;
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.to_lowercase();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogFormat, LoggingConfig};
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: &[&str] = &[
        "SYNAPTOME_NUM_RANKS",
        "SYNAPTOME_THREADS_PER_RANK",
        "SYNAPTOME_RNG_SEED",
        "SYNAPTOME_RESOLUTION",
        "SYNAPTOME_LOG_LEVEL",
    ];

    fn clear_override_vars() {
        for var in OVERRIDE_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("SYNAPTOME_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("SYNAPTOME_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("SYNAPTOME_CONFIG_PATH", "/definitely/not/here/synaptome.toml");
        let result = find_config_file();
        env::remove_var("SYNAPTOME_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[kernel]").unwrap();
        writeln!(file, "threads_per_rank = 4").unwrap();
        writeln!(file, "rng_seed = 12").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.kernel.threads_per_rank, 4);
        assert_eq!(config.kernel.num_ranks, 1);
        assert_eq!(config.kernel.rng_seed, 12);
        assert_eq!(config.connectivity.default_synapse_model, "static_synapse");
    }

    #[test]
    fn test_load_logging_section() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "level = \"debug\"").unwrap();
        writeln!(file, "format = \"json\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.retention_runs, LoggingConfig::default().retention_runs);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[kernel]").unwrap();
        writeln!(file, "resolution = -1.0").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = SynaptomeConfig::default();

        env::set_var("SYNAPTOME_THREADS_PER_RANK", "3");
        env::set_var("SYNAPTOME_RNG_SEED", "777");

        let result = apply_environment_overrides(&mut config);
        clear_override_vars();

        result.unwrap();
        assert_eq!(config.kernel.threads_per_rank, 3);
        assert_eq!(config.kernel.rng_seed, 777);
    }

    #[test]
    fn test_environment_override_parse_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = SynaptomeConfig::default();

        env::set_var("SYNAPTOME_NUM_RANKS", "four");
        let result = apply_environment_overrides(&mut config);
        clear_override_vars();

        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = SynaptomeConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("ranks".to_string(), "2".to_string());
        cli_args.insert("resolution".to_string(), "0.25".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.kernel.num_ranks, 2);
        assert_eq!(config.kernel.resolution, 0.25);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[kernel]").unwrap();
        writeln!(file, "threads_per_rank = 1").unwrap();
        writeln!(file, "rng_seed = 1").unwrap();

        env::set_var("SYNAPTOME_THREADS_PER_RANK", "2");
        env::set_var("SYNAPTOME_RNG_SEED", "2");

        let mut cli_args = HashMap::new();
        cli_args.insert("threads".to_string(), "8".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));
        clear_override_vars();
        let config = config.unwrap();

        // CLI wins for threads, env wins for seed (no CLI override)
        assert_eq!(config.kernel.threads_per_rank, 8);
        assert_eq!(config.kernel.rng_seed, 2);
    }
}
