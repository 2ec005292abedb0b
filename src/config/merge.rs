//! Configuration merging utilities
//!
//! This module provides functions to merge configuration from files
//! with command-line arguments, where CLI arguments take precedence.

use super::args::GlobalArgs;
use super::file::ConfigFile;

/// Merge configuration file values with CLI arguments.
/// CLI arguments take precedence over config file values.
/// Only applies config file values where the CLI left a setting unset.
pub fn merge_config_with_args(mut args: GlobalArgs, config: &ConfigFile) -> GlobalArgs {
    macro_rules! apply_option {
        ($field:ident, $config_val:expr) => {
            if args.$field.is_none() {
                if let Some(val) = $config_val.clone() {
                    args.$field = Some(val);
                }
            }
        };
    }

    // Dataset section
    apply_option!(base_url, config.dataset.base_url);
    apply_option!(dataset_path, config.dataset.dataset_path);
    apply_option!(metadata_path, config.dataset.metadata_path);

    // Cache section
    apply_option!(cache_dir, config.cache.dir);
    if !args.no_durable_cache && config.cache.durable == Some(false) {
        args.no_durable_cache = true;
    }

    // Engine section
    apply_option!(engine_threads, config.engine.threads);

    // Log section
    apply_option!(log_level, config.log.level);

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_merge_with_empty_config() {
        let args = GlobalArgs::default();
        let merged = merge_config_with_args(args.clone(), &ConfigFile::default());
        assert_eq!(merged, args);
    }

    #[test]
    fn test_merge_fills_unset_fields() {
        let mut config = ConfigFile::default();
        config.dataset.base_url = Some("https://example.com/demo/".to_string());
        config.cache.dir = Some(PathBuf::from("/custom/cache"));
        config.cache.durable = Some(false);
        config.engine.threads = Some(2);
        config.log.level = Some("debug".to_string());

        let merged = merge_config_with_args(GlobalArgs::default(), &config);

        assert_eq!(merged.base_url.as_deref(), Some("https://example.com/demo/"));
        assert_eq!(merged.cache_dir, Some(PathBuf::from("/custom/cache")));
        assert!(merged.no_durable_cache);
        assert_eq!(merged.engine_threads, Some(2));
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_takes_precedence_over_config() {
        let args = GlobalArgs {
            base_url: Some("http://127.0.0.1:8080/".to_string()),
            log_level: Some("warn".to_string()),
            engine_threads: Some(1),
            ..Default::default()
        };

        let mut config = ConfigFile::default();
        config.dataset.base_url = Some("https://example.com/".to_string());
        config.log.level = Some("debug".to_string());
        config.engine.threads = Some(8);

        let merged = merge_config_with_args(args, &config);

        assert_eq!(merged.base_url.as_deref(), Some("http://127.0.0.1:8080/"));
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert_eq!(merged.engine_threads, Some(1));
    }

    #[test]
    fn test_durable_true_in_file_does_not_override_cli_opt_out() {
        let args = GlobalArgs {
            no_durable_cache: true,
            ..Default::default()
        };
        let mut config = ConfigFile::default();
        config.cache.durable = Some(true);

        assert!(merge_config_with_args(args, &config).no_durable_cache);
    }
}
