//! Command-line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use cnames_core::config::{CacheConfig, ProbeConfig, RegistryConfig, RobotConfig};
use cnames_probe_http::DEFAULT_REGISTRY_URL;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cnames-robot")]
#[command(version, about = "Maintenance robot for a CNAME registry file", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Registry domain
    #[arg(long, global = true, env = "CNAMES_DOMAIN", default_value = "js.org")]
    pub domain: String,

    /// Cache store type
    #[arg(long, global = true, env = "CNAMES_CACHE_TYPE", value_enum, default_value_t = CacheType::File)]
    pub cache_type: CacheType,

    /// Directory for the file cache store
    #[arg(long, global = true, env = "CNAMES_CACHE_DIR", default_value = "cache")]
    pub cache_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CNAMES_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CacheType {
    File,
    Memory,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that a registry file is in canonical form
    Validate {
        /// Registry file to check
        file: PathBuf,

        /// Rewrite the file in canonical form instead of reporting
        #[arg(long)]
        fix: bool,
    },

    /// Print a registry file in canonical form
    Generate {
        /// Registry file to regenerate
        file: PathBuf,

        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test every entry over HTTP and HTTPS and report the failures
    Probe {
        /// Local registry file
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Fetch the registry file from a URL (cached between runs)
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_REGISTRY_URL)]
        url: Option<String>,

        /// Write the `{failed, passed}` report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-request timeout in seconds
        #[arg(long, env = "CNAMES_PROBE_TIMEOUT_SECS", default_value_t = 5)]
        timeout_secs: u64,

        /// Stop after this many entries
        #[arg(long, env = "CNAMES_PROBE_LIMIT")]
        limit: Option<usize>,

        /// Body text that marks a hosting placeholder page (repeatable)
        #[arg(long = "placeholder")]
        placeholders: Vec<String>,

        /// Accept any content type
        #[arg(long)]
        no_content_type_check: bool,

        /// Ignore meta refresh tags
        #[arg(long)]
        no_meta_refresh_check: bool,

        /// Drop the checkpoint and cached registry file once the report is written
        #[arg(long)]
        clear_cache: bool,
    },

    /// Delete the probe checkpoint and the cached registry file
    ClearCache,
}

impl Cli {
    /// Assemble the robot configuration from the parsed arguments
    pub fn robot_config(&self) -> RobotConfig {
        let cache = match self.cache_type {
            CacheType::File => CacheConfig::File {
                dir: self.cache_dir.clone(),
            },
            CacheType::Memory => CacheConfig::Memory,
        };

        let mut probe = ProbeConfig::default();
        if let Command::Probe {
            timeout_secs,
            limit,
            placeholders,
            no_content_type_check,
            no_meta_refresh_check,
            ..
        } = &self.command
        {
            probe.timeout_secs = *timeout_secs;
            probe.limit = *limit;
            probe.placeholder_markers = placeholders.clone();
            probe.check_content_type = !no_content_type_check;
            probe.check_meta_refresh = !no_meta_refresh_check;
        }

        RobotConfig {
            registry: RegistryConfig {
                domain: self.domain.clone(),
            },
            probe,
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_args() {
        let cli = Cli::try_parse_from(["cnames-robot", "validate", "cnames_active.js", "--fix"])
            .unwrap();
        match cli.command {
            Command::Validate { file, fix } => {
                assert_eq!(file, PathBuf::from("cnames_active.js"));
                assert!(fix);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.domain, "js.org");
    }

    #[test]
    fn test_probe_url_defaults_to_registry() {
        let cli = Cli::try_parse_from(["cnames-robot", "probe", "--url"]).unwrap();
        match &cli.command {
            Command::Probe { file, url, .. } => {
                assert!(file.is_none());
                assert_eq!(url.as_deref(), Some(DEFAULT_REGISTRY_URL));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_probe_requires_a_source() {
        assert!(Cli::try_parse_from(["cnames-robot", "probe"]).is_err());
        assert!(
            Cli::try_parse_from(["cnames-robot", "probe", "a.js", "--url", "https://x/y.js"])
                .is_err()
        );
    }

    #[test]
    fn test_probe_config() {
        let cli = Cli::try_parse_from([
            "cnames-robot",
            "--cache-type",
            "memory",
            "probe",
            "cnames_active.js",
            "--limit",
            "10",
            "--timeout-secs",
            "2",
            "--placeholder",
            "There isn't a GitHub Pages site here",
            "--no-meta-refresh-check",
        ])
        .unwrap();

        let config = cli.robot_config();
        assert!(matches!(config.cache, CacheConfig::Memory));
        assert_eq!(config.probe.limit, Some(10));
        assert_eq!(config.probe.timeout_secs, 2);
        assert_eq!(config.probe.placeholder_markers.len(), 1);
        assert!(config.probe.check_content_type);
        assert!(!config.probe.check_meta_refresh);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_other_commands_use_default_probe_settings() {
        let cli = Cli::try_parse_from(["cnames-robot", "clear-cache", "--cache-dir", "/tmp/c"])
            .unwrap();
        let config = cli.robot_config();
        assert_eq!(config.probe.timeout_secs, 5);
        assert!(matches!(config.cache, CacheConfig::File { ref dir } if dir == "/tmp/c"));
    }
}
