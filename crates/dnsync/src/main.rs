// # dnsync - one-shot DNS updater
//
// Thin integration layer: all reconciliation logic lives in dnsync-core.
//
// The binary is responsible for:
// 1. Reading its settings from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and detectors
// 4. Running one reconciliation pass and mapping the outcome to an exit code
//
// It is meant to be started periodically (cron, systemd timer).
//
// ## Environment
//
// - `DNSYNC_CONFIG`: path to the JSON configuration (default `/etc/dnsync/config.json`)
// - `DNSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `DNSYNC_MODE`: `live` or `dry-run`; dry-run reconciles and logs but never pushes
//
// ## Example
//
// ```bash
// export DNSYNC_CONFIG=/etc/dnsync/config.json
// export DNSYNC_MODE=dry-run
//
// dnsync
// ```

use anyhow::{Context, Result};
use dnsync_core::{DdnsConfig, DdnsEngine, ProviderRegistry, RunReport};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CONFIG_PATH: &str = "/etc/dnsync/config.json";

/// Exit codes for the possible run outcomes
///
/// Failed pushes of individual records do not change the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsyncExitCode {
    /// The run completed
    Success = 0,
    /// Settings or configuration invalid, nothing was touched
    ConfigError = 1,
    /// Address detection or the runtime failed
    RuntimeError = 2,
}

impl From<DnsyncExitCode> for ExitCode {
    fn from(code: DnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process settings taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    config_path: PathBuf,
    log_level: String,
    dry_run: bool,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = lookup("DNSYNC_MODE").unwrap_or_else(|| "live".to_string());
        let dry_run = match mode.to_lowercase().as_str() {
            "dry-run" => true,
            "live" | "" => false,
            other => anyhow::bail!(
                "DNSYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        let settings = Self {
            config_path: lookup("DNSYNC_CONFIG")
                .filter(|path| !path.is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
                .into(),
            log_level: lookup("DNSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dry_run,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "DNSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }
        Ok(())
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Exit code for an error returned by [`run`]
fn exit_code_for(error: &anyhow::Error) -> DnsyncExitCode {
    match error.downcast_ref::<dnsync_core::Error>() {
        Some(dnsync_core::Error::Config(_)) => DnsyncExitCode::ConfigError,
        _ => DnsyncExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    let log_level = parse_level(&settings.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    info!("Starting dnsync");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(&settings).await {
            Ok(report) => {
                if report.push.failed > 0 || report.failed > 0 || report.anomalies > 0 {
                    warn!(
                        "Run finished with {} failed record(s), {} anomalie(s) and {} failed push(es)",
                        report.failed, report.anomalies, report.push.failed
                    );
                }
                DnsyncExitCode::Success
            }
            Err(e) => {
                error!("Run aborted: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Build the registry, load the configuration and run once
async fn run(settings: &Settings) -> Result<RunReport> {
    let mut config = DdnsConfig::load(&settings.config_path)
        .await
        .with_context(|| format!("Failed to load {}", settings.config_path.display()))?;

    if settings.dry_run {
        config.dry_run = true;
    }
    if config.dry_run {
        warn!("Running in DRY-RUN mode - no records will be pushed");
    }

    info!(
        "Configuration loaded: {} module(s), {} domain(s)",
        config.modules.len(),
        config.domains.len()
    );

    let registry = ProviderRegistry::with_builtins();

    #[cfg(feature = "dyndns")]
    {
        info!("Registering DynDNS and IPv64 providers");
        dnsync_provider_dyndns::register(&registry);
    }

    #[cfg(feature = "api")]
    {
        info!("Registering API detector");
        dnsync_ip_api::register(&registry);
    }

    #[cfg(feature = "netlink")]
    {
        info!("Registering local interface detector");
        dnsync_ip_netlink::register(&registry);
    }

    let mut engine = DdnsEngine::from_registry(config, &registry).await?;
    let report = engine.run_once().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(settings.log_level, "info");
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_dry_run_mode() {
        let settings = settings(&[("DNSYNC_MODE", "DRY-RUN"), ("DNSYNC_CONFIG", "/tmp/c.json")]).unwrap();
        assert!(settings.dry_run);
        assert_eq!(settings.config_path, PathBuf::from("/tmp/c.json"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(settings(&[("DNSYNC_MODE", "sometimes")]).is_err());
        assert!(settings(&[("DNSYNC_LOG_LEVEL", "loud")]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let config = anyhow::Error::from(dnsync_core::Error::config("no domains"));
        assert_eq!(exit_code_for(&config), DnsyncExitCode::ConfigError);

        let detection = anyhow::Error::from(dnsync_core::Error::address_detection("offline"));
        assert_eq!(exit_code_for(&detection), DnsyncExitCode::RuntimeError);

        let wrapped = anyhow::Error::from(dnsync_core::Error::config("bad json")).context("Failed to load");
        assert_eq!(exit_code_for(&wrapped), DnsyncExitCode::ConfigError);
    }

    #[tokio::test]
    async fn test_missing_config_file_is_config_error() {
        let settings = settings(&[("DNSYNC_CONFIG", "/nonexistent/dnsync.json")]).unwrap();
        let err = run(&settings).await.unwrap_err();
        assert_eq!(exit_code_for(&err), DnsyncExitCode::ConfigError);
    }
}
