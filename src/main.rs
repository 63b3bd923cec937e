//! disktree
//!
//! Prints every disk on the host grouped by the storage controller it is
//! attached to.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            disktree                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Privilege   │───▶│   Scanner    │───▶│   Renderer   │       │
//! │  │  + tools     │    │  (discover)  │    │  (stdout)    │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Logs go to stderr; stdout carries only the report.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use disktree::domain::BusFamily;
use disktree::hardware::{HardwareScanner, ScannerConfig};
use disktree::privilege::ensure_privileged;
use disktree::report::{render, ColorMode, OutputFormat, RenderOptions};
use disktree::{Error, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Disk-to-controller tree - groups disks by storage controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only scan one bus family
    #[arg(long, env = "DISKTREE_BUS", value_enum)]
    bus: Option<BusFamily>,

    /// Report format
    #[arg(long, env = "DISKTREE_FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// When to colour the text report
    #[arg(long, env = "DISKTREE_COLOR", value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Devices probed concurrently (default: 2 x CPU count)
    #[arg(long, env = "DISKTREE_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Timeout for each external probe in seconds
    #[arg(long, env = "DISKTREE_PROBE_TIMEOUT_SECS", default_value = "10")]
    probe_timeout_secs: u64,

    /// Root of the sysfs tree
    #[arg(long, env = "DISKTREE_SYSFS_ROOT", default_value = "/sys")]
    sysfs_root: PathBuf,

    /// Directory holding device nodes
    #[arg(long, env = "DISKTREE_DEV_ROOT", default_value = "/dev")]
    dev_root: PathBuf,

    /// Treat a missing external tool as fatal
    #[arg(long, env = "DISKTREE_STRICT")]
    strict: bool,

    /// Skip the root check (probes will return less data)
    #[arg(long, env = "DISKTREE_ALLOW_UNPRIVILEGED")]
    allow_unprivileged: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn scanner_config(&self) -> Result<ScannerConfig> {
        if self.probe_timeout_secs == 0 {
            return Err(Error::Config("--probe-timeout-secs must be at least 1".into()));
        }
        if self.max_concurrent == Some(0) {
            return Err(Error::Config("--max-concurrent must be at least 1".into()));
        }

        let defaults = ScannerConfig::default();
        Ok(ScannerConfig {
            sysfs_root: self.sysfs_root.clone(),
            dev_root: self.dev_root.clone(),
            bus_filter: self.bus,
            max_concurrent: self.max_concurrent.unwrap_or(defaults.max_concurrent),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            strict_tools: self.strict,
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "disktree failed");
            eprintln!("disktree: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    if !args.allow_unprivileged {
        ensure_privileged()?;
    }

    let config = args.scanner_config()?;
    info!(
        sysfs_root = %config.sysfs_root.display(),
        bus = ?config.bus_filter,
        max_concurrent = config.max_concurrent,
        probe_timeout_secs = config.probe_timeout.as_secs(),
        "starting disktree"
    );

    let scanner = HardwareScanner::system(config);
    scanner.check_tools()?;

    let inventory = scanner.discover().await?;
    let output = render(&inventory, args.format, &RenderOptions::new(args.color))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(level, rust_log.as_deref());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// `RUST_LOG` directives when set and valid, otherwise the `--log-level`.
fn log_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(level.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["disktree"]).unwrap();
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.color, ColorMode::Auto);
        let config = args.scanner_config().unwrap();
        assert_eq!(config.sysfs_root, PathBuf::from("/sys"));
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.bus_filter, None);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "disktree",
            "--bus",
            "nvme",
            "--format",
            "json",
            "--color",
            "never",
            "--max-concurrent",
            "3",
            "--sysfs-root",
            "/tmp/sys",
            "--strict",
        ])
        .unwrap();
        let config = args.scanner_config().unwrap();
        assert_eq!(config.bus_filter, Some(BusFamily::Nvme));
        assert_eq!(config.max_concurrent, 3);
        assert!(config.strict_tools);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let args = Args::try_parse_from(["disktree", "--probe-timeout-secs", "0"]).unwrap();
        assert!(matches!(args.scanner_config(), Err(Error::Config(_))));

        let args = Args::try_parse_from(["disktree", "--max-concurrent", "0"]).unwrap();
        assert!(matches!(args.scanner_config(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rust_log_overrides_level() {
        let filter = log_filter(Level::WARN, Some("debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = log_filter(Level::WARN, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        let filter = log_filter(Level::INFO, Some("  "));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
