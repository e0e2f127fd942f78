//! Configuration management with serde serialization/deserialization
//!
//! All knobs for a run live in one explicit [`Config`] value constructed at
//! startup (defaults, optional JSON file, CLI overrides) and passed by
//! reference into the discoverer, the session pool, and the worker pool.

use crate::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a capture run
///
/// # Examples
///
/// ```rust
/// use torsnap::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     pool_size: 5,
///     worker_count: 5,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// SOCKS proxy endpoint all traffic to onion addresses goes through
    pub proxy: ProxySettings,

    /// Run browser sessions without visible UI rendering (default: false)
    pub headless: bool,

    /// Maximum number of discovered links turned into capture tasks
    /// (default: 10)
    ///
    /// A hard cap on queue size, not a rate limit; links past the cap are
    /// ignored entirely.
    pub limit: usize,

    /// Number of browser sessions kept in the pool (default: 3)
    ///
    /// Each session is a full Chromium instance; higher values increase
    /// concurrency but consume considerably more memory.
    pub pool_size: usize,

    /// Number of capture workers draining the task queue (default: 3)
    pub worker_count: usize,

    /// Log each skipped onion with its reason (default: false)
    pub log_skipped: bool,

    /// Which onion-address format candidates must match (default: legacy)
    pub onion_format: OnionFormat,

    /// Root directory for screenshot artifacts; a per-seed subdirectory is
    /// created under it
    pub output_root: PathBuf,

    /// Deadline for fetching the seed page through the proxy
    /// (default: 90 seconds)
    pub fetch_timeout: Duration,

    /// Deadline for a session to load one onion page (default: 120 seconds)
    ///
    /// Onion services routinely take tens of seconds to respond; keep this
    /// generous.
    pub navigation_timeout: Duration,

    /// Deadline for rendering and saving one full-page screenshot
    /// (default: 60 seconds)
    pub render_timeout: Duration,

    /// Path to the Chromium executable (default: auto-detect)
    pub browser_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: ProxySettings::default(),
            headless: false,
            limit: 10,
            pool_size: 3,
            worker_count: 3,
            log_skipped: false,
            onion_format: OnionFormat::Legacy,
            output_root: default_output_root(),
            fetch_timeout: Duration::from_secs(90),
            navigation_timeout: Duration::from_secs(120),
            render_timeout: Duration::from_secs(60),
            browser_path: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.pool_size == 0 {
            return Err(CaptureError::Configuration(
                "session pool size must be greater than 0".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(CaptureError::Configuration(
                "worker count must be greater than 0".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(CaptureError::Configuration(
                "capture limit must be greater than 0".to_string(),
            ));
        }
        if self.proxy.host.is_empty() {
            return Err(CaptureError::Configuration(
                "proxy host must not be empty".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero()
            || self.navigation_timeout.is_zero()
            || self.render_timeout.is_zero()
        {
            return Err(CaptureError::Configuration(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_output_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("torsnap")
}

/// SOCKS proxy endpoint, read once at startup and immutable for the run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,

    /// SOCKS protocol version, 4 or 5 (default: 5)
    pub version: u8,

    /// Resolve DNS through the proxy instead of locally (default: true)
    ///
    /// Local resolution of .onion names would both fail and leak the lookup.
    pub remote_dns: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9050,
            version: 5,
            remote_dns: true,
        }
    }
}

impl ProxySettings {
    pub fn scheme(&self) -> &'static str {
        if self.version == 4 {
            "socks4"
        } else {
            "socks5"
        }
    }

    /// Proxy URL for the discovery HTTP client. The `socks5h` scheme routes
    /// DNS through the proxy.
    pub fn fetch_url(&self) -> String {
        let scheme = if self.remote_dns && self.version != 4 {
            "socks5h"
        } else {
            self.scheme()
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Proxy URL passed to Chromium's `--proxy-server` switch.
    pub fn browser_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }
}

/// Which syntactic shape a candidate onion address must have
///
/// The validation rule is versioned rather than hard-coded: `Legacy` accepts
/// the permissive 54-plus-character form, `V3` only the exact 56-character
/// labels current hidden services use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnionFormat {
    /// 54 or more base32 characters followed by a literal `d`
    Legacy,
    /// Exactly 56 base32 characters, the last of which is `d`
    V3,
}

impl OnionFormat {
    /// Regex fragment matching the address label for this format.
    pub fn label_pattern(&self) -> &'static str {
        match self {
            OnionFormat::Legacy => r"[a-z2-7]{54,}d",
            OnionFormat::V3 => r"[a-z2-7]{55}d",
        }
    }
}

/// Build the Chromium launch configuration shared by every pooled session.
///
/// All sessions are configured identically: same proxy, same DNS policy,
/// same headless flag.
pub fn build_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, CaptureError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .request_timeout(config.navigation_timeout)
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg(format!("--proxy-server={}", config.proxy.browser_url()));

    if config.proxy.remote_dns {
        // Every lookup must stay inside the proxy; .onion names do not
        // resolve in public DNS.
        builder = builder.arg("--host-resolver-rules=MAP * ~NOTFOUND , EXCLUDE 127.0.0.1");
    }

    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(browser_path) = &config.browser_path {
        builder = builder.chrome_executable(browser_path);
    }

    builder.build().map_err(CaptureError::SessionInit)
}
