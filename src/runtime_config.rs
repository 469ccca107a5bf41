//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the dispatch runtime.
//!
//! ## Environment Variables
//!
//! ### `BRRTMUX_STACK_SIZE`
//!
//! Stack size for the coroutines the task engine fans out to. Accepts decimal (`65536`)
//! or hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! Task bodies usually do real work (parsing, serialization, talking to stores), so the
//! default is larger than a bare request handler would need. Total virtual memory is
//! roughly `stack_size × concurrently running tasks`.
//!
//! ### `BRRTMUX_SLOW_MATCH_US`
//!
//! Route matching slower than this many microseconds is logged at `warn`. Default: `1000`.
//!
//! ### `BRRTMUX_TASK_TTL_MS`
//!
//! Memo TTL for task contexts created by the routers. `0` disables expiry, which is the
//! default: a context normally lives for a single request anyway.
//!
//! ## Usage
//!
//! ```rust
//! use brrtmux::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```
//!
//! ```bash
//! export BRRTMUX_STACK_SIZE=0x20000
//! export BRRTMUX_SLOW_MATCH_US=250
//! ```

use std::env;
use std::time::Duration;

const DEFAULT_STACK_SIZE: usize = 0x10000;
const DEFAULT_SLOW_MATCH_US: u64 = 1000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for fan-out coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
    /// Threshold above which a route match is reported as slow
    pub slow_match_threshold: Duration,
    /// Memo TTL for router-created task contexts; `None` disables expiry
    pub task_ttl: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            slow_match_threshold: Duration::from_micros(DEFAULT_SLOW_MATCH_US),
            task_ttl: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let stack_size = lookup("BRRTMUX_STACK_SIZE")
            .and_then(|v| parse_number(&v))
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_STACK_SIZE);
        let slow_match_us = lookup("BRRTMUX_SLOW_MATCH_US")
            .and_then(|v| parse_number(&v))
            .unwrap_or(DEFAULT_SLOW_MATCH_US);
        let task_ttl = lookup("BRRTMUX_TASK_TTL_MS")
            .and_then(|v| parse_number(&v))
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        RuntimeConfig {
            stack_size,
            slow_match_threshold: Duration::from_micros(slow_match_us),
            task_ttl,
        }
    }
}

fn parse_number(val: &str) -> Option<u64> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}
