//! Configuration for the request cache and the interceptor.
//!
//! Both types deserialize from YAML or JSON with every field optional:
//!
//! ```
//! use stowaway::config::CacheConfig;
//!
//! let config: CacheConfig = serde_json::from_str(r#"{
//!     "instance_name": "tiles",
//!     "debug": { "hits": true }
//! }"#).unwrap();
//! assert_eq!(config.instance_name.as_deref(), Some("tiles"));
//! assert!(config.debug.hits);
//! assert!(!config.debug.puts);
//! ```

use serde::{Deserialize, Serialize};

/// Description passed to the store provider for named instances.
pub const DEFAULT_INSTANCE_DESCRIPTION: &str = "stowaway request cache";

/// Request cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use an exclusive store instance with this name.
    ///
    /// Without it the cache shares the provider's global store, and flushing
    /// only removes the keys the cache owns.
    pub instance_name: Option<String>,
    /// Human-readable description of the named instance.
    pub instance_description: String,
    /// Prefix of every key the cache writes; also claims existing keys
    /// starting with it as owned.
    pub key_prefix: String,
    /// Diagnostic switches.
    pub debug: CacheDebug,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            instance_name: None,
            instance_description: DEFAULT_INSTANCE_DESCRIPTION.to_owned(),
            key_prefix: String::new(),
            debug: CacheDebug::default(),
        }
    }
}

impl CacheConfig {
    /// Sets the exclusive instance name.
    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = Some(name.into());
        self
    }

    /// Sets the key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the diagnostic switches.
    pub fn debug(mut self, debug: CacheDebug) -> Self {
        self.debug = debug;
        self
    }
}

/// Which cache operations emit `debug` events. Never affects behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDebug {
    /// Log every write.
    pub puts: bool,
    /// Log every hit.
    pub hits: bool,
    /// Log every miss.
    pub misses: bool,
    /// Log every key found by the startup scan.
    pub boot: bool,
}

impl CacheDebug {
    /// Everything on.
    pub fn all() -> Self {
        Self {
            puts: true,
            hits: true,
            misses: true,
            boot: true,
        }
    }
}

/// Interceptor configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Rewrite an entry with a fresh capture time whenever it is served.
    ///
    /// The write is fire-and-forget and nothing reads the timestamp back.
    pub refresh_on_hit: bool,
    /// Diagnostic switches.
    pub debug: InterceptorDebug,
}

/// Which interceptor activity emits `debug` events. Never affects behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorDebug {
    /// Log `open` and `send` calls.
    pub methods: bool,
    /// Log cache decisions.
    pub cache: bool,
    /// Log transport events.
    pub events: bool,
}
