//! Session configuration
//!
//! A flat property store with dotted keys (`connection.host`,
//! `break.count`, ...) holding string, integer and boolean values, with
//! defaults, typed accessors and JSON persistence. Command line flags are
//! applied on top of whatever was loaded.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keyboard::{DEFAULT_BREAK_COUNT, DEFAULT_BREAK_TIMER};
use crate::session::BLOCK_MODE_TERM_TYPE;
use crate::session_log::LogMask;
use crate::translation::TableMode;
use crate::transport::ConnectionKind;
use crate::vt::codes::VT_MAX_BUFFER;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "VT3KR_CONFIG";

/// Supported configuration value types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    properties: HashMap<String, ConfigValue>,
    config_resource: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl SessionConfig {
    pub fn new(config_resource: String) -> Self {
        let mut config = Self {
            properties: HashMap::new(),
            config_resource,
        };
        config.set_defaults();
        config
    }

    fn set_defaults(&mut self) {
        // Connection
        self.properties.insert("connection.kind".to_string(), "vt3k".into());
        self.properties.insert("connection.host".to_string(), "".into());
        self.properties.insert("connection.rloginUser".to_string(), "".into());
        self.properties.insert("vt.bufferSize".to_string(), (VT_MAX_BUFFER as i64).into());

        // Local terminal
        self.properties.insert("terminal.type".to_string(), i64::from(BLOCK_MODE_TERM_TYPE).into());
        self.properties.insert("terminal.typeAhead".to_string(), false.into());
        self.properties.insert("terminal.eightBitNoParity".to_string(), false.into());
        self.properties.insert("terminal.disableXonXoff".to_string(), false.into());

        // Break key
        self.properties.insert("break.char".to_string(), (-1i64).into());
        self.properties.insert("break.count".to_string(), i64::from(DEFAULT_BREAK_COUNT).into());
        self.properties.insert("break.timerSeconds".to_string(), (DEFAULT_BREAK_TIMER.as_secs() as i64).into());

        self.properties.insert("translation.table".to_string(), "".into());
        self.properties.insert("translation.mode".to_string(), "inbound".into());

        self.properties.insert("logging.mask".to_string(), "".into());
        self.properties.insert("logging.file".to_string(), "".into());

        self.properties.insert("input.file".to_string(), "".into());
        self.properties.insert("input.stopAtEof".to_string(), false.into());
    }

    pub fn get_string_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).and_then(|v| v.as_string().map(|s| s.to_string()))
    }

    pub fn get_string_property_or(&self, key: &str, default: &str) -> String {
        self.get_string_property(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int_property(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(|v| v.as_integer())
    }

    pub fn get_int_property_or(&self, key: &str, default: i64) -> i64 {
        self.get_int_property(key).unwrap_or(default)
    }

    pub fn get_boolean_property(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(|v| v.as_boolean())
    }

    pub fn get_boolean_property_or(&self, key: &str, default: bool) -> bool {
        self.get_boolean_property(key).unwrap_or(default)
    }

    pub fn set_property<T: Into<ConfigValue>>(&mut self, key: &str, value: T) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<ConfigValue> {
        self.properties.remove(key)
    }

    pub fn get_all_keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn get_config_resource(&self) -> &str {
        &self.config_resource
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.properties)
    }

    /// Merge properties from JSON over the current ones
    pub fn from_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let loaded: HashMap<String, ConfigValue> = serde_json::from_str(json)?;
        self.properties.extend(loaded);
        Ok(())
    }

    /// Read `path`, or return defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::new(path.to_string_lossy().into_owned());
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(config);
        }
        let file_error = |error: String| ConfigError::FileError {
            path: path.display().to_string(),
            error,
        };
        let json = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        config.from_json(&json).map_err(|e| file_error(e.to_string()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write to the path the configuration was loaded from
    pub fn save(&self) -> Result<(), ConfigError> {
        if self.config_resource.is_empty() {
            return Err(ConfigError::MissingRequired { parameter: "config path".to_string() });
        }
        let path = PathBuf::from(&self.config_resource);
        let file_error = |error: String| ConfigError::FileError {
            path: self.config_resource.clone(),
            error,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| file_error(e.to_string()))?;
        }
        let json = self.to_json().map_err(|e| file_error(e.to_string()))?;
        fs::write(&path, json).map_err(|e| file_error(e.to_string()))
    }

    pub fn connection_kind(&self) -> Result<ConnectionKind, ConfigError> {
        let value = self.get_string_property_or("connection.kind", "vt3k");
        ConnectionKind::parse(&value).ok_or_else(|| invalid("connection.kind", &value, "expected vt3k, rlogin or tty"))
    }

    pub fn host(&self) -> Result<String, ConfigError> {
        let host = self.get_string_property_or("connection.host", "");
        if host.is_empty() {
            return Err(ConfigError::MissingRequired { parameter: "connection.host".to_string() });
        }
        Ok(host)
    }

    /// Explicit port; `None` means the connection kind's well-known port
    pub fn port(&self) -> Result<Option<u16>, ConfigError> {
        match self.get_int_property("connection.port") {
            None | Some(0) => Ok(None),
            Some(p) => u16::try_from(p)
                .map(Some)
                .map_err(|_| invalid("connection.port", p, "must be 1-65535")),
        }
    }

    pub fn rlogin_user(&self) -> String {
        self.get_string_property_or("connection.rloginUser", "")
    }

    /// Negotiated buffer size, clamped to what the protocol allows
    pub fn buffer_size(&self) -> usize {
        let size = self.get_int_property_or("vt.bufferSize", VT_MAX_BUFFER as i64);
        size.clamp(1, VT_MAX_BUFFER as i64) as usize
    }

    pub fn term_type(&self) -> Result<u8, ConfigError> {
        let value = self.get_int_property_or("terminal.type", i64::from(BLOCK_MODE_TERM_TYPE));
        u8::try_from(value).map_err(|_| invalid("terminal.type", value, "must be 0-255"))
    }

    /// Fixed break character; `None` follows the host's system break character
    pub fn break_char(&self) -> Result<Option<u8>, ConfigError> {
        match self.get_int_property_or("break.char", -1) {
            -1 => Ok(None),
            c => u8::try_from(c)
                .map(Some)
                .map_err(|_| invalid("break.char", c, "must be -1 or 0-255")),
        }
    }

    pub fn break_count(&self) -> Result<u32, ConfigError> {
        let value = self.get_int_property_or("break.count", i64::from(DEFAULT_BREAK_COUNT));
        match u32::try_from(value) {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(invalid("break.count", value, "must be at least 1")),
        }
    }

    pub fn break_timer(&self) -> Result<Duration, ConfigError> {
        let value = self.get_int_property_or("break.timerSeconds", DEFAULT_BREAK_TIMER.as_secs() as i64);
        u64::try_from(value)
            .map(Duration::from_secs)
            .map_err(|_| invalid("break.timerSeconds", value, "must not be negative"))
    }

    pub fn translation_table(&self) -> Option<PathBuf> {
        non_empty_path(self.get_string_property_or("translation.table", ""))
    }

    pub fn translation_mode(&self) -> Result<TableMode, ConfigError> {
        let value = self.get_string_property_or("translation.mode", "inbound");
        TableMode::parse(&value).ok_or_else(|| invalid("translation.mode", &value, "expected inbound or direct"))
    }

    pub fn log_mask(&self) -> Result<LogMask, ConfigError> {
        LogMask::parse(&self.get_string_property_or("logging.mask", ""))
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        non_empty_path(self.get_string_property_or("logging.file", ""))
    }

    pub fn input_file(&self) -> Option<PathBuf> {
        non_empty_path(self.get_string_property_or("input.file", ""))
    }

    /// Check every typed setting; the host is checked separately
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection_kind()?;
        self.port()?;
        self.term_type()?;
        self.break_char()?;
        self.break_count()?;
        self.break_timer()?;
        self.translation_mode()?;
        self.log_mask()?;
        Ok(())
    }
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Where the configuration lives:
/// 1) `VT3KR_CONFIG`
/// 2) the platform config directory, `vt3kr/session.json`
/// 3) `./session.json`
pub fn default_config_path() -> PathBuf {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    match dirs::config_dir() {
        Some(base) => base.join("vt3kr").join("session.json"),
        None => PathBuf::from("session.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SessionConfig::default();
        assert_eq!(config.connection_kind().unwrap(), ConnectionKind::ProtocolSocket);
        assert_eq!(config.port().unwrap(), None);
        assert_eq!(config.buffer_size(), 1024);
        assert_eq!(config.term_type().unwrap(), 10);
        assert_eq!(config.break_char().unwrap(), None);
        assert_eq!(config.break_count().unwrap(), 3);
        assert_eq!(config.break_timer().unwrap(), Duration::from_secs(1));
        assert_eq!(config.translation_mode().unwrap(), TableMode::InboundDefinesOutbound);
        assert!(config.log_mask().unwrap().is_empty());
        assert!(config.translation_table().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_host() {
        let config = SessionConfig::default();
        assert!(matches!(config.host(), Err(ConfigError::MissingRequired { .. })));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = SessionConfig::default();
        config.set_property("connection.kind", "telnet");
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.set_property("connection.port", 70000i64);
        assert!(config.port().is_err());

        let mut config = SessionConfig::default();
        config.set_property("break.count", 0i64);
        assert!(config.break_count().is_err());

        let mut config = SessionConfig::default();
        config.set_property("break.char", 300i64);
        assert!(config.break_char().is_err());
    }

    #[test]
    fn test_buffer_size_clamped() {
        let mut config = SessionConfig::default();
        config.set_property("vt.bufferSize", 4096i64);
        assert_eq!(config.buffer_size(), 1024);
    }

    #[test]
    fn test_json_merge_keeps_defaults() {
        let mut config = SessionConfig::default();
        config
            .from_json(r#"{"connection.host": {"String": "hp3k"}, "break.char": {"Integer": 25}}"#)
            .unwrap();
        assert_eq!(config.host().unwrap(), "hp3k");
        assert_eq!(config.break_char().unwrap(), Some(25));
        assert_eq!(config.break_count().unwrap(), 3);
    }
}
