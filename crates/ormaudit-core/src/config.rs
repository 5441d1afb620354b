//! Interceptor and mapper configuration.

use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration for the lifecycle interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorConfig {
    /// Check `read` before every query.
    pub enforce_read_permissions: bool,

    /// Check `create`/`update`/`delete` before the row write.
    pub enforce_write_permissions: bool,

    /// Write the audit trail.
    pub audit_enabled: bool,

    /// Storage names never audited.
    pub excluded_entities: BTreeSet<String>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            enforce_read_permissions: true,
            enforce_write_permissions: false,
            audit_enabled: true,
            excluded_entities: BTreeSet::new(),
        }
    }
}

impl InterceptorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip read checks.
    pub fn without_read_enforcement(mut self) -> Self {
        self.enforce_read_permissions = false;
        self
    }

    /// Check write verbs before each write.
    pub fn with_write_enforcement(mut self) -> Self {
        self.enforce_write_permissions = true;
        self
    }

    /// Disable the audit trail.
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Never audit the entity stored as `storage_name`.
    pub fn exclude_entity(mut self, storage_name: impl Into<String>) -> Self {
        self.excluded_entities.insert(storage_name.into());
        self
    }

    /// Check whether writes to `storage_name` are audited.
    pub fn is_audited(&self, storage_name: &str) -> bool {
        self.audit_enabled && !self.excluded_entities.contains(storage_name)
    }
}

/// Configuration for the mapping layer.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Interceptor settings.
    pub interceptor: InterceptorConfig,

    /// Turn on `PRAGMA foreign_keys` for every session.
    pub foreign_keys: bool,

    /// SQLite busy timeout. None leaves the connection default.
    pub busy_timeout: Option<Duration>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            interceptor: InterceptorConfig::default(),
            foreign_keys: true,
            busy_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl MapperConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interceptor configuration.
    pub fn with_interceptor(mut self, interceptor: InterceptorConfig) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Leave foreign key enforcement off.
    pub fn without_foreign_keys(mut self) -> Self {
        self.foreign_keys = false;
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interceptor_defaults() {
        let config = InterceptorConfig::default();
        assert!(config.enforce_read_permissions);
        assert!(!config.enforce_write_permissions);
        assert!(config.is_audited("demo_model"));
    }

    #[test]
    fn test_excluded_entities() {
        let config = InterceptorConfig::new().exclude_entity("session_token");
        assert!(!config.is_audited("session_token"));
        assert!(config.is_audited("demo_model"));

        let config = InterceptorConfig::new().without_audit();
        assert!(!config.is_audited("demo_model"));
    }

    #[test]
    fn test_mapper_config_builder() {
        let config = MapperConfig::new()
            .with_interceptor(InterceptorConfig::new().with_write_enforcement())
            .without_foreign_keys()
            .with_busy_timeout(Duration::from_millis(250));

        assert!(config.interceptor.enforce_write_permissions);
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout, Some(Duration::from_millis(250)));
    }
}
