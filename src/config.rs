//! Configuration for a [`Cssom`](crate::sheet::Cssom) arena.

use crate::sheet::security::CorsMode;

/// Defaults applied to sheets created by a [`Cssom`](crate::sheet::Cssom).
#[derive(Debug, Clone)]
pub struct CssomConfig {
    /// CORS mode given to sheets created without an explicit one.
    pub default_cors_mode: CorsMode,
    /// Deepest `@import` nesting that still gets a child sheet and a load request.
    pub max_import_depth: usize,
    /// Whether full sheet parses under the system principal may use privileged rules.
    pub allow_unsafe_rules_for_system: bool,
}

impl Default for CssomConfig {
    fn default() -> Self {
        Self {
            default_cors_mode: CorsMode::None,
            max_import_depth: 16,
            allow_unsafe_rules_for_system: true,
        }
    }
}

impl CssomConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default CORS mode (builder).
    pub fn with_cors_mode(mut self, mode: CorsMode) -> Self {
        self.default_cors_mode = mode;
        self
    }

    /// Set the maximum `@import` depth (builder).
    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    /// Toggle privileged rules for system-principal sheets (builder).
    pub fn with_unsafe_rules_for_system(mut self, allow: bool) -> Self {
        self.allow_unsafe_rules_for_system = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CssomConfig::new();
        assert_eq!(config.default_cors_mode, CorsMode::None);
        assert_eq!(config.max_import_depth, 16);
        assert!(config.allow_unsafe_rules_for_system);
    }

    #[test]
    fn builders_chain() {
        let config = CssomConfig::new()
            .with_cors_mode(CorsMode::Anonymous)
            .with_max_import_depth(2)
            .with_unsafe_rules_for_system(false);
        assert_eq!(config.default_cors_mode, CorsMode::Anonymous);
        assert_eq!(config.max_import_depth, 2);
        assert!(!config.allow_unsafe_rules_for_system);
    }
}
