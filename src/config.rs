use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{mb_to_bytes, DEFAULT_MAX_UPLOAD_MB, MAX_UPLOAD_MB_LIMIT};

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_port() -> u16 {
    3000
}

fn default_max_upload_mb() -> u64 {
    DEFAULT_MAX_UPLOAD_MB
}

/// Gallery server configuration file structure
///
/// Every key is optional:
/// ```toml
/// public_dir = "public"
/// port = 3000
/// upload_enabled = false
/// max_upload_mb = 100
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryConfig {
    /// Directory served statically; uploads live in its `uploads/` subdirectory (default: public)
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    /// HTTP port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Accept uploads through the API (default: false, media is added by the administrator)
    #[serde(default)]
    pub upload_enabled: bool,
    /// Largest accepted upload in megabytes (default: 100)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            port: default_port(),
            upload_enabled: false,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl GalleryConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: GalleryConfig =
            toml::from_str(content).map_err(|e| format!("Invalid config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.public_dir.as_os_str().is_empty() {
            return Err("public_dir must not be empty".to_string());
        }
        if self.max_upload_mb == 0 {
            return Err("max_upload_mb must be greater than 0".to_string());
        }
        if self.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(format!(
                "max_upload_mb must be at most {}, got {}",
                MAX_UPLOAD_MB_LIMIT, self.max_upload_mb
            ));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        mb_to_bytes(self.max_upload_mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GalleryConfig::from_toml("").unwrap();
        assert_eq!(config, GalleryConfig::default());
        assert_eq!(config.public_dir, PathBuf::from("public"));
        assert_eq!(config.port, 3000);
        assert!(!config.upload_enabled);
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_full_config() {
        let config = GalleryConfig::from_toml(
            r#"
            public_dir = "/srv/memorial"
            port = 8080
            upload_enabled = true
            max_upload_mb = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.public_dir, PathBuf::from("/srv/memorial"));
        assert_eq!(config.port, 8080);
        assert!(config.upload_enabled);
        assert_eq!(config.max_upload_mb, 25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(GalleryConfig::from_toml("max_upload_mb = 0").is_err());
        assert!(GalleryConfig::from_toml("public_dir = \"\"").is_err());
        assert!(GalleryConfig::from_toml("unknown_key = 1").is_err());
    }

    #[test]
    fn test_upload_limit_must_fit_in_bytes() {
        let err = GalleryConfig::from_toml("max_upload_mb = 9223372036854775807").unwrap_err();
        assert!(err.contains("max_upload_mb must be at most"));

        let limit = format!("max_upload_mb = {}", MAX_UPLOAD_MB_LIMIT);
        let config = GalleryConfig::from_toml(&limit).unwrap();
        assert_eq!(config.max_upload_bytes(), MAX_UPLOAD_MB_LIMIT * 1024 * 1024);

        // Unvalidated configs saturate instead of overflowing
        let config = GalleryConfig {
            max_upload_mb: u64::MAX,
            ..GalleryConfig::default()
        };
        assert_eq!(config.max_upload_bytes(), u64::MAX);
    }
}
