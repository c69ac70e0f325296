use std::path::PathBuf;

use photomoa_shared::calc::DEFAULT_PIXELS_PER_INCH;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is not a valid {expected}: {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Server settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    /// Built frontend served at `/`.
    pub dist_dir: PathBuf,
    /// External shot detection service. Uploads detect nothing when unset.
    pub detector_url: Option<String>,
    /// Scale used for entries that were never calibrated.
    pub default_pixels_per_inch: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 3000,
            db_path: PathBuf::from("data/photomoa.redb"),
            upload_dir: PathBuf::from("uploads"),
            dist_dir: PathBuf::from("dist"),
            detector_url: None,
            default_pixels_per_inch: DEFAULT_PIXELS_PER_INCH,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults for
    /// missing or empty keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(v) = get("PORT") {
            config.port = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                expected: "port number",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("DIST_DIR") {
            config.dist_dir = PathBuf::from(v);
        }
        config.detector_url = get("DETECTOR_URL");
        if let Some(v) = get("DEFAULT_PIXELS_PER_INCH") {
            let ppi: f64 = v.trim().parse().unwrap_or(f64::NAN);
            if ppi.is_nan() || ppi <= 0.0 || ppi.is_infinite() {
                return Err(ConfigError::Invalid {
                    key: "DEFAULT_PIXELS_PER_INCH",
                    expected: "positive number",
                    value: v,
                });
            }
            config.default_pixels_per_inch = ppi;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(config.detector_url.is_none());
        assert_eq!(config.default_pixels_per_inch, DEFAULT_PIXELS_PER_INCH);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "5001"),
            ("UPLOAD_DIR", "/srv/targets"),
            ("DETECTOR_URL", "http://detector:8000/detect"),
            ("DEFAULT_PIXELS_PER_INCH", "72.5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.upload_dir, PathBuf::from("/srv/targets"));
        assert_eq!(config.detector_url.as_deref(), Some("http://detector:8000/detect"));
        assert_eq!(config.default_pixels_per_inch, 72.5);
    }

    #[test]
    fn test_empty_detector_url_is_unset() {
        let config = Config::from_lookup(lookup(&[("DETECTOR_URL", "  ")])).unwrap();
        assert!(config.detector_url.is_none());
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_non_positive_default_scale() {
        assert!(Config::from_lookup(lookup(&[("DEFAULT_PIXELS_PER_INCH", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DEFAULT_PIXELS_PER_INCH", "abc")])).is_err());
    }
}
