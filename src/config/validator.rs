use thiserror::Error;

use crate::config::{LoggingSettings, Settings, StorageBackend, StorageSettings};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub struct SettingsValidator;

impl SettingsValidator {
    /// Check every section, collecting all problems
    pub fn validate(settings: &Settings) -> Result<(), Vec<SettingsError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_storage(&settings.storage) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_logging(&settings.logging) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_storage(storage: &StorageSettings) -> Result<(), Vec<SettingsError>> {
        let mut errors = Vec::new();

        if storage.backend == StorageBackend::File {
            if storage.path.as_os_str().is_empty() {
                errors.push(SettingsError::MissingField("storage.path".to_string()));
            } else if storage.path.is_file() {
                errors.push(SettingsError::InvalidValue {
                    field: "storage.path".to_string(),
                    reason: format!("'{}' is a file, expected a directory", storage.path.display()),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_logging(logging: &LoggingSettings) -> Result<(), Vec<SettingsError>> {
        if logging.level.parse::<tracing::Level>().is_err() {
            return Err(vec![SettingsError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!(
                    "'{}' is not one of trace, debug, info, warn, error",
                    logging.level
                ),
            }]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let settings = Settings::default();
        assert!(SettingsValidator::validate(&settings).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "loud".to_string();

        let errors = SettingsValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("logging.level"));
    }

    #[test]
    fn test_collects_all_problems() {
        let mut settings = Settings::default();
        settings.logging.level = "".to_string();
        settings.storage.backend = StorageBackend::File;
        settings.storage.path = PathBuf::new();

        let errors = SettingsValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_memory_backend_ignores_path() {
        let mut settings = Settings::default();
        settings.storage.path = PathBuf::new();
        assert!(SettingsValidator::validate(&settings).is_ok());
    }
}
