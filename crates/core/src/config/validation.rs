use crate::{CrawlerError, CrawlerResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> CrawlerResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> CrawlerResult<()> {
        if value.trim().is_empty() {
            return Err(CrawlerError::config_error(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> CrawlerResult<()> {
        if timeout_seconds == 0 {
            return Err(CrawlerError::config_error(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 86_400 {
            return Err(CrawlerError::config_error(format!(
                "{field_name} must be less than or equal to 86400"
            )));
        }
        Ok(())
    }

    pub fn validate_interval_ms(interval_ms: u64, field_name: &str) -> CrawlerResult<()> {
        if interval_ms == 0 {
            return Err(CrawlerError::config_error(format!(
                "{field_name} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Validate that a count is reasonable
    pub fn validate_count(count: usize, field_name: &str) -> CrawlerResult<()> {
        if count == 0 {
            return Err(CrawlerError::config_error(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > 10_000 {
            return Err(CrawlerError::config_error(format!(
                "{field_name} must be less than or equal to 10000"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a valid format
    pub fn validate_url(url: &str, field_name: &str) -> CrawlerResult<()> {
        Self::validate_not_empty(url, field_name)?;
        if !url.contains("://") {
            return Err(CrawlerError::config_error(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("test", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("", "field").is_err());
        assert!(ValidationUtils::validate_not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_timeout_seconds() {
        assert!(ValidationUtils::validate_timeout_seconds(300, "t").is_ok());
        assert!(ValidationUtils::validate_timeout_seconds(0, "t").is_err());
        assert!(ValidationUtils::validate_timeout_seconds(86_401, "t").is_err());
    }

    #[test]
    fn test_validate_count() {
        assert!(ValidationUtils::validate_count(1, "test").is_ok());
        assert!(ValidationUtils::validate_count(10_000, "test").is_ok());
        assert!(ValidationUtils::validate_count(0, "test").is_err());
        assert!(ValidationUtils::validate_count(10_001, "test").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(ValidationUtils::validate_url("http://localhost:9998", "url").is_ok());
        assert!(ValidationUtils::validate_url("https://example.com", "url").is_ok());
        assert!(ValidationUtils::validate_url("", "url").is_err());
        assert!(ValidationUtils::validate_url("localhost:9998", "url").is_err());
    }
}
