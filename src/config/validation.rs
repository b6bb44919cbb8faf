use crate::config::types::{Config, HarvestConfig, OutputConfig, SelectorConfig, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_selectors(&config.selectors)?;
    Ok(())
}

/// Validates retry, delay and concurrency settings
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.variant_attempts < 1 || config.variant_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "variant_attempts must be between 1 and 10, got {}",
            config.variant_attempts
        )));
    }

    if config.delay_min_ms > config.delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "delay_min_ms ({}) must not exceed delay_max_ms ({})",
            config.delay_min_ms, config.delay_max_ms
        )));
    }

    if config.page_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.worker_count < 1 || config.worker_count > 16 {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and 16, got {}",
            config.worker_count
        )));
    }

    if config.max_variants < 1 {
        return Err(ConfigError::Validation(
            "max_variants must be >= 1".to_string(),
        ));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("results_path", &config.results_path),
        ("failures_path", &config.failures_path),
        ("summary_path", &config.summary_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.results_path == config.failures_path {
        return Err(ConfigError::Validation(
            "results_path and failures_path must differ".to_string(),
        ));
    }

    if config.batch_save_size < 1 {
        return Err(ConfigError::Validation(
            "batch_save_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that every selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (field, selector) in config.entries() {
        if selector.trim().is_empty() || Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field: field.to_string(),
                selector: selector.to_string(),
            });
        }
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_default_harvest_config_is_valid() {
        assert!(validate_harvest_config(&HarvestConfig::default()).is_ok());
    }

    #[test]
    fn test_delay_bounds_must_be_ordered() {
        let config = HarvestConfig {
            delay_min_ms: 500,
            delay_max_ms: 100,
            ..HarvestConfig::default()
        };
        assert!(matches!(
            validate_harvest_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_attempt_bounds() {
        let zero = HarvestConfig {
            max_attempts: 0,
            ..HarvestConfig::default()
        };
        assert!(validate_harvest_config(&zero).is_err());

        let workers = HarvestConfig {
            worker_count: 17,
            ..HarvestConfig::default()
        };
        assert!(validate_harvest_config(&workers).is_err());
    }

    #[test]
    fn test_default_selectors_parse() {
        assert!(validate_selectors(&SelectorConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let selectors = SelectorConfig {
            price: "div[[".to_string(),
            ..SelectorConfig::default()
        };
        match validate_selectors(&selectors) {
            Err(ConfigError::InvalidSelector { field, .. }) => assert_eq!(field, "price"),
            other => panic!("expected InvalidSelector, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_page_marker_is_rejected() {
        let selectors = SelectorConfig {
            page_marker: Some("   ".to_string()),
            ..SelectorConfig::default()
        };
        assert!(validate_selectors(&selectors).is_err());
    }
}
