use crate::config::types::{Config, CrawlerConfig, FetchConfig, RenderConfig, SeedEntry};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_render_config(&config.render)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawl limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_render_steps < 1 {
        return Err(ConfigError::Validation(format!(
            "max_render_steps must be >= 1, got {}",
            config.max_render_steps
        )));
    }

    if config.max_concurrent_seeds < 1 || config.max_concurrent_seeds > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_seeds must be between 1 and 64, got {}",
            config.max_concurrent_seeds
        )));
    }

    if config.crawl_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "crawl_deadline_secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch and retry settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    if !(0.0..=1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be between 0.0 and 1.0, got {}",
            config.jitter
        )));
    }

    Ok(())
}

/// Validates browser session settings
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.step_timeout_ms == 0 || config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "render timeouts must be > 0".to_string(),
        ));
    }

    if config.idle_ms > config.step_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "idle_ms ({}) cannot exceed step_timeout_ms ({})",
            config.idle_ms, config.step_timeout_ms
        )));
    }

    if config.load_more_labels.iter().all(|l| l.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "load_more_labels must contain at least one label".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for entry in seeds {
        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                entry.url
            )));
        }

        if entry.max_pages == Some(0) || entry.max_render_steps == Some(0) {
            return Err(ConfigError::Validation(format!(
                "Seed '{}' overrides must be >= 1",
                entry.url
            )));
        }
    }

    Ok(())
}
