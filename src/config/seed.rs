use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Immutable input for one crawl session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRequest {
    url: Url,
    max_pages: u32,
    max_render_steps: u32,
}

impl SeedRequest {
    /// Creates a validated seed request
    ///
    /// The URL must be absolute http/https and both caps must be positive.
    ///
    /// # Example
    ///
    /// ```
    /// use pagecrawl::SeedRequest;
    ///
    /// let seed = SeedRequest::new("https://example.com/news?page=1", 3, 5).unwrap();
    /// assert_eq!(seed.max_pages(), 3);
    /// assert!(SeedRequest::new("/relative", 3, 5).is_err());
    /// ```
    pub fn new(url: &str, max_pages: u32, max_render_steps: u32) -> Result<Self, ConfigError> {
        let url = Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must use http or https",
                url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                url
            )));
        }

        if max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be >= 1".to_string(),
            ));
        }

        if max_render_steps == 0 {
            return Err(ConfigError::Validation(
                "max_render_steps must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            url,
            max_pages,
            max_render_steps,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn max_render_steps(&self) -> u32 {
        self.max_render_steps
    }
}

impl Config {
    /// Builds seed requests from the `[[seed]]` entries, applying the
    /// crawler-wide caps where a seed has no override
    pub fn seed_requests(&self) -> Result<Vec<SeedRequest>, ConfigError> {
        self.seeds
            .iter()
            .map(|entry| {
                SeedRequest::new(
                    &entry.url,
                    entry.max_pages.unwrap_or(self.crawler.max_pages),
                    entry
                        .max_render_steps
                        .unwrap_or(self.crawler.max_render_steps),
                )
            })
            .collect()
    }
}
