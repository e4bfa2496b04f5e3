//! Thing Directory client

use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, info};

use super::{ThingDescription, ThingError};

/// Client for a Thing Directory listing endpoint
#[derive(Debug, Clone)]
pub struct Directory {
    url: Url,
    http: Client,
}

impl Directory {
    /// Create a directory client for a listing URL
    pub fn new(url: &str) -> Result<Self, ThingError> {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, ThingError> {
        let url = Url::parse(url).map_err(|e| ThingError::InvalidHref {
            href: url.to_string(),
            reason: e.to_string(),
        })?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Fetch every Thing Description known to the directory
    pub async fn fetch(&self) -> Result<Vec<ThingDescription>, ThingError> {
        debug!(url = %self.url, "Directory::fetch: called");
        let response = self.http.get(self.url.clone()).send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ThingError::Status {
                thing: "directory".to_string(),
                status,
                message: text,
            });
        }

        let tds: Vec<ThingDescription> = response.json().await?;
        info!(count = tds.len(), url = %self.url, "Fetched Thing Descriptions");
        Ok(tds)
    }
}

/// Sorted titles of a TD list, for diagnostics
pub fn titles(tds: &[ThingDescription]) -> Vec<String> {
    let mut titles: Vec<String> = tds.iter().map(|td| td.title.clone()).collect();
    titles.sort();
    titles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_sorted() {
        let tds = vec![
            ThingDescription::new("VirtualUR3"),
            ThingDescription::new("VirtualColorSensor"),
            ThingDescription::new("VirtualConveyorBelt1"),
        ];
        assert_eq!(
            titles(&tds),
            vec!["VirtualColorSensor", "VirtualConveyorBelt1", "VirtualUR3"]
        );
    }

    #[test]
    fn test_invalid_directory_url() {
        let err = Directory::new("not a url").unwrap_err();
        assert!(matches!(err, ThingError::InvalidHref { .. }));
    }

    #[test]
    fn test_directory_url_kept() {
        let dir = Directory::new("http://localhost:8081/things").unwrap();
        assert_eq!(dir.url(), "http://localhost:8081/things");
    }
}
