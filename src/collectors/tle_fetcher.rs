use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

const CELESTRAK_GP_URL: &str = "https://celestrak.org/NORAD/elements/gp.php";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{url} answered {status}")]
    Status { url: String, status: reqwest::StatusCode },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown element source {0:?}")]
pub struct UnknownSource(pub String);

/// What to request from CelesTrak: a named group or a single launch piece.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelestrakSource {
    Group(String),
    Designator(String),
}

impl CelestrakSource {
    pub fn iss() -> Self {
        Self::Designator("1998-067A".to_string())
    }

    pub fn css() -> Self {
        Self::Designator("2021-035A".to_string())
    }

    pub fn dfh1() -> Self {
        Self::Designator("1970-034A".to_string())
    }

    pub fn url(&self) -> Result<url::Url, url::ParseError> {
        let (key, value) = match self {
            Self::Group(group) => ("GROUP", group.as_str()),
            Self::Designator(designator) => ("INTDES", designator.as_str()),
        };
        url::Url::parse_with_params(CELESTRAK_GP_URL, &[(key, value), ("FORMAT", "tle")])
    }

    /// Stable key for the source cache.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CelestrakSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(group) => write!(f, "group:{group}"),
            Self::Designator(designator) => write!(f, "intdes:{designator}"),
        }
    }
}

/// `YYYY-NNNP` launch designators such as `1998-067A`.
fn is_designator(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 9
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..8].iter().all(u8::is_ascii_digit)
        && bytes[8..].iter().all(u8::is_ascii_uppercase)
}

impl FromStr for CelestrakSource {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "iss" => return Ok(Self::iss()),
            "css" => return Ok(Self::css()),
            "dfh-1" | "dfh1" => return Ok(Self::dfh1()),
            _ => {}
        }
        if is_designator(s) {
            return Ok(Self::Designator(s.to_string()));
        }
        let valid_group = !s.is_empty()
            && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if valid_group {
            Ok(Self::Group(s.to_string()))
        } else {
            Err(UnknownSource(s.to_string()))
        }
    }
}

pub fn http_client() -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    Ok(client)
}

/// Downloads the raw element-set text for `source`.
pub async fn fetch_source(
    client: &reqwest::Client,
    source: &CelestrakSource,
) -> Result<String, FetchError> {
    let url = source.url()?;
    info!(source = %source, "Fetching TLE from {}", url);

    let resp = client.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        warn!(status = ?status, source = %source, "Non-success response fetching TLE");
        return Err(FetchError::Status { url: url.to_string(), status });
    }

    let body = resp.text().await?;
    info!(source = %source, bytes = body.len(), "Fetched TLE set");
    Ok(body)
}
