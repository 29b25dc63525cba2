use std::time::Duration;

use log::info;
use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    version::VERSION,
};

const TIMEOUT: Duration = Duration::from_secs(30);

/// A blocking HTTP client that reports every failure as a [`Error::RemoteFetch`] naming the URL.
pub struct Http {
    client: reqwest::blocking::Client,
}

impl Http {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("keeper/{VERSION}"))
            .timeout(TIMEOUT)
            .build()
            .map_err(|error| {
                Error::remote_fetch("", format!("failed to create the HTTP client: {error}"))
            })?;
        Ok(Self { client })
    }

    pub fn get_text(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String> {
        info!("GET {url}");
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .map_err(|error| Error::remote_fetch(url, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::remote_fetch(url, format!("server responded with {status}")));
        }
        response
            .text()
            .map_err(|error| Error::remote_fetch(url, error.to_string()))
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let text = self.get_text(url, headers, query)?;
        serde_json::from_str(&text)
            .map_err(|error| Error::remote_fetch(url, format!("unexpected response: {error}")))
    }
}
