//! HTTP-backed package repository
//!
//! Talks to a registry server exposing `GET /api/packages` (names) and
//! `GET /api/packages/{name}` (a [`PackageIndex`]). Connection and 5xx
//! failures are reported as transient repository errors so callers can tell
//! them apart from a genuinely missing package; the resolver never retries
//! on its own.

use crate::package::CpuArchitecture;
use crate::repository::{PackageEntry, PackageIndex};
use crate::{Error, Result};
use std::time::Duration;

pub struct HttpRepository {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRepository {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Repository {
                url: base_url.to_string(),
                message: format!("cannot build HTTP client: {}", e),
                transient: false,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, e: &reqwest::Error) -> Error {
        let message = if e.is_connect() {
            "cannot connect; check that the repository is reachable and the URL is correct"
                .to_string()
        } else if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        };
        Error::Repository {
            url: self.base_url.clone(),
            message,
            transient: true,
        }
    }

    fn status_error(&self, status: reqwest::StatusCode) -> Error {
        Error::Repository {
            url: self.base_url.clone(),
            message: format!("HTTP {}", status.as_u16()),
            transient: status.is_server_error(),
        }
    }

    fn fetch_index(&self, name: &str) -> Result<Option<PackageIndex>> {
        let url = format!(
            "{}/api/packages/{}",
            self.base_url,
            urlencoding::encode(name)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.status_error(status));
        }

        let index: PackageIndex = response.json().map_err(|e| Error::Repository {
            url: self.base_url.clone(),
            message: format!("malformed index for '{}': {}", name, e),
            transient: false,
        })?;
        Ok(Some(index))
    }

    pub fn list_versions(
        &self,
        name: &str,
        target_os: &str,
        target_arch: CpuArchitecture,
    ) -> Result<Vec<PackageEntry>> {
        let Some(index) = self.fetch_index(name)? else {
            return Ok(Vec::new());
        };

        Ok(index
            .versions
            .iter()
            .map(|record| index.definition(record, &self.base_url))
            .filter(|def| def.is_compatible_with(target_os, target_arch))
            .map(PackageEntry::new)
            .collect())
    }

    pub fn list_all_versions(&self, name: &str) -> Result<Vec<PackageEntry>> {
        let Some(index) = self.fetch_index(name)? else {
            return Ok(Vec::new());
        };

        Ok(index
            .versions
            .iter()
            .map(|record| index.definition(record, &self.base_url))
            .map(PackageEntry::new)
            .collect())
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/packages", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(status));
        }

        let mut names: Vec<String> = response.json().map_err(|e| Error::Repository {
            url: self.base_url.clone(),
            message: format!("malformed package list: {}", e),
            transient: false,
        })?;
        names.sort();
        Ok(names)
    }
}
