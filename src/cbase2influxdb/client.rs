// cbase2influxdb - CBase photovoltaic forecast collector for InfluxDB
//
// Copyright 2024 The cbase2influxdb Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::config::SystemParams;
use reqwest::{Client, StatusCode, Url};
use std::error;
use std::fmt;

/// Environment variable holding the CBase API key. Checked at startup;
/// a missing key is fatal in every mode.
pub const API_KEY_VAR: &str = "CBASE_API_KEY";

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    InvalidHost(String),
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidHost(h) => write!(f, "invalid API host {}", h),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Client for the CBase PV forecast API.
///
/// Performs a single GET per call and buffers the entire CSV response
/// body. Retries, timeouts, and redirects are whatever the underlying
/// `reqwest::Client` does by default.
#[derive(Debug)]
pub struct CbaseClient {
    client: Client,
    request_url: Url,
}

impl CbaseClient {
    pub fn new(client: Client, api_host: &str) -> Result<Self, ClientError> {
        let raw = format!("https://{}/api/pvfcst_request", api_host);
        let request_url = Url::parse(&raw).map_err(|_| ClientError::InvalidHost(api_host.to_owned()))?;

        Ok(CbaseClient { client, request_url })
    }

    /// Fetch one forecast as raw CSV text for the given system, with all
    /// system parameters serialized under their wire names.
    pub async fn forecast(&self, system: &SystemParams, api_key: &str) -> Result<String, ClientError> {
        let mut params = system.query_params();
        params.push(("apikey", api_key.to_owned()));

        tracing::debug!(message = "making forecast request", url = %self.request_url);

        let res = self
            .client
            .get(self.request_url.clone())
            .query(&params)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if !status.is_success() {
            return Err(ClientError::Unexpected(status, self.request_url.clone()));
        }

        res.text().await.map_err(ClientError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::{CbaseClient, ClientError};
    use reqwest::Client;

    #[test]
    fn test_new_builds_request_url() {
        let client = CbaseClient::new(Client::new(), "api.cbase.example").unwrap();

        assert_eq!(
            client.request_url.as_str(),
            "https://api.cbase.example/api/pvfcst_request"
        );
    }

    #[test]
    fn test_new_rejects_unparsable_host() {
        let err = CbaseClient::new(Client::new(), "not a host").unwrap_err();

        assert!(matches!(err, ClientError::InvalidHost(_)));
    }
}
