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

use crate::config::InfluxDbConfig;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error;
use std::fmt;

#[derive(Debug)]
pub enum WriteError {
    Internal(reqwest::Error),
    InvalidAddress(String),
    Unexpected(StatusCode, Url),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidAddress(a) => write!(f, "invalid InfluxDB address {}", a),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for WriteError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// One time-stamped set of numeric fields plus static tags, the unit
/// written to InfluxDB. Maps are ordered so line protocol and JSON output
/// are deterministic for a given input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub time: DateTime<Utc>,
}

impl Point {
    /// Render this point as one InfluxDB line protocol line with a
    /// second-precision timestamp.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_name(key));
            line.push('=');
            line.push_str(&escape_name(value));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape_name(key), value))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));

        line.push(' ');
        line.push_str(&self.time.timestamp().to_string());
        line
    }
}

/// Render a batch of points as one line protocol payload, one line per
/// point, in input order.
pub fn line_protocol_body(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line_protocol)
        .collect::<Vec<String>>()
        .join("\n")
}

// Line protocol escaping: measurements escape commas and spaces; tag and
// field keys and tag values additionally escape equals signs.

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_name(name: &str) -> String {
    name.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

/// Client for the InfluxDB v1 `/write` endpoint.
///
/// Writes a whole batch in a single request; there are no partial batch
/// semantics and no retries.
#[derive(Debug)]
pub struct InfluxClient {
    client: Client,
    write_url: Url,
    database: String,
}

impl InfluxClient {
    pub fn new(client: Client, config: &InfluxDbConfig) -> Result<Self, WriteError> {
        let raw = format!("http://{}:{}/write", config.host, config.port);
        let write_url = Url::parse(&raw).map_err(|_| WriteError::InvalidAddress(raw.clone()))?;

        Ok(InfluxClient {
            client,
            write_url,
            database: config.database.clone(),
        })
    }

    /// Write all points in one call, tagged with the retention policy
    /// when one is configured.
    pub async fn write(&self, points: &[Point], retention_policy: Option<&str>) -> Result<(), WriteError> {
        let body = line_protocol_body(points);
        let params = self.write_params(retention_policy);

        tracing::debug!(
            message = "writing points",
            url = %self.write_url,
            database = %self.database,
            points = points.len(),
        );

        let res = self
            .client
            .post(self.write_url.clone())
            .query(&params)
            .body(body)
            .send()
            .await
            .map_err(WriteError::Internal)?;

        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WriteError::Unexpected(status, self.write_url.clone()))
        }
    }

    fn write_params<'a>(&'a self, retention_policy: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("db", self.database.as_str()), ("precision", "s")];
        if let Some(rp) = retention_policy {
            params.push(("rp", rp));
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::{line_protocol_body, InfluxClient, Point};
    use crate::config::InfluxDbConfig;
    use chrono::{TimeZone, Utc};
    use reqwest::Client;
    use std::collections::BTreeMap;

    fn sample_point() -> Point {
        let mut tags = BTreeMap::new();
        tags.insert("system".to_owned(), "home".to_owned());

        let mut fields = BTreeMap::new();
        fields.insert("temp_avg".to_owned(), 12.5);
        fields.insert("pv_eta".to_owned(), 3.2);

        Point {
            measurement: "cbase".to_owned(),
            tags,
            fields,
            time: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    fn sample_config() -> InfluxDbConfig {
        InfluxDbConfig {
            host: "influxdb.local".to_owned(),
            port: 8086,
            database: "cbase".to_owned(),
            retention_policy: None,
        }
    }

    #[test]
    fn test_to_line_protocol() {
        let point = sample_point();

        assert_eq!(
            point.to_line_protocol(),
            "cbase,system=home pv_eta=3.2,temp_avg=12.5 1714557600"
        );
    }

    #[test]
    fn test_to_line_protocol_escapes_names() {
        let mut point = sample_point();
        point
            .tags
            .insert("site".to_owned(), "home lab".to_owned());

        assert!(point.to_line_protocol().contains("site=home\\ lab"));
    }

    #[test]
    fn test_line_protocol_body_joins_lines() {
        let first = sample_point();
        let mut second = sample_point();
        second.time = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

        let body = line_protocol_body(&[first.clone(), second]);
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], first.to_line_protocol());
        assert!(lines[1].ends_with("1714561200"));
    }

    #[test]
    fn test_point_json_shape() {
        let json = serde_json::to_value(sample_point()).unwrap();

        assert_eq!(json["measurement"], "cbase");
        assert_eq!(json["tags"]["system"], "home");
        assert_eq!(json["fields"]["pv_eta"], 3.2);
        assert_eq!(json["time"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_new_builds_write_url() {
        let client = InfluxClient::new(Client::new(), &sample_config()).unwrap();

        assert_eq!(client.write_url.as_str(), "http://influxdb.local:8086/write");
    }

    #[test]
    fn test_write_params_without_retention_policy() {
        let client = InfluxClient::new(Client::new(), &sample_config()).unwrap();

        assert_eq!(client.write_params(None), vec![("db", "cbase"), ("precision", "s")]);
    }

    #[test]
    fn test_write_params_with_retention_policy() {
        let client = InfluxClient::new(Client::new(), &sample_config()).unwrap();

        assert_eq!(
            client.write_params(Some("rp_30d")),
            vec![("db", "cbase"), ("precision", "s"), ("rp", "rp_30d")]
        );
    }
}
