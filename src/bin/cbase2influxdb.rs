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

use cbase2influxdb::client::{self, CbaseClient};
use cbase2influxdb::config::AppConfig;
use cbase2influxdb::forecast;
use cbase2influxdb::influx::{self, InfluxClient};
use clap::Parser;
use reqwest::Client;
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;

#[derive(Debug, Parser)]
#[clap(name = "cbase2influxdb", version = clap::crate_version!())]
struct Cbase2InfluxdbApplication {
    /// Path to the YAML configuration file
    config_file: PathBuf,

    /// Log the InfluxDB write payload instead of sending it
    #[clap(long)]
    dry_run: bool,

    /// Parse forecast data from a local CSV file and print the resulting
    /// points as a JSON array instead of fetching from the CBase API
    #[clap(long)]
    csv_file: Option<PathBuf>,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = Cbase2InfluxdbApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let api_key = env::var(client::API_KEY_VAR).unwrap_or_else(|_| {
        tracing::error!(message = "required environment variable is not set", variable = client::API_KEY_VAR);
        process::exit(1)
    });

    // Inspection mode: parse a saved CSV and print points, nothing else.
    if let Some(csv_file) = &opts.csv_file {
        return inspect_csv_file(csv_file);
    }

    let config = AppConfig::load(&opts.config_file).unwrap_or_else(|e| {
        tracing::error!(
            message = "unable to load configuration",
            path = %opts.config_file.display(),
            error = %e,
        );
        process::exit(1)
    });

    let cbase = CbaseClient::new(Client::new(), &config.cbase.api_host)?;
    tracing::info!(message = "fetching forecast", api_host = %config.cbase.api_host);
    let csv_text = cbase.forecast(&config.cbase.system, &api_key).await?;

    let points = forecast::points_from_csv(&csv_text)?;
    tracing::info!(message = "parsed forecast", points = points.len());

    if opts.dry_run {
        tracing::info!(message = "dry run, skipping InfluxDB write", points = points.len());
        tracing::info!(message = "dry run payload", payload = %influx::line_protocol_body(&points));
    } else {
        let influx = InfluxClient::new(Client::new(), &config.influxdb)?;
        influx
            .write(&points, config.influxdb.retention_policy.as_deref())
            .await?;
        tracing::info!(
            message = "wrote points to InfluxDB",
            points = points.len(),
            database = %config.influxdb.database,
        );
    }

    Ok(())
}

fn inspect_csv_file(path: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
    let csv_text = fs::read_to_string(path)?;
    let points = forecast::points_from_csv(&csv_text)?;
    println!("{}", serde_json::to_string(&points)?);

    Ok(())
}
