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

//! CBase photovoltaic forecast collector for InfluxDB
//!
//! ## Features
//!
//! `cbase2influxdb` fetches a photovoltaic production forecast for a configured
//! install from the CBase API, parses the CSV response into typed records, and
//! writes the result to an InfluxDB database as one batch of points. It is a
//! one-shot batch collector: each invocation performs a single
//! fetch-parse-write cycle and exits, leaving scheduling to cron or a systemd
//! timer.
//!
//! Each forecast row becomes one point under the measurement `cbase` with the
//! tag `system=home`, a field per forecast column, and the row's `Time.UTC`
//! value as its timestamp. Columns the API marks `NA` (panel temperature and
//! efficiency before first light) are omitted from the point instead of being
//! written as zero.
//!
//! ## Build
//!
//! `cbase2influxdb` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:cbase2influxdb/cbase2influxdb.git && cd cbase2influxdb
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! The CBase API key is read from the `CBASE_API_KEY` environment variable;
//! the rest of the setup lives in a YAML configuration file passed as the
//! only positional argument.
//!
//! ```yaml
//! influxdb:
//!   host: influxdb.local
//!   port: 8086              # default 8086
//!   database: cbase         # default "cbase"
//!   retention_policy: rp_30d  # optional
//! cbase:
//!   api_host: api.cbase.example
//!   system:
//!     latitude: 57.7
//!     longitude: 11.9
//!     slope: 27
//!     azimuth: 180
//!     tracking: 0           # 0 fixed, 1 Y-axis, 2 X-axis, 3 dual-axis
//!     panel_output: 405
//!     panel_quantity: 10
//!     inverter_capacity: 4000
//! ```
//!
//! ```text
//! ./cbase2influxdb config.yaml
//! ```
//!
//! Pass `--dry-run` to log the exact line protocol payload instead of writing
//! it, or `--csv-file <PATH>` to parse a previously saved forecast CSV and
//! print the resulting points as a JSON array on standard output without
//! touching the network or the database.
//!

pub mod client;
pub mod config;
pub mod forecast;
pub mod influx;
