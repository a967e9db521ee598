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

use crate::influx::Point;
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::error;
use std::fmt;

/// Measurement name every forecast point is written under.
pub const MEASUREMENT: &str = "cbase";

const SYSTEM_TAG: (&str, &str) = ("system", "home");

/// Literal the API uses for values it cannot provide yet.
const NA: &str = "NA";

// CSV column names as the API sends them. The parser and the point
// builder both read from these consts, so the response schema has a
// single source of truth.
pub const COL_TIME_UTC: &str = "Time.UTC";
const COL_TEMP_AVG: &str = "temp_avg";
const COL_WIND_AVG: &str = "wind_avg";
const COL_CL_TOT: &str = "cl_tot";
const COL_CL_LOW: &str = "cl_low";
const COL_CL_MED: &str = "cl_med";
const COL_CL_HIGH: &str = "cl_high";
const COL_PREC_AMT: &str = "prec_amt";
const COL_S_GLOB: &str = "s_glob";
const COL_S_DIF: &str = "s_dif";
const COL_S_DIR_HOR: &str = "s_dir_hor";
const COL_S_DIR: &str = "s_dir";
const COL_S_SW_NET: &str = "s_sw_net";
const COL_SOLAR_ANGLE_VS_PANEL: &str = "solar_angle_vs_panel";
const COL_ALBEDO: &str = "albedo";
const COL_S_GLOB_PV: &str = "s_glob_pv";
const COL_S_GROUND_DIF_PV: &str = "s_ground_dif_pv";
const COL_S_DIR_PV: &str = "s_dir_pv";
const COL_S_DIF_PV: &str = "s_dif_pv";
const COL_PV_PO: &str = "pv_po";
const COL_PV_T: &str = "pv_T";
const COL_PV_ETA: &str = "pv_eta";

/// Every column the response schema requires, nullable ones included.
const SCHEMA_COLUMNS: [&str; 22] = [
    COL_TIME_UTC,
    COL_TEMP_AVG,
    COL_WIND_AVG,
    COL_CL_TOT,
    COL_CL_LOW,
    COL_CL_MED,
    COL_CL_HIGH,
    COL_PREC_AMT,
    COL_S_GLOB,
    COL_S_DIF,
    COL_S_DIR_HOR,
    COL_S_DIR,
    COL_S_SW_NET,
    COL_SOLAR_ANGLE_VS_PANEL,
    COL_ALBEDO,
    COL_S_GLOB_PV,
    COL_S_GROUND_DIF_PV,
    COL_S_DIR_PV,
    COL_S_DIF_PV,
    COL_PV_PO,
    COL_PV_T,
    COL_PV_ETA,
];

#[derive(Debug)]
pub enum ParseError {
    Csv(csv::Error),
    MissingColumn(&'static str),
    MissingValue {
        row: usize,
        column: &'static str,
    },
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
    InvalidTimestamp {
        row: usize,
        value: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(e) => write!(f, "{}", e),
            Self::MissingColumn(column) => write!(f, "missing required column {}", column),
            Self::MissingValue { row, column } => {
                write!(f, "row {}: missing value for column {}", row, column)
            }
            Self::InvalidNumber { row, column, value } => {
                write!(f, "row {}: invalid value {:?} for column {}", row, value, column)
            }
            Self::InvalidTimestamp { row, value } => {
                write!(f, "row {}: invalid timestamp {:?}", row, value)
            }
        }
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Csv(e) => Some(e),
            _ => None,
        }
    }
}

/// One validated row of the forecast response.
///
/// `pv_t` and `pv_eta` are None when the API sent the "NA" sentinel;
/// every other field is mandatory.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub time_utc: DateTime<Utc>,
    pub temp_avg: f64,
    pub wind_avg: f64,
    pub cl_tot: f64,
    pub cl_low: f64,
    pub cl_med: f64,
    pub cl_high: f64,
    pub prec_amt: f64,
    pub s_glob: f64,
    pub s_dif: f64,
    pub s_dir_hor: f64,
    pub s_dir: f64,
    pub s_sw_net: f64,
    pub solar_angle_vs_panel: f64,
    pub albedo: f64,
    pub s_glob_pv: f64,
    pub s_ground_dif_pv: f64,
    pub s_dir_pv: f64,
    pub s_dif_pv: f64,
    pub pv_po: f64,
    pub pv_t: Option<f64>,
    pub pv_eta: Option<f64>,
}

impl ForecastRecord {
    /// Field values paired with their wire column names, in schema order.
    fn field_values(&self) -> [(&'static str, Option<f64>); 21] {
        [
            (COL_TEMP_AVG, Some(self.temp_avg)),
            (COL_WIND_AVG, Some(self.wind_avg)),
            (COL_CL_TOT, Some(self.cl_tot)),
            (COL_CL_LOW, Some(self.cl_low)),
            (COL_CL_MED, Some(self.cl_med)),
            (COL_CL_HIGH, Some(self.cl_high)),
            (COL_PREC_AMT, Some(self.prec_amt)),
            (COL_S_GLOB, Some(self.s_glob)),
            (COL_S_DIF, Some(self.s_dif)),
            (COL_S_DIR_HOR, Some(self.s_dir_hor)),
            (COL_S_DIR, Some(self.s_dir)),
            (COL_S_SW_NET, Some(self.s_sw_net)),
            (COL_SOLAR_ANGLE_VS_PANEL, Some(self.solar_angle_vs_panel)),
            (COL_ALBEDO, Some(self.albedo)),
            (COL_S_GLOB_PV, Some(self.s_glob_pv)),
            (COL_S_GROUND_DIF_PV, Some(self.s_ground_dif_pv)),
            (COL_S_DIR_PV, Some(self.s_dir_pv)),
            (COL_S_DIF_PV, Some(self.s_dif_pv)),
            (COL_PV_PO, Some(self.pv_po)),
            (COL_PV_T, self.pv_t),
            (COL_PV_ETA, self.pv_eta),
        ]
    }

    /// Reshape this record into a time-series point: measurement "cbase",
    /// tag {"system": "home"}, one field per present value under its wire
    /// name. Absent values are dropped, never written as zero or null.
    pub fn to_point(&self) -> Point {
        let mut tags = BTreeMap::new();
        tags.insert(SYSTEM_TAG.0.to_owned(), SYSTEM_TAG.1.to_owned());

        let mut fields = BTreeMap::new();
        for (column, value) in self.field_values() {
            if let Some(v) = value {
                fields.insert(column.to_owned(), v);
            }
        }

        Point {
            measurement: MEASUREMENT.to_owned(),
            tags,
            fields,
            time: self.time_utc,
        }
    }
}

/// Parse forecast CSV text into validated records, preserving row order.
///
/// The first malformed row aborts the whole parse; there is no partial
/// result. Header-only or empty input yields an empty Vec.
pub fn parse_csv(csv_text: &str) -> Result<Vec<ForecastRecord>, ParseError> {
    if csv_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(csv_text.as_bytes());
    let headers = reader.headers().map_err(ParseError::Csv)?.clone();
    validate_header(&headers)?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(ParseError::Csv)?;
        records.push(parse_record(idx + 1, &record, &headers)?);
    }

    Ok(records)
}

/// Parse forecast CSV text straight into time-series points. This is the
/// shared entry point for the API path and the local-file path.
pub fn points_from_csv(csv_text: &str) -> Result<Vec<Point>, ParseError> {
    let records = parse_csv(csv_text)?;
    Ok(records.iter().map(ForecastRecord::to_point).collect())
}

fn validate_header(headers: &StringRecord) -> Result<(), ParseError> {
    for column in SCHEMA_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ParseError::MissingColumn(column));
        }
    }

    Ok(())
}

fn parse_record(row: usize, record: &StringRecord, headers: &StringRecord) -> Result<ForecastRecord, ParseError> {
    Ok(ForecastRecord {
        time_utc: parse_time(row, get_field(record, headers, COL_TIME_UTC, row)?)?,
        temp_avg: required_f64(record, headers, COL_TEMP_AVG, row)?,
        wind_avg: required_f64(record, headers, COL_WIND_AVG, row)?,
        cl_tot: required_f64(record, headers, COL_CL_TOT, row)?,
        cl_low: required_f64(record, headers, COL_CL_LOW, row)?,
        cl_med: required_f64(record, headers, COL_CL_MED, row)?,
        cl_high: required_f64(record, headers, COL_CL_HIGH, row)?,
        prec_amt: required_f64(record, headers, COL_PREC_AMT, row)?,
        s_glob: required_f64(record, headers, COL_S_GLOB, row)?,
        s_dif: required_f64(record, headers, COL_S_DIF, row)?,
        s_dir_hor: required_f64(record, headers, COL_S_DIR_HOR, row)?,
        s_dir: required_f64(record, headers, COL_S_DIR, row)?,
        s_sw_net: required_f64(record, headers, COL_S_SW_NET, row)?,
        solar_angle_vs_panel: required_f64(record, headers, COL_SOLAR_ANGLE_VS_PANEL, row)?,
        albedo: required_f64(record, headers, COL_ALBEDO, row)?,
        s_glob_pv: required_f64(record, headers, COL_S_GLOB_PV, row)?,
        s_ground_dif_pv: required_f64(record, headers, COL_S_GROUND_DIF_PV, row)?,
        s_dir_pv: required_f64(record, headers, COL_S_DIR_PV, row)?,
        s_dif_pv: required_f64(record, headers, COL_S_DIF_PV, row)?,
        pv_po: required_f64(record, headers, COL_PV_PO, row)?,
        pv_t: nullable_f64(record, headers, COL_PV_T, row)?,
        pv_eta: nullable_f64(record, headers, COL_PV_ETA, row)?,
    })
}

fn get_field<'a>(
    record: &'a StringRecord,
    headers: &StringRecord,
    column: &'static str,
    row: usize,
) -> Result<&'a str, ParseError> {
    let idx = headers
        .iter()
        .position(|h| h == column)
        .ok_or(ParseError::MissingColumn(column))?;

    record.get(idx).ok_or(ParseError::MissingValue { row, column })
}

fn required_f64(
    record: &StringRecord,
    headers: &StringRecord,
    column: &'static str,
    row: usize,
) -> Result<f64, ParseError> {
    let value = get_field(record, headers, column, row)?;
    value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        row,
        column,
        value: value.to_owned(),
    })
}

fn nullable_f64(
    record: &StringRecord,
    headers: &StringRecord,
    column: &'static str,
    row: usize,
) -> Result<Option<f64>, ParseError> {
    let value = get_field(record, headers, column, row)?;
    if value == NA {
        return Ok(None);
    }

    value.parse::<f64>().map(Some).map_err(|_| ParseError::InvalidNumber {
        row,
        column,
        value: value.to_owned(),
    })
}

fn parse_time(row: usize, value: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    // The API omits the offset; its timestamps are UTC by definition.
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc());
        }
    }

    Err(ParseError::InvalidTimestamp {
        row,
        value: value.to_owned(),
    })
}
