//! EPW climate file reader.
//!
//! Pulls the columns the models need out of an EnergyPlus weather file
//! and coerces the records onto a single representative year.

use crate::climate::{ClimateMetadata, ClimateSeries};
use anyhow::{anyhow, Context};
use chrono::{NaiveDate, TimeDelta};
use csv::ReaderBuilder as CsvReaderBuilder;
use std::io::Read;

const COLUMN_LATITUDE: usize = 6;
const COLUMN_LONGITUDE: usize = 7;
const COLUMN_TIMEZONE: usize = 8;
const COLUMN_ELEVATION: usize = 9;
const COLUMN_AIR_TEMP: usize = 6; // dry bulb temp in degrees
const COLUMN_DEW_POINT: usize = 7; // dew point temp in degrees
const COLUMN_DNI_RAD: usize = 14; // direct beam normal irradiation in Wh/m2
const COLUMN_DIF_RAD: usize = 15; // diffuse irradiation (horizontal plane) in Wh/m2
const COLUMN_OPAQUE_SKY_COVER: usize = 23; // opaque sky cover in tenths

/// Number of EPW header records before the hourly data starts.
const HEADER_RECORDS: usize = 8;

/// Year the hourly records are coerced onto.
const REFERENCE_YEAR: i32 = 2019;

fn parse_field(record: &csv::StringRecord, column: usize, row: usize) -> anyhow::Result<f64> {
    record
        .get(column)
        .ok_or_else(|| anyhow!("missing column {column} in EPW record {row}"))?
        .parse()
        .with_context(|| format!("unparseable column {column} in EPW record {row}"))
}

/// Reads an EPW file into a climate series and its site metadata.
///
/// The building reference altitude starts out equal to the station
/// elevation; callers with building data should overwrite it.
pub fn read_climate_file(file: impl Read) -> anyhow::Result<(ClimateSeries, ClimateMetadata)> {
    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut air_temperature = vec![];
    let mut dew_point_temperature = vec![];
    let mut direct_normal_radiation = vec![];
    let mut diffuse_horizontal_radiation = vec![];
    let mut opaque_sky_cover = vec![];
    let mut metadata: Option<ClimateMetadata> = None;

    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("unreadable EPW record {row}"))?;
        if row == 0 {
            let altitude = parse_field(&record, COLUMN_ELEVATION, row)?;
            metadata = Some(ClimateMetadata {
                latitude: parse_field(&record, COLUMN_LATITUDE, row)?,
                longitude: parse_field(&record, COLUMN_LONGITUDE, row)?,
                timezone: parse_field(&record, COLUMN_TIMEZONE, row)?,
                altitude,
                building_altitude: altitude,
            });
        } else if row >= HEADER_RECORDS {
            air_temperature.push(parse_field(&record, COLUMN_AIR_TEMP, row)?);
            dew_point_temperature.push(parse_field(&record, COLUMN_DEW_POINT, row)?);
            direct_normal_radiation.push(parse_field(&record, COLUMN_DNI_RAD, row)?);
            diffuse_horizontal_radiation.push(parse_field(&record, COLUMN_DIF_RAD, row)?);
            opaque_sky_cover.push(parse_field(&record, COLUMN_OPAQUE_SKY_COVER, row)?);
        }
    }

    let metadata = metadata.ok_or_else(|| anyhow!("EPW file has no location header"))?;

    let start = NaiveDate::from_ymd_opt(REFERENCE_YEAR, 1, 1)
        .expect("reference date is valid")
        .and_hms_opt(0, 0, 0)
        .expect("reference time is valid");
    let timestamps = (0..air_temperature.len())
        .map(|hour| start + TimeDelta::hours(hour as i64))
        .collect();

    let series = ClimateSeries::new(
        timestamps,
        air_temperature,
        dew_point_temperature,
        direct_normal_radiation,
        diffuse_horizontal_radiation,
        opaque_sky_cover,
    )?;

    Ok((series, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::fmt::Write;

    fn synthetic_epw() -> String {
        let mut contents = String::from(
            "LOCATION,Grenoble,ARA,FRA,TMYx,074850,45.20,5.70,1.0,212.0\n",
        );
        for _ in 0..7 {
            contents.push_str("HEADER,skipped\n");
        }
        for _ in 0..8760 {
            let mut record = vec![String::from("2019"); 6];
            record[1] = String::from("1");
            // columns 6..=23: dry bulb at 6, dew point at 7, radiation at
            // 14/15, opaque sky cover at 23
            for column in 6..=23 {
                let value = match column {
                    COLUMN_AIR_TEMP => 5.0,
                    COLUMN_DEW_POINT => 2.0,
                    COLUMN_DNI_RAD => 100.0,
                    COLUMN_DIF_RAD => 50.0,
                    COLUMN_OPAQUE_SKY_COVER => 4.0,
                    _ => 0.0,
                };
                record.push(value.to_string());
            }
            let _ = writeln!(contents, "{}", record.join(","));
        }
        contents
    }

    #[rstest]
    fn should_read_location_and_columns() {
        let (series, metadata) = read_climate_file(synthetic_epw().as_bytes()).unwrap();
        assert_relative_eq!(metadata.latitude, 45.2);
        assert_relative_eq!(metadata.longitude, 5.7);
        assert_relative_eq!(metadata.timezone, 1.0);
        assert_relative_eq!(metadata.altitude, 212.0);
        assert_eq!(series.len(), 8760);
        assert_relative_eq!(series.air_temperature()[0], 5.0);
        assert_relative_eq!(series.dew_point_temperature()[100], 2.0);
        assert_relative_eq!(series.direct_normal_radiation()[5000], 100.0);
        assert_relative_eq!(series.opaque_sky_cover()[8759], 4.0);
    }

    #[rstest]
    fn short_files_should_be_rejected() {
        let mut contents = String::from(
            "LOCATION,Somewhere,STATE,CTRY,SRC,000000,50.0,0.0,0.0,10.0\n",
        );
        for _ in 0..7 {
            contents.push_str("HEADER,skipped\n");
        }
        contents.push_str("2019,1,1,1,0,flags,5.0,2.0,0,0,0,0,0,0,100,50,0,0,0,0,0,0,0,4\n");
        assert!(read_climate_file(contents.as_bytes()).is_err());
    }
}
