//! Hourly climate series and the climate preprocessing model.
//!
//! The preprocessor appends the derived columns every downstream model
//! reads: sun position, sky and ground temperature, the altitude-corrected
//! air temperature and extraterrestrial radiation. Once computed they are
//! read-only for the rest of the run.

use crate::core::units::{celsius_to_kelvin, HOURS_PER_DAY, KELVIN_OFFSET, STEFAN_BOLTZMANN};
use crate::errors::DataError;
use crate::input::SeasonDate;
use crate::solar_position::{extra_terrestrial_radiation, sun_position};
use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use itertools::izip;
use serde::Deserialize;
use std::f64::consts::PI;

/// Ground thermal diffusivity used by the Kusuda model, in m2/s.
const GROUND_DIFFUSIVITY: f64 = 0.8e-6;
/// Depth at which the ground temperature is estimated, in m.
const GROUND_DEPTH: f64 = 0.5;
/// Window of the rolling mean feeding the Kusuda model, in hours (30.5 days).
const GROUND_SMOOTHING_WINDOW: usize = (24. * 30.5) as usize;

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ClimateMetadata {
    /// Latitude of the weather station, in degrees
    pub latitude: f64,
    /// Longitude of the weather station, easterly positive, in degrees
    pub longitude: f64,
    /// Timezone of the weather station, in hours from UTC
    pub timezone: f64,
    /// Altitude of the weather station, in m
    pub altitude: f64,
    /// Reference altitude of the simulated buildings, in m
    pub building_altitude: f64,
}

/// One representative year of hourly climate records.
#[derive(Clone, Debug)]
pub struct ClimateSeries {
    timestamps: Vec<NaiveDateTime>,
    air_temperature: Vec<f64>,
    dew_point_temperature: Vec<f64>,
    direct_normal_radiation: Vec<f64>,
    diffuse_horizontal_radiation: Vec<f64>,
    opaque_sky_cover: Vec<f64>,
    derived: Option<DerivedClimate>,
}

/// Columns appended by the climate model.
#[derive(Clone, Debug)]
pub struct DerivedClimate {
    pub sun_height: Vec<f64>,
    pub sun_azimuth: Vec<f64>,
    pub sky_temperature: Vec<f64>,
    pub ground_temperature: Vec<f64>,
    pub extra_terrestrial: Vec<f64>,
}

impl ClimateSeries {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        air_temperature: Vec<f64>,
        dew_point_temperature: Vec<f64>,
        direct_normal_radiation: Vec<f64>,
        diffuse_horizontal_radiation: Vec<f64>,
        opaque_sky_cover: Vec<f64>,
    ) -> Result<Self, DataError> {
        let expected = timestamps.len();
        for (column, len) in [
            ("air_temperature", air_temperature.len()),
            ("dew_point_temperature", dew_point_temperature.len()),
            ("direct_normal_radiation", direct_normal_radiation.len()),
            (
                "diffuse_horizontal_radiation",
                diffuse_horizontal_radiation.len(),
            ),
            ("opaque_sky_cover", opaque_sky_cover.len()),
        ] {
            if len != expected {
                return Err(DataError::ColumnLength {
                    column,
                    found: len,
                    expected,
                });
            }
        }

        for (row, pair) in timestamps.windows(2).enumerate() {
            if pair[1] - pair[0] != TimeDelta::hours(1) {
                return Err(DataError::NotHourly { row: row + 1 });
            }
        }

        if expected != 365 * HOURS_PER_DAY as usize && expected != 366 * HOURS_PER_DAY as usize {
            return Err(DataError::NotOneYear { hours: expected });
        }

        Ok(Self {
            timestamps,
            air_temperature,
            dew_point_temperature,
            direct_normal_radiation,
            diffuse_horizontal_radiation,
            opaque_sky_cover,
            derived: None,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn air_temperature(&self) -> &[f64] {
        &self.air_temperature
    }

    pub fn dew_point_temperature(&self) -> &[f64] {
        &self.dew_point_temperature
    }

    pub fn direct_normal_radiation(&self) -> &[f64] {
        &self.direct_normal_radiation
    }

    pub fn diffuse_horizontal_radiation(&self) -> &[f64] {
        &self.diffuse_horizontal_radiation
    }

    pub fn opaque_sky_cover(&self) -> &[f64] {
        &self.opaque_sky_cover
    }

    /// 1-indexed day of the year of the given row.
    pub fn day_of_year(&self, row: usize) -> u32 {
        self.timestamps[row].ordinal()
    }

    pub fn hour_of_day(&self, row: usize) -> u32 {
        self.timestamps[row].time().hour()
    }

    pub fn derived(&self) -> Result<&DerivedClimate, DataError> {
        self.derived.as_ref().ok_or(DataError::MissingDerivedClimate)
    }

    pub fn has_derived(&self) -> bool {
        self.derived.is_some()
    }

    #[cfg(test)]
    pub(crate) fn set_derived_for_tests(&mut self, derived: DerivedClimate) {
        self.derived = Some(derived);
    }

    /// Hours belonging to the heating season.
    ///
    /// The season wraps the turn of the year: an hour qualifies when its
    /// day of the year falls strictly before the season end or strictly
    /// after the season start.
    pub fn heating_season_mask(&self, start: SeasonDate, end: SeasonDate) -> Vec<bool> {
        let year = self.timestamps[0].year();
        let start_doy = start.day_of_year(year);
        let end_doy = end.day_of_year(year);

        self.timestamps
            .iter()
            .map(|t| t.ordinal() < end_doy || t.ordinal() > start_doy)
            .collect()
    }
}

/// Runs all climate models in their fixed order: sun position, sky
/// temperature, ground temperature, altitude correction of the air
/// temperature, extraterrestrial radiation.
pub(crate) fn run_models(
    climate: &mut ClimateSeries,
    metadata: &ClimateMetadata,
) -> anyhow::Result<()> {
    let hours = climate.len();

    let mut sun_height = Vec::with_capacity(hours);
    let mut sun_azimuth = Vec::with_capacity(hours);
    for row in 0..hours {
        let position = sun_position(
            metadata.latitude,
            metadata.longitude,
            metadata.timezone,
            climate.day_of_year(row),
            climate.hour_of_day(row),
        );
        sun_height.push(position.height);
        sun_azimuth.push(position.azimuth);
    }

    let sky_temperature = sky_temperature(
        &climate.air_temperature,
        &climate.dew_point_temperature,
        &climate.opaque_sky_cover,
    );
    let ground_temperature = ground_temperature(climate);

    // -0.6 degC per 100 m between the buildings and the met station
    let correction = (metadata.building_altitude - metadata.altitude) / 100. * 0.6;
    for temperature in climate.air_temperature.iter_mut() {
        *temperature -= correction;
    }

    let extra_terrestrial = (0..hours)
        .map(|row| extra_terrestrial_radiation(climate.day_of_year(row)))
        .collect();

    climate.derived = Some(DerivedClimate {
        sun_height,
        sun_azimuth,
        sky_temperature,
        ground_temperature,
        extra_terrestrial,
    });

    Ok(())
}

/// Sky temperature from air temperature, dew point and opaque sky cover,
/// following the EnergyPlus horizontal-infrared model.
fn sky_temperature(
    air_temperature: &[f64],
    dew_point_temperature: &[f64],
    opaque_sky_cover: &[f64],
) -> Vec<f64> {
    izip!(air_temperature, dew_point_temperature, opaque_sky_cover)
        .map(|(&air, &dew, &cover)| {
            let n = cover / 10.0;
            let sky_emissivity = (0.787 + 0.764 * (celsius_to_kelvin(dew) / KELVIN_OFFSET).ln())
                * (1. + 0.0224 * n - 0.0035 * n.powi(2) + 0.00028 * n.powi(3));
            let horizontal_infrared =
                sky_emissivity * STEFAN_BOLTZMANN * celsius_to_kelvin(air).powi(4);
            (horizontal_infrared / STEFAN_BOLTZMANN).powf(0.25) - KELVIN_OFFSET
        })
        .collect()
}

/// Ground temperature at a fixed depth using the Kusuda analytical model,
/// driven by a monthly rolling mean of the air temperature.
fn ground_temperature(climate: &ClimateSeries) -> Vec<f64> {
    let air = &climate.air_temperature;
    let hours = air.len();

    // rolling mean over the trailing window, backfilled over the warm-up
    let mut smoothed = vec![0.; hours];
    let mut running = 0.;
    for i in 0..hours {
        running += air[i];
        if i >= GROUND_SMOOTHING_WINDOW {
            running -= air[i - GROUND_SMOOTHING_WINDOW];
        }
        if i + 1 >= GROUND_SMOOTHING_WINDOW {
            smoothed[i] = running / GROUND_SMOOTHING_WINDOW as f64;
        }
    }
    let first_valid = smoothed[GROUND_SMOOTHING_WINDOW - 1];
    for value in smoothed.iter_mut().take(GROUND_SMOOTHING_WINDOW - 1) {
        *value = first_valid;
    }

    let max = smoothed.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = smoothed.iter().cloned().fold(f64::INFINITY, f64::min);
    let delta = (max - min) / 2.;
    let average = smoothed.iter().sum::<f64>() / hours as f64;

    // phase shift: day of the year of the annual minimum air temperature
    let coldest_row = air
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(row, _)| row)
        .unwrap_or(0);
    let phase_shift = climate.day_of_year(coldest_row) as f64;

    let damping = (-GROUND_DEPTH * (PI / (GROUND_DIFFUSIVITY * 365. * 3600.)).sqrt()).exp();
    let lag = GROUND_DEPTH / 2. * (365. / (PI * GROUND_DIFFUSIVITY * 3600.)).sqrt();

    (0..hours)
        .map(|i| {
            let time = (i as f64 + 1.) / 24.;
            average - delta * damping * (2. * PI / 365. * (time - phase_shift - lag)).cos()
        })
        .collect()
}
