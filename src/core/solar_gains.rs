//! Solar gain model.
//!
//! Applies the solar masks to the direct normal radiation, computes the
//! angle of incidence on every solar-exposed boundary, and accumulates
//! the gain transmitted through windows during the hours of the heating
//! period.

use crate::climate::ClimateSeries;
use crate::core::solar_masks::SolarMaskSet;
use crate::input::{Boundary, BoundaryType, Parameters};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use tracing::debug;

/// Inclination of a solar-exposed boundary from the horizontal, in
/// degrees: vertical for walls, flat for roofs.
pub(crate) fn boundary_inclination(boundary_type: BoundaryType) -> f64 {
    match boundary_type {
        BoundaryType::ExteriorWall | BoundaryType::InteriorWall => 90.,
        BoundaryType::Roof | BoundaryType::Floor => 0.,
    }
}

/// Angle of incidence of the solar beam on a surface, in degrees.
///
/// Standard formula from surface inclination and azimuth and solar zenith
/// and azimuth; all angles in degrees, azimuths in compass convention.
pub(crate) fn angle_of_incidence(
    inclination: f64,
    surface_azimuth: f64,
    zenith: f64,
    sun_azimuth: f64,
) -> f64 {
    let inclination = inclination.to_radians();
    let zenith = zenith.to_radians();
    let azimuth_difference = (sun_azimuth - surface_azimuth).to_radians();

    let cos_aoi = zenith.cos() * inclination.cos()
        + zenith.sin() * inclination.sin() * azimuth_difference.cos();
    cos_aoi.clamp(-1., 1.).acos().to_degrees()
}

/// Share of the direct radiation transmitted through the glazing at the
/// given angle of incidence, clipped to [0, 1].
pub(crate) fn transmission_coefficient(angle_of_incidence: f64, window_solar_factor: f64) -> f64 {
    ((1. - (angle_of_incidence / 90.).powi(5)) * window_solar_factor).clamp(0., 1.)
}

/// Hours of the heating season with the air temperature below each
/// distinct set point found among the solar-exposed boundaries.
fn heating_period_masks(
    boundaries: &[Boundary],
    climate: &ClimateSeries,
    parameters: &Parameters,
) -> HashMap<OrderedFloat<f64>, Vec<bool>> {
    let season = climate.heating_season_mask(
        parameters.heating_season_start,
        parameters.heating_season_end,
    );
    let air = climate.air_temperature();

    let mut masks: HashMap<OrderedFloat<f64>, Vec<bool>> = HashMap::new();
    for boundary in boundaries {
        if !boundary.boundary_type.is_solar_exposed() {
            continue;
        }
        masks
            .entry(OrderedFloat(boundary.actual_heating_set_point))
            .or_insert_with(|| {
                let set_point = boundary.actual_heating_set_point;
                season
                    .iter()
                    .zip(air)
                    .map(|(&in_season, &temperature)| in_season && temperature < set_point)
                    .collect()
            });
    }
    masks
}

pub(crate) fn run_models(
    boundaries: &mut [Boundary],
    masks: &SolarMaskSet,
    climate: &ClimateSeries,
    parameters: &Parameters,
) -> anyhow::Result<()> {
    let derived = climate.derived()?;
    let period_masks = heating_period_masks(boundaries, climate, parameters);
    let direct_normal = climate.direct_normal_radiation();

    let mut exposed_count = 0usize;
    for boundary in boundaries.iter_mut() {
        boundary.results.window_area = boundary.window_share * boundary.area;
        boundary.results.opaque_area = boundary.area - boundary.results.window_area;
        boundary.results.transmitted_solar_gain = 0.;

        if !boundary.boundary_type.is_solar_exposed() {
            continue;
        }
        exposed_count += 1;

        let inclination = boundary_inclination(boundary.boundary_type);
        let period_mask = &period_masks[&OrderedFloat(boundary.actual_heating_set_point)];

        let mut transmitted = 0.;
        for hour in 0..climate.len() {
            if !period_mask[hour] {
                continue;
            }
            let sun_height = derived.sun_height[hour];
            // direct beam passes only when the sun clears the mask in its
            // azimuth bin
            if sun_height <= masks.height_at(boundary.id, derived.sun_azimuth[hour]) {
                continue;
            }

            let zenith = 90. - sun_height;
            let aoi = angle_of_incidence(
                inclination,
                boundary.azimuth,
                zenith,
                derived.sun_azimuth[hour],
            );
            let poa_direct = (direct_normal[hour] * aoi.to_radians().cos()).max(0.);
            transmitted += transmission_coefficient(aoi, boundary.window_solar_factor) * poa_direct;
        }

        boundary.results.transmitted_solar_gain = boundary.results.window_area * transmitted / 1000.;
    }

    debug!(exposed = exposed_count, "solar gains accumulated");
    Ok(())
}
