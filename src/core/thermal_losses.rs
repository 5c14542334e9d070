//! Thermal loss model.
//!
//! Unified degree-hours drive the annual conductive and ventilation
//! losses; the maximal temperature difference over the year drives their
//! peak counterparts. Thermal-bridge and adjacency refinements exist but
//! are disabled by default, leaving the simplified constants active.

use crate::climate::ClimateSeries;
use crate::core::units::{CP_AIR, RHO_AIR, WATTS_PER_KILOWATT};
use crate::errors::DataError;
use crate::input::{
    AdjacencyUsage, Boundary, BoundaryType, Building, BuildingStock, Parameters,
};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use tracing::debug;

/// Wall insulation threshold for the thermal-bridge coefficients, W/(m2.K)
const WALL_INSULATION_THRESHOLD: f64 = 0.8;
/// Roof and floor insulation threshold, W/(m2.K)
const ROOF_FLOOR_INSULATION_THRESHOLD: f64 = 1.2;

#[derive(Clone, Copy)]
enum SetPointMode {
    Actual,
    Conventional,
}

/// Degree-hour figures shared by every row holding the same set point.
struct DegreeHours {
    air: f64,
    ground: f64,
    /// Heating-season hours with the air below the set point
    season_duration: f64,
}

fn degree_hours_by_set_point(
    set_points: impl Iterator<Item = f64>,
    air: &[f64],
    ground: &[f64],
    season: &[bool],
) -> HashMap<OrderedFloat<f64>, DegreeHours> {
    let mut cache: HashMap<OrderedFloat<f64>, DegreeHours> = HashMap::new();
    for set_point in set_points {
        cache.entry(OrderedFloat(set_point)).or_insert_with(|| {
            let mut air_udh = 0.;
            let mut ground_udh = 0.;
            let mut season_duration = 0.;
            for hour in 0..air.len() {
                if !season[hour] {
                    continue;
                }
                if air[hour] < set_point {
                    air_udh += set_point - air[hour];
                    season_duration += 1.;
                }
                if ground[hour] < set_point {
                    ground_udh += set_point - ground[hour];
                }
            }
            DegreeHours {
                air: air_udh,
                ground: ground_udh,
                season_duration,
            }
        });
    }
    cache
}

/// Computes actual and conventional unified degree-hours for every
/// boundary and building, and the heating-season duration per building.
///
/// Walls, roofs and buildings are driven by the air temperature, floors
/// by the ground temperature. Interior walls accumulate no degree-hours.
fn unified_degree_hours(
    stock: &mut BuildingStock,
    climate: &ClimateSeries,
    parameters: &Parameters,
) -> Result<(), DataError> {
    let season = climate.heating_season_mask(
        parameters.heating_season_start,
        parameters.heating_season_end,
    );
    let ground = climate.derived()?.ground_temperature.clone();
    let air = climate.air_temperature();

    for mode in [SetPointMode::Conventional, SetPointMode::Actual] {
        let boundary_set_point = |boundary: &Boundary| match mode {
            SetPointMode::Actual => boundary.actual_heating_set_point,
            SetPointMode::Conventional => boundary.conventional_heating_set_point,
        };
        let building_set_point = |building: &Building| match mode {
            SetPointMode::Actual => building.actual_heating_set_point,
            SetPointMode::Conventional => building.conventional_heating_set_point,
        };

        let cache = degree_hours_by_set_point(
            stock
                .boundaries()
                .iter()
                .map(boundary_set_point)
                .chain(stock.buildings().iter().map(building_set_point)),
            air,
            &ground,
            &season,
        );

        for boundary in stock.boundaries_mut() {
            let degree_hours = &cache[&OrderedFloat(boundary_set_point(boundary))];
            let udh = match boundary.boundary_type {
                BoundaryType::ExteriorWall | BoundaryType::Roof => degree_hours.air,
                BoundaryType::Floor => degree_hours.ground,
                BoundaryType::InteriorWall => 0.,
            };
            match mode {
                SetPointMode::Actual => boundary.results.actual_unified_degree_hours = udh,
                SetPointMode::Conventional => {
                    boundary.results.conventional_unified_degree_hours = udh
                }
            }
        }

        for building in stock.buildings_mut() {
            let degree_hours = &cache[&OrderedFloat(building_set_point(building))];
            match mode {
                SetPointMode::Actual => {
                    building.results.actual_unified_degree_hours = degree_hours.air;
                    building.results.heating_season_duration = degree_hours.season_duration;
                }
                SetPointMode::Conventional => {
                    building.results.conventional_unified_degree_hours = degree_hours.air;
                }
            }
        }
    }

    Ok(())
}

/// Maximal temperature difference between the set point and the coldest
/// hour of the year, floored at 0, driving the peak losses.
fn maximal_temperature_difference(
    stock: &mut BuildingStock,
    climate: &ClimateSeries,
) -> Result<(), DataError> {
    let min_air = climate
        .air_temperature()
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);
    let min_ground = climate
        .derived()?
        .ground_temperature
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);

    for boundary in stock.boundaries_mut() {
        // the peak driver is only defined for exterior walls and floors
        boundary.results.maximal_temperature_difference = match boundary.boundary_type {
            BoundaryType::ExteriorWall => (boundary.actual_heating_set_point - min_air).max(0.),
            BoundaryType::Floor => (boundary.actual_heating_set_point - min_ground).max(0.),
            BoundaryType::Roof | BoundaryType::InteriorWall => 0.,
        };
    }

    for building in stock.buildings_mut() {
        building.results.maximal_temperature_difference =
            (building.actual_heating_set_point - min_air).max(0.);
    }

    Ok(())
}

/// Share of conductive losses surviving adjacency to other heated
/// spaces: 1 for envelope boundaries; for interior walls it depends on
/// the neighbouring usage when the adjacency model is enabled.
fn adjacency_factor(stock: &mut BuildingStock, parameters: &Parameters) {
    for boundary in stock.boundaries_mut() {
        boundary.results.adjacency_factor = if !parameters.adjacency_model {
            1.
        } else {
            match boundary.boundary_type {
                BoundaryType::ExteriorWall | BoundaryType::Roof | BoundaryType::Floor => 1.,
                BoundaryType::InteriorWall => match boundary.adjacency_usage {
                    Some(AdjacencyUsage::Residential) => 0.2,
                    Some(AdjacencyUsage::Commercial) => 0.8,
                    Some(AdjacencyUsage::Other) | None => 1.,
                },
            }
        };
    }
}

/// Linear thermal-bridge loss factor per boundary, in W/K.
///
/// Conventional linear-loss coefficients are picked by the insulation
/// level of the element; wall bridges scale with the number of
/// intermediate floors.
fn thermal_bridge_losses(stock: &mut BuildingStock, parameters: &Parameters) {
    if !parameters.thermal_bridge_model {
        for boundary in stock.boundaries_mut() {
            boundary.results.thermal_bridge_loss_factor = 0.;
        }
        return;
    }

    let (boundaries, buildings) = stock.boundaries_with_buildings_mut();
    let floor_counts: HashMap<u64, f64> = buildings
        .iter()
        .map(|building| (building.id, building.floor_count))
        .collect();

    for boundary in boundaries {
        boundary.results.thermal_bridge_loss_factor = match boundary.boundary_type {
            BoundaryType::ExteriorWall => {
                let coefficient = if boundary.u_value < WALL_INSULATION_THRESHOLD {
                    0.3
                } else {
                    0.9
                };
                let floor_count = floor_counts[&boundary.building_id];
                coefficient * boundary.length * (floor_count - 1.).floor().abs()
            }
            BoundaryType::Roof => {
                let coefficient = if boundary.u_value < ROOF_FLOOR_INSULATION_THRESHOLD {
                    0.2
                } else {
                    0.5
                };
                coefficient * boundary.length
            }
            BoundaryType::Floor => {
                let coefficient = if boundary.u_value < ROOF_FLOOR_INSULATION_THRESHOLD {
                    0.3
                } else {
                    0.6
                };
                coefficient * boundary.length
            }
            BoundaryType::InteriorWall => 0.,
        };
    }
}

/// Annual, conventional and peak conductive losses per boundary.
///
/// The loss factor combines the opaque and glazed U-values over their
/// areas; annual figures are in kWh, peak figures in W.
fn boundary_losses(stock: &mut BuildingStock) {
    for boundary in stock.boundaries_mut() {
        let results = &mut boundary.results;
        results.loss_factor =
            boundary.u_value * results.opaque_area + boundary.window_u_value * results.window_area;
        let effective = results.loss_factor * results.adjacency_factor
            + results.thermal_bridge_loss_factor;
        results.annual_thermal_losses =
            effective * results.actual_unified_degree_hours / WATTS_PER_KILOWATT as f64;
        results.conventional_thermal_losses =
            effective * results.conventional_unified_degree_hours / WATTS_PER_KILOWATT as f64;
        results.peak_thermal_losses = effective * results.maximal_temperature_difference;
    }
}

/// Air renewal losses per building: annual and conventional in kWh, peak
/// in W (instantaneous power, hence no kilowatt conversion).
fn ventilation_losses(stock: &mut BuildingStock) {
    for building in stock.buildings_mut() {
        let air_heat = building.volume * building.air_change_rate * CP_AIR * RHO_AIR / 3600.;
        let results = &mut building.results;
        results.annual_ventilation_losses =
            results.actual_unified_degree_hours * air_heat / WATTS_PER_KILOWATT as f64;
        results.conventional_ventilation_losses =
            results.conventional_unified_degree_hours * air_heat / WATTS_PER_KILOWATT as f64;
        results.peak_ventilation_losses = results.maximal_temperature_difference * air_heat;
    }
}

pub(crate) fn run_models(
    stock: &mut BuildingStock,
    climate: &ClimateSeries,
    parameters: &Parameters,
) -> anyhow::Result<()> {
    unified_degree_hours(stock, climate, parameters)?;
    maximal_temperature_difference(stock, climate)?;
    thermal_bridge_losses(stock, parameters);
    adjacency_factor(stock, parameters);
    boundary_losses(stock);
    ventilation_losses(stock);
    debug!(
        boundaries = stock.boundaries().len(),
        buildings = stock.buildings().len(),
        "thermal losses accumulated"
    );
    Ok(())
}
