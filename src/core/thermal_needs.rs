//! Thermal needs aggregation.
//!
//! Combines each building's boundary losses, ventilation losses, solar
//! gains and occupant gains into annual, conventional and peak heating
//! needs. Gains are clipped to configured shares of the losses before
//! they are deducted.

use crate::input::{BuildingStock, Parameters, ResidentialType};
use tracing::debug;

/// Conventional share of heating effectively delivered, by residential
/// type (3CL diagnosis method).
fn conventional_intermittency(stock: &mut BuildingStock) {
    for building in stock.buildings_mut() {
        building.results.conventional_intermittency_factor = match building.residential_type {
            ResidentialType::Apartment => 0.85,
            ResidentialType::House => 0.95,
        };
    }
}

/// Share of the building floor area occupied by dwellings, derived from
/// the usage flags; buildings with annexes or mixed use get corrected
/// and clipped shares.
fn derive_heated_area_share(stock: &mut BuildingStock) {
    for building in stock.buildings_mut() {
        if !building.to_sim {
            continue;
        }
        building.heated_area_share = if !building.residential_only {
            (building.living_area_share * 1.2).clamp(0., 1.)
        } else if !building.has_annex {
            building.living_area_share
        } else {
            match building.residential_type {
                ResidentialType::House => (building.living_area_share * 1.2).clamp(0.2, 1.),
                ResidentialType::Apartment => (building.living_area_share * 1.3).clamp(0.6, 1.),
            }
        };
    }
}

fn calculate_thermal_needs(stock: &mut BuildingStock, parameters: &Parameters) {
    let gain_share = parameters.maximal_occupant_gain_share;
    let solar_share = parameters.maximal_solar_gain_share;

    let (buildings, boundaries, boundaries_by_building) = stock.buildings_with_boundaries_mut();
    for building in buildings.iter_mut() {
        if !building.to_sim {
            continue;
        }
        let envelope: &[usize] = boundaries_by_building
            .get(&building.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let boundary_losses: f64 = envelope
            .iter()
            .map(|&position| boundaries[position].results.annual_thermal_losses)
            .sum();
        let solar_gains: f64 = envelope
            .iter()
            .map(|&position| boundaries[position].results.transmitted_solar_gain)
            .sum();
        let peak_losses: f64 = envelope
            .iter()
            .map(|&position| boundaries[position].results.peak_thermal_losses)
            .sum();
        let conventional_losses: f64 = envelope
            .iter()
            .map(|&position| boundaries[position].results.conventional_thermal_losses)
            .sum();

        let results = &mut building.results;

        // actual needs account for intermittency and clipped actual gains
        results.annual_thermal_losses = boundary_losses + results.annual_ventilation_losses;
        results.annual_occupant_gains = results
            .annual_occupant_gains
            .clamp(0., gain_share * results.annual_thermal_losses);
        results.annual_solar_gains =
            solar_gains.clamp(0., solar_share * results.annual_thermal_losses);

        let mut annual_needs = results.annual_thermal_losses - results.annual_solar_gains;
        annual_needs *= building.heated_area_share;
        annual_needs *= building.intermittency_factor;
        annual_needs -= results.annual_occupant_gains;
        annual_needs *= building.regulation_factor;
        results.annual_heating_needs = annual_needs.max(0.);

        results.peak_heating_needs = if building.intermittency_factor == 0. {
            0.
        } else {
            peak_losses + results.peak_ventilation_losses
        };

        // conventional needs ignore intermittency sampling and use the
        // conventional loss figures
        results.conventional_thermal_losses =
            conventional_losses + results.conventional_ventilation_losses;
        results.conventional_occupant_gains = results
            .conventional_occupant_gains
            .clamp(0., gain_share * results.conventional_thermal_losses);

        let mut conventional_needs =
            results.conventional_thermal_losses - results.annual_solar_gains;
        conventional_needs *= building.heated_area_share;
        conventional_needs *= results.conventional_intermittency_factor;
        conventional_needs -= results.conventional_occupant_gains;
        conventional_needs *= building.regulation_factor;
        // TODO: unlike the actual needs, the conventional needs are not
        // floored at zero; confirm whether that asymmetry is intended
        results.conventional_heating_needs = conventional_needs;
    }
}

pub(crate) fn run_models(stock: &mut BuildingStock, parameters: &Parameters) -> anyhow::Result<()> {
    conventional_intermittency(stock);
    if parameters.derive_heated_area_share {
        derive_heated_area_share(stock);
    }
    calculate_thermal_needs(stock, parameters);
    debug!(
        buildings = stock.buildings().iter().filter(|b| b.to_sim).count(),
        "thermal needs aggregated"
    );
    Ok(())
}
