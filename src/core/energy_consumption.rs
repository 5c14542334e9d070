//! Energy consumption fan-out.
//!
//! Allocates each building's heating, hot water, cooking and specific
//! appliance needs across the fuel set, splitting heating between the
//! main and backup systems by the configured backup share.

use crate::input::{BuildingStock, FuelType};
use indexmap::IndexMap;
use strum::IntoEnumIterator;
use tracing::debug;

/// Consumption of one fuel, broken down by use, in kWh (or W for the
/// peak ledger).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FuelTally {
    pub heating: f64,
    pub dhw: f64,
    pub cooking: f64,
    pub specific: f64,
}

impl FuelTally {
    /// Total consumption; always the sum of the per-use parts, so no
    /// energy is allocated outside the breakdown.
    pub fn total(&self) -> f64 {
        self.heating + self.dhw + self.cooking + self.specific
    }
}

/// Per-fuel consumption ledgers of one building.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnergyUse {
    pub annual: IndexMap<FuelType, FuelTally>,
    pub peak: IndexMap<FuelType, FuelTally>,
    pub conventional: IndexMap<FuelType, FuelTally>,
}

impl EnergyUse {
    /// Ledgers with every fuel present at zero.
    pub fn zeroed() -> Self {
        let zeroes = || {
            FuelType::iter()
                .map(|fuel| (fuel, FuelTally::default()))
                .collect::<IndexMap<_, _>>()
        };
        Self {
            annual: zeroes(),
            peak: zeroes(),
            conventional: zeroes(),
        }
    }

    pub fn annual_tally(&self, fuel: FuelType) -> FuelTally {
        self.annual.get(&fuel).copied().unwrap_or_default()
    }

    pub fn peak_tally(&self, fuel: FuelType) -> FuelTally {
        self.peak.get(&fuel).copied().unwrap_or_default()
    }

    pub fn conventional_tally(&self, fuel: FuelType) -> FuelTally {
        self.conventional.get(&fuel).copied().unwrap_or_default()
    }

    pub fn annual_consumption(&self, fuel: FuelType) -> f64 {
        self.annual_tally(fuel).total()
    }

    pub fn peak_consumption(&self, fuel: FuelType) -> f64 {
        self.peak_tally(fuel).total()
    }

    pub fn conventional_consumption(&self, fuel: FuelType) -> f64 {
        self.conventional_tally(fuel).total()
    }
}

pub(crate) fn run_models(stock: &mut BuildingStock) -> anyhow::Result<()> {
    let mut allocated = 0usize;
    for building in stock.buildings_mut() {
        if !building.to_sim {
            continue;
        }
        allocated += 1;

        // district-heated buildings draw their hot water from the network
        if building.main_heating_energy == FuelType::DistrictNetwork {
            building.dhw_energy = FuelType::DistrictNetwork;
        }

        let mut energy = EnergyUse::zeroed();
        let results = &building.results;

        // heating, split between the main system and its backup
        let main_share = 1. - building.backup_heating_share;
        let main_fuel = building.main_heating_energy;
        let main_efficiency = building.main_heating_system_efficiency;
        energy.annual[&main_fuel].heating +=
            results.annual_heating_needs / main_efficiency * main_share;
        energy.peak[&main_fuel].heating +=
            results.peak_heating_needs / main_efficiency * main_share;
        energy.conventional[&main_fuel].heating +=
            results.conventional_heating_needs / main_efficiency * main_share;

        if let Some(backup_fuel) = building.backup_heating_energy {
            if building.backup_heating_share > 0. {
                let share = building.backup_heating_share;
                let efficiency = building.backup_heating_system_efficiency;
                energy.annual[&backup_fuel].heating +=
                    results.annual_heating_needs / efficiency * share;
                energy.peak[&backup_fuel].heating +=
                    results.peak_heating_needs / efficiency * share;
                energy.conventional[&backup_fuel].heating +=
                    results.conventional_heating_needs / efficiency * share;
            }
        }

        // hot water goes to exactly one fuel
        let dhw_fuel = building.dhw_energy;
        let dhw_efficiency = dhw_fuel.dhw_efficiency();
        energy.annual[&dhw_fuel].dhw += results.annual_dhw_needs / dhw_efficiency;
        energy.peak[&dhw_fuel].dhw += results.peak_dhw_needs / dhw_efficiency;
        energy.conventional[&dhw_fuel].dhw += results.conventional_dhw_needs / dhw_efficiency;

        // specific appliance electricity is consumed as-is; the
        // conventional ledger carries neither specific nor cooking terms
        energy.annual[&FuelType::Electricity].specific += results.annual_specific_needs;
        energy.peak[&FuelType::Electricity].specific += results.peak_specific_needs;

        energy.annual[&building.cooking_energy].cooking += results.annual_cooking_needs;

        building.results.energy = energy;
    }

    debug!(buildings = allocated, "energy consumption allocated");
    Ok(())
}
