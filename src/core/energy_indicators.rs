//! Energy indicators and the diagnosis classifier.
//!
//! Converts the per-fuel final energy into primary energy and CO2
//! emissions, expresses the indicators per unit of living area, and bins
//! the conventional figures into a letter class. Electricity used for
//! hot water carries its own conversion factors.

use crate::input::{Building, EnergyFactors, FuelType, Parameters};
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::Display;
use tracing::debug;

/// Class edges for the primary energy indicator, in kWh/m2
const ENERGY_CLASS_EDGES: [f64; 9] = [-10., 0., 70., 110., 180., 250., 330., 420., f64::INFINITY];
/// Class edges for the CO2 indicator, in kgCO2/m2
const CO2_CLASS_EDGES: [f64; 9] = [-10., 0., 6., 11., 30., 50., 70., 100., f64::INFINITY];

/// Energy performance letter. `X` marks a degenerate (zero or negative)
/// indicator and sorts before `A`, so the worse of two classes is their
/// maximum.
#[derive(Clone, Copy, Debug, Display, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum DiagnosisClass {
    X,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

const DIAGNOSIS_CLASSES: [DiagnosisClass; 8] = [
    DiagnosisClass::X,
    DiagnosisClass::A,
    DiagnosisClass::B,
    DiagnosisClass::C,
    DiagnosisClass::D,
    DiagnosisClass::E,
    DiagnosisClass::F,
    DiagnosisClass::G,
];

/// Bins a value into its class over right-closed intervals; values
/// outside the edges get no class.
fn classify(value: f64, edges: &[f64; 9]) -> Option<DiagnosisClass> {
    if value.is_nan() {
        return None;
    }
    edges
        .windows(2)
        .position(|window| window[0] < value && value <= window[1])
        .map(|position| DIAGNOSIS_CLASSES[position])
}

/// Final and primary consumption, CO2 emissions, and their per-surface
/// counterparts, in kWh and kgCO2 (per m2 for the `_by_surface` fields).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyIndicators {
    pub total_final_consumption: f64,
    pub total_primary_consumption: f64,
    pub conventional_final_consumption: f64,
    pub conventional_primary_consumption: f64,
    pub conventional_co2_emission: f64,
    pub total_co2_emission: f64,
    pub total_final_consumption_by_surface: f64,
    pub total_primary_consumption_by_surface: f64,
    pub conventional_final_consumption_by_surface: f64,
    pub conventional_primary_consumption_by_surface: f64,
    pub conventional_co2_emission_by_surface: f64,
    pub total_co2_emission_by_surface: f64,
}

/// Weighted sum over the annual ledger with the electricity-dhw split:
/// electricity consumed for hot water uses its own factor.
fn weigh_annual(building: &Building, factors: &EnergyFactors) -> f64 {
    let energy = &building.results.energy;
    FuelType::iter()
        .map(|fuel| {
            let consumption = energy.annual_consumption(fuel);
            if fuel == FuelType::Electricity {
                let dhw = energy.annual_tally(fuel).dhw;
                factors.heating_factor(fuel) * (consumption - dhw) + factors.dhw_factor(fuel) * dhw
            } else {
                factors.heating_factor(fuel) * consumption
            }
        })
        .sum()
}

/// Weighted sum over the conventional ledger with the same split.
fn weigh_conventional(building: &Building, factors: &EnergyFactors) -> f64 {
    let energy = &building.results.energy;
    FuelType::iter()
        .map(|fuel| {
            let tally = energy.conventional_tally(fuel);
            if fuel == FuelType::Electricity {
                factors.heating_factor(fuel) * tally.heating + factors.dhw_factor(fuel) * tally.dhw
            } else {
                factors.heating_factor(fuel) * tally.total()
            }
        })
        .sum()
}

fn actual_energy_indicators(building: &mut Building, parameters: &Parameters) {
    let total_final: f64 = FuelType::iter()
        .map(|fuel| building.results.energy.annual_consumption(fuel))
        .sum();
    let total_primary = weigh_annual(building, &parameters.primary_energies);

    let indicators = &mut building.results.indicators;
    indicators.total_final_consumption = total_final;
    indicators.total_primary_consumption = total_primary;
    indicators.total_final_consumption_by_surface = total_final / building.living_area;
    indicators.total_primary_consumption_by_surface = total_primary / building.living_area;
}

fn conventional_energy_indicators(building: &mut Building, parameters: &Parameters) {
    let conventional_final: f64 = FuelType::iter()
        .map(|fuel| building.results.energy.conventional_consumption(fuel))
        .sum();
    let conventional_primary = weigh_conventional(building, &parameters.primary_energies);
    let conventional_co2 = weigh_conventional(building, &parameters.co2_energies);
    let total_co2 = weigh_annual(building, &parameters.co2_energies);

    let living_area = building.living_area;
    let indicators = &mut building.results.indicators;
    indicators.conventional_final_consumption = conventional_final;
    indicators.conventional_primary_consumption = conventional_primary;
    indicators.conventional_co2_emission = conventional_co2;
    indicators.total_co2_emission = total_co2;
    indicators.conventional_final_consumption_by_surface = conventional_final / living_area;
    indicators.conventional_primary_consumption_by_surface = conventional_primary / living_area;
    indicators.conventional_co2_emission_by_surface = conventional_co2 / living_area;
    indicators.total_co2_emission_by_surface = total_co2 / living_area;
}

/// The final class is the worse of the energy and CO2 letters.
fn diagnosis_class(building: &mut Building) {
    let indicators = &building.results.indicators;
    let energy_class = classify(
        indicators.conventional_primary_consumption_by_surface,
        &ENERGY_CLASS_EDGES,
    );
    let co2_class = classify(
        indicators.conventional_co2_emission_by_surface,
        &CO2_CLASS_EDGES,
    );
    building.results.diagnosis_class = match (energy_class, co2_class) {
        (Some(energy), Some(co2)) => Some(energy.max(co2)),
        (Some(class), None) | (None, Some(class)) => Some(class),
        (None, None) => None,
    };
}

pub(crate) fn run_models(buildings: &mut [Building], parameters: &Parameters) -> anyhow::Result<()> {
    let mut classified = 0usize;
    for building in buildings.iter_mut() {
        if !building.to_sim {
            continue;
        }
        actual_energy_indicators(building, parameters);
        conventional_energy_indicators(building, parameters);
        diagnosis_class(building);
        classified += 1;
    }
    debug!(buildings = classified, "energy indicators computed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::energy_consumption::EnergyUse;
    use crate::input::tests::test_building;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(-20., None)]
    #[case(-5., Some(DiagnosisClass::X))]
    #[case(0., Some(DiagnosisClass::X))]
    #[case(50., Some(DiagnosisClass::A))]
    #[case(70., Some(DiagnosisClass::A))]
    #[case(70.1, Some(DiagnosisClass::B))]
    #[case(200., Some(DiagnosisClass::D))]
    #[case(1000., Some(DiagnosisClass::G))]
    fn should_classify_primary_energy(#[case] value: f64, #[case] expected: Option<DiagnosisClass>) {
        assert_eq!(classify(value, &ENERGY_CLASS_EDGES), expected);
    }

    #[rstest]
    fn worse_letter_should_win() {
        assert_eq!(DiagnosisClass::C.max(DiagnosisClass::F), DiagnosisClass::F);
        assert_eq!(DiagnosisClass::X.max(DiagnosisClass::A), DiagnosisClass::A);
    }

    fn building_with_energy() -> Building {
        let mut building = test_building(1);
        building.living_area = 100.;
        let mut energy = EnergyUse::zeroed();
        energy.annual[&FuelType::Electricity].heating = 3000.;
        energy.annual[&FuelType::Electricity].dhw = 1000.;
        energy.annual[&FuelType::Gas].heating = 5000.;
        energy.conventional[&FuelType::Electricity].heating = 2800.;
        energy.conventional[&FuelType::Electricity].dhw = 900.;
        energy.conventional[&FuelType::Gas].heating = 4700.;
        building.results.energy = energy;
        building
    }

    #[rstest]
    fn primary_energy_should_split_electricity_uses() {
        let mut building = building_with_energy();
        let parameters = Parameters::default();
        actual_energy_indicators(&mut building, &parameters);

        let indicators = &building.results.indicators;
        assert_relative_eq!(indicators.total_final_consumption, 9000.);
        // electricity heating and dhw both weigh 2.0 by default, gas 1.0
        assert_relative_eq!(
            indicators.total_primary_consumption,
            2.0 * 3000. + 2.0 * 1000. + 5000.
        );
        assert_relative_eq!(indicators.total_primary_consumption_by_surface, 130.);
    }

    #[rstest]
    fn distinct_dhw_factor_should_apply_to_electric_hot_water() {
        let mut building = building_with_energy();
        let mut parameters = Parameters::default();
        parameters.primary_energies.electricity_dhw = 3.0;
        actual_energy_indicators(&mut building, &parameters);

        assert_relative_eq!(
            building.results.indicators.total_primary_consumption,
            2.0 * 3000. + 3.0 * 1000. + 5000.
        );
    }

    #[rstest]
    fn co2_should_follow_the_conventional_ledger() {
        let mut building = building_with_energy();
        let parameters = Parameters::default();
        conventional_energy_indicators(&mut building, &parameters);

        let indicators = &building.results.indicators;
        let expected_co2 = 0.079 * 2800. + 0.065 * 900. + 0.227 * 4700.;
        assert_relative_eq!(indicators.conventional_co2_emission, expected_co2);
        assert_relative_eq!(
            indicators.conventional_co2_emission_by_surface,
            expected_co2 / 100.
        );
    }

    #[rstest]
    fn diagnosis_should_take_the_worse_of_both_letters() {
        let mut building = building_with_energy();
        // energy indicator in class C, CO2 indicator in class E
        building.results.indicators.conventional_primary_consumption_by_surface = 120.;
        building.results.indicators.conventional_co2_emission_by_surface = 40.;
        diagnosis_class(&mut building);
        assert_eq!(building.results.diagnosis_class, Some(DiagnosisClass::E));
    }

    #[rstest]
    fn diagnosis_should_degrade_monotonically_with_primary_energy() {
        let mut building = building_with_energy();
        building.results.indicators.conventional_co2_emission_by_surface = 8.;
        let mut previous = DiagnosisClass::X;
        for consumption in [10., 80., 120., 200., 300., 400., 500.] {
            building
                .results
                .indicators
                .conventional_primary_consumption_by_surface = consumption;
            diagnosis_class(&mut building);
            let class = building.results.diagnosis_class.unwrap();
            assert!(class >= previous);
            previous = class;
        }
    }

    #[rstest]
    fn full_run_should_classify_simulated_buildings() {
        let mut buildings = vec![building_with_energy()];
        run_models(&mut buildings, &Parameters::default()).unwrap();
        assert!(buildings[0].results.diagnosis_class.is_some());

        let mut excluded = vec![building_with_energy()];
        excluded[0].to_sim = false;
        run_models(&mut excluded, &Parameters::default()).unwrap();
        assert_eq!(excluded[0].results.diagnosis_class, None);
    }
}
