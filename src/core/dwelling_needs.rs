//! Dwelling-level needs: domestic hot water, specific appliance
//! electricity, cooking energy, occupant gains and presence
//! intermittency, aggregated per building for the downstream models.
//!
//! Occupant behaviour is sampled from bounded beta distributions seeded
//! from the run configuration, so a run is reproducible.

use crate::climate::ClimateSeries;
use crate::core::units::{CP_WATER, HOURS_PER_YEAR, RHO_WATER, WATTS_PER_KILOWATT};
use crate::input::{
    BetaRange, BuildingId, BuildingStock, Dwelling, OccupancyType, Parameters, ResidentialType,
};
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use rand_pcg::Pcg64Mcg;
use std::collections::HashMap;
use tracing::debug;

/// Metabolic heat given off per occupant, in W
const INTERNAL_GAIN_BY_OCCUPANT: f64 = 50.;
/// Conventional daily hot water draw per occupant, in litres at 40 degC
const CONVENTIONAL_DHW_USE_BY_OCCUPANT: f64 = 57.;
/// Conventional occupant gains, in kWh/m2 per day
const CONVENTIONAL_OCCUPANT_GAIN_BY_AREA: f64 = 0.07;
/// Hot water delivery temperature, in degC
const DHW_TEMPERATURE: f64 = 40.;

/// Peak specific electric power by occupant count (1 to 6+), in W.
const SPECIFIC_PEAK_NEED_HOUSE: [f64; 6] = [6000., 6000., 6000., 6000., 9000., 9000.];
const SPECIFIC_PEAK_NEED_APARTMENT: [f64; 6] = [3000., 3000., 6000., 6000., 6000., 9000.];

fn sample(range: &BetaRange, rng: &mut Pcg64Mcg) -> f64 {
    let distribution =
        Beta::new(range.alpha, range.beta).expect("beta parameters are validated to be positive");
    range.min + distribution.sample(rng) * (range.max - range.min)
}

/// Energy needed to heat one day's hot water draw from the cold water
/// temperature to the delivery temperature, in Wh.
fn daily_dhw_need(dhw_use: f64, water_temperature: f64) -> f64 {
    (DHW_TEMPERATURE - water_temperature) * CP_WATER / 3600. * RHO_WATER * dhw_use
}

/// Hot water and appliance use per occupant decreases as households grow.
fn occupant_count_factor(occupant_count: f64) -> f64 {
    occupant_count.powf(1. / 1.2)
}

/// Cold water temperatures derived from the ground: the annual minimum
/// drives peak draws, the mean drives annual needs.
fn water_temperature(climate: &ClimateSeries) -> Result<(f64, f64), crate::errors::DataError> {
    let ground = &climate.derived()?.ground_temperature;
    let min = ground.iter().cloned().fold(f64::INFINITY, f64::min);
    let mean = ground.iter().sum::<f64>() / ground.len() as f64;
    Ok((min, mean))
}

fn intermittency_factor(dwelling: &Dwelling, parameters: &Parameters, rng: &mut Pcg64Mcg) -> f64 {
    match dwelling.occupancy_type {
        OccupancyType::VacantDwelling => 0.,
        OccupancyType::PrimaryResidence => sample(&parameters.sampling.intermittency_primary, rng),
        OccupancyType::SecondaryResidence => {
            sample(&parameters.sampling.intermittency_secondary, rng)
        }
    }
}

fn peak_specific_need(dwelling: &Dwelling) -> f64 {
    let occupants = dwelling.occupant_count as usize;
    if occupants == 0 {
        return 0.;
    }
    let table = match dwelling.residential_type {
        ResidentialType::House => &SPECIFIC_PEAK_NEED_HOUSE,
        ResidentialType::Apartment => &SPECIFIC_PEAK_NEED_APARTMENT,
    };
    table[occupants.min(table.len()) - 1]
}

fn dwelling_needs(
    dwelling: &mut Dwelling,
    parameters: &Parameters,
    min_water_temperature: f64,
    mean_water_temperature: f64,
    rng: &mut Pcg64Mcg,
) {
    let intermittency = intermittency_factor(dwelling, parameters, rng);
    dwelling.results.intermittency_factor = intermittency;
    let is_primary = dwelling.occupancy_type == OccupancyType::PrimaryResidence;
    let presence = if is_primary { 1. } else { intermittency };

    // conventional figures are area- and occupant-count-based only
    let conventional_use = dwelling.occupant_count * CONVENTIONAL_DHW_USE_BY_OCCUPANT;
    dwelling.results.conventional_occupant_gains =
        CONVENTIONAL_OCCUPANT_GAIN_BY_AREA * dwelling.living_area * 365.;
    dwelling.results.conventional_dhw_needs =
        daily_dhw_need(conventional_use, mean_water_temperature) * 365. / WATTS_PER_KILOWATT as f64;

    let daily_use =
        occupant_count_factor(dwelling.occupant_count) * sample(&parameters.sampling.dhw_daily_use, rng);
    dwelling.results.annual_dhw_needs = daily_dhw_need(daily_use, mean_water_temperature) * 365.
        / WATTS_PER_KILOWATT as f64
        * presence;
    // peak draw happens against the coldest water, in W over one hour
    dwelling.results.peak_dhw_needs = daily_dhw_need(daily_use, min_water_temperature);

    let specific_range = match dwelling.residential_type {
        ResidentialType::House => &parameters.sampling.specific_house,
        ResidentialType::Apartment => &parameters.sampling.specific_apartment,
    };
    dwelling.results.annual_specific_needs =
        occupant_count_factor(dwelling.occupant_count) * sample(specific_range, rng) * presence;
    dwelling.results.peak_specific_needs = peak_specific_need(dwelling);
    dwelling.results.annual_cooking_needs = occupant_count_factor(dwelling.occupant_count)
        * sample(&parameters.sampling.cooking, rng)
        * presence;

    dwelling.results.occupant_gains = (dwelling.occupant_count * INTERNAL_GAIN_BY_OCCUPANT
        * HOURS_PER_YEAR as f64
        / WATTS_PER_KILOWATT as f64
        + 0.5 * (dwelling.results.annual_specific_needs + dwelling.results.annual_cooking_needs))
        * intermittency;
}

#[derive(Default)]
struct BuildingAggregate {
    dwelling_count: usize,
    intermittency_sum: f64,
    occupant_gains: f64,
    conventional_occupant_gains: f64,
    annual_dhw_needs: f64,
    peak_dhw_needs: f64,
    conventional_dhw_needs: f64,
    annual_specific_needs: f64,
    peak_specific_needs: f64,
    annual_cooking_needs: f64,
}

/// Sums dwelling results onto their buildings. Occupant gains only count
/// during the heating season, so they are scaled by the season share of
/// the year; the building intermittency is the mean over its dwellings.
fn aggregate_to_buildings(stock: &mut BuildingStock, dwellings: &[Dwelling]) {
    let mut aggregates: HashMap<BuildingId, BuildingAggregate> = HashMap::new();
    for dwelling in dwellings {
        let aggregate = aggregates.entry(dwelling.building_id).or_default();
        let results = &dwelling.results;
        aggregate.dwelling_count += 1;
        aggregate.intermittency_sum += results.intermittency_factor;
        aggregate.occupant_gains += results.occupant_gains;
        aggregate.conventional_occupant_gains += results.conventional_occupant_gains;
        aggregate.annual_dhw_needs += results.annual_dhw_needs;
        aggregate.peak_dhw_needs += results.peak_dhw_needs;
        aggregate.conventional_dhw_needs += results.conventional_dhw_needs;
        aggregate.annual_specific_needs += results.annual_specific_needs;
        aggregate.peak_specific_needs += results.peak_specific_needs;
        aggregate.annual_cooking_needs += results.annual_cooking_needs;
    }

    for building in stock.buildings_mut() {
        let Some(aggregate) = aggregates.get(&building.id) else {
            continue;
        };
        let season_ratio =
            building.results.heating_season_duration / HOURS_PER_YEAR as f64;
        building.intermittency_factor =
            aggregate.intermittency_sum / aggregate.dwelling_count as f64;
        let results = &mut building.results;
        results.annual_occupant_gains = aggregate.occupant_gains * season_ratio;
        results.conventional_occupant_gains =
            aggregate.conventional_occupant_gains * season_ratio;
        results.annual_dhw_needs = aggregate.annual_dhw_needs;
        results.peak_dhw_needs = aggregate.peak_dhw_needs;
        results.conventional_dhw_needs = aggregate.conventional_dhw_needs;
        results.annual_specific_needs = aggregate.annual_specific_needs;
        results.peak_specific_needs = aggregate.peak_specific_needs;
        results.annual_cooking_needs = aggregate.annual_cooking_needs;
    }
}

/// Re-samples the occupant-driven regulation factor per building.
fn sample_regulation_factors(stock: &mut BuildingStock, parameters: &Parameters, rng: &mut Pcg64Mcg) {
    for building in stock.buildings_mut() {
        if !building.to_sim {
            continue;
        }
        let range = match building.residential_type {
            ResidentialType::House => &parameters.sampling.regulation_house,
            ResidentialType::Apartment => &parameters.sampling.regulation_apartment,
        };
        building.regulation_factor = sample(range, rng);
    }
}

pub(crate) fn run_models(
    stock: &mut BuildingStock,
    dwellings: &mut [Dwelling],
    climate: &ClimateSeries,
    parameters: &Parameters,
) -> anyhow::Result<()> {
    let (min_water_temperature, mean_water_temperature) = water_temperature(climate)?;
    let mut rng = Pcg64Mcg::seed_from_u64(parameters.sampling_seed);

    for dwelling in dwellings.iter_mut() {
        dwelling_needs(
            dwelling,
            parameters,
            min_water_temperature,
            mean_water_temperature,
            &mut rng,
        );
    }
    aggregate_to_buildings(stock, dwellings);

    if parameters.sample_regulation_factors {
        sample_regulation_factors(stock, parameters, &mut rng);
    }

    debug!(dwellings = dwellings.len(), "dwelling needs accumulated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::tests::constant_series;
    use crate::climate::DerivedClimate;
    use crate::input::tests::test_building;
    use crate::input::DwellingResults;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn test_dwelling(building_id: BuildingId, occupants: f64) -> Dwelling {
        Dwelling {
            building_id,
            living_area: 80.,
            occupant_count: occupants,
            occupancy_type: OccupancyType::PrimaryResidence,
            residential_type: ResidentialType::House,
            results: DwellingResults::default(),
        }
    }

    fn climate_with_ground(ground: f64) -> ClimateSeries {
        let mut climate = constant_series(5.);
        let hours = climate.len();
        climate.set_derived_for_tests(DerivedClimate {
            sun_height: vec![0.; hours],
            sun_azimuth: vec![0.; hours],
            sky_temperature: vec![-5.; hours],
            ground_temperature: vec![ground; hours],
            extra_terrestrial: vec![1367.; hours],
        });
        climate
    }

    #[rstest]
    fn vacant_dwellings_should_have_zero_intermittency() {
        let mut dwelling = test_dwelling(1, 2.);
        dwelling.occupancy_type = OccupancyType::VacantDwelling;
        let parameters = Parameters::default();
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        assert_eq!(intermittency_factor(&dwelling, &parameters, &mut rng), 0.);
    }

    #[rstest]
    fn sampled_intermittency_should_stay_in_range() {
        let dwelling = test_dwelling(1, 2.);
        let parameters = Parameters::default();
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        for _ in 0..100 {
            let factor = intermittency_factor(&dwelling, &parameters, &mut rng);
            assert!((0.6..=1.).contains(&factor));
        }
    }

    #[rstest]
    fn conventional_dhw_needs_should_follow_occupants_and_water_temperature() {
        let climate = climate_with_ground(10.);
        let parameters = Parameters::default();
        let mut dwelling = test_dwelling(1, 2.);
        let mut rng = Pcg64Mcg::seed_from_u64(parameters.sampling_seed);
        let (min_t, mean_t) = water_temperature(&climate).unwrap();
        dwelling_needs(&mut dwelling, &parameters, min_t, mean_t, &mut rng);

        let expected_daily = (40. - 10.) * CP_WATER / 3600. * 2. * 57.;
        assert_relative_eq!(
            dwelling.results.conventional_dhw_needs,
            expected_daily * 365. / 1000.
        );
        assert_relative_eq!(
            dwelling.results.conventional_occupant_gains,
            0.07 * 80. * 365.
        );
    }

    #[rstest]
    fn runs_should_be_reproducible_for_a_seed() {
        let climate = climate_with_ground(8.);
        let parameters = Parameters::default();
        let mut stock_a = BuildingStock::new(vec![test_building(1)], vec![]).unwrap();
        let mut stock_b = stock_a.clone();
        let mut dwellings_a = vec![test_dwelling(1, 2.), test_dwelling(1, 3.)];
        let mut dwellings_b = dwellings_a.clone();

        run_models(&mut stock_a, &mut dwellings_a, &climate, &parameters).unwrap();
        run_models(&mut stock_b, &mut dwellings_b, &climate, &parameters).unwrap();

        assert_eq!(
            dwellings_a[0].results.annual_dhw_needs,
            dwellings_b[0].results.annual_dhw_needs
        );
        assert_eq!(
            stock_a.buildings()[0].results.annual_specific_needs,
            stock_b.buildings()[0].results.annual_specific_needs
        );
    }

    #[rstest]
    fn aggregation_should_mean_intermittency_and_sum_needs() {
        let mut stock = BuildingStock::new(vec![test_building(1)], vec![]).unwrap();
        stock.buildings_mut()[0].results.heating_season_duration = 4380.;
        let mut dwellings = vec![test_dwelling(1, 2.), test_dwelling(1, 2.)];
        dwellings[0].results = DwellingResults {
            intermittency_factor: 1.,
            occupant_gains: 100.,
            annual_dhw_needs: 1000.,
            ..Default::default()
        };
        dwellings[1].results = DwellingResults {
            intermittency_factor: 0.,
            occupant_gains: 300.,
            annual_dhw_needs: 500.,
            ..Default::default()
        };

        aggregate_to_buildings(&mut stock, &dwellings);

        let building = &stock.buildings()[0];
        assert_relative_eq!(building.intermittency_factor, 0.5);
        assert_relative_eq!(building.results.annual_dhw_needs, 1500.);
        // gains only count for the half of the year under heating
        assert_relative_eq!(building.results.annual_occupant_gains, 200.);
    }

    #[rstest]
    fn buildings_without_dwellings_should_keep_zero_needs() {
        let mut stock = BuildingStock::new(vec![test_building(1)], vec![]).unwrap();
        aggregate_to_buildings(&mut stock, &[]);
        let results = &stock.buildings()[0].results;
        assert_eq!(results.annual_dhw_needs, 0.);
        assert_eq!(results.annual_occupant_gains, 0.);
        // the input intermittency survives untouched
        assert_eq!(stock.buildings()[0].intermittency_factor, 1.);
    }

    #[rstest]
    fn regulation_factors_should_be_resampled_only_when_enabled() {
        let climate = climate_with_ground(8.);
        let mut parameters = Parameters::default();
        let mut stock = BuildingStock::new(vec![test_building(1)], vec![]).unwrap();
        run_models(&mut stock, &mut [], &climate, &parameters).unwrap();
        assert_eq!(stock.buildings()[0].regulation_factor, 1.);

        parameters.sample_regulation_factors = true;
        run_models(&mut stock, &mut [], &climate, &parameters).unwrap();
        let factor = stock.buildings()[0].regulation_factor;
        assert!((0.7..=1.).contains(&factor));
    }

    #[rstest]
    fn peak_specific_need_should_cap_at_six_occupants() {
        let mut dwelling = test_dwelling(1, 9.);
        assert_eq!(peak_specific_need(&dwelling), 9000.);
        dwelling.residential_type = ResidentialType::Apartment;
        dwelling.occupant_count = 1.;
        assert_eq!(peak_specific_need(&dwelling), 3000.);
        dwelling.occupant_count = 0.;
        assert_eq!(peak_specific_need(&dwelling), 0.);
    }
}
