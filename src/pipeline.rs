//! Model pipeline: canonical stage ordering, stage-list validation and
//! dispatch over the shared run state.

use crate::climate::{self, ClimateMetadata, ClimateSeries};
use crate::core::solar_masks::SolarMaskSet;
use crate::core::{
    dwelling_needs, energy_consumption, energy_indicators, solar_gains, solar_masks,
    thermal_losses, thermal_needs,
};
use crate::errors::{BsemError, DataError, ModelListError};
use crate::input::{BuildingStock, Dwelling, Parameters};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use tracing::info;

/// The models of the pipeline, in no particular order; the canonical
/// execution order is [`CANONICAL_MODEL_ORDER`].
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelStage {
    Climate,
    SolarMasks,
    SolarGains,
    ThermalLosses,
    DwellingNeeds,
    ThermalNeeds,
    EnergyConsumption,
    EnergyIndicators,
}

/// The only order in which models may run: each model reads columns its
/// predecessors wrote.
pub const CANONICAL_MODEL_ORDER: [ModelStage; 8] = [
    ModelStage::Climate,
    ModelStage::SolarMasks,
    ModelStage::SolarGains,
    ModelStage::ThermalLosses,
    ModelStage::DwellingNeeds,
    ModelStage::ThermalNeeds,
    ModelStage::EnergyConsumption,
    ModelStage::EnergyIndicators,
];

/// Shared state of one run, constructed once and passed to every model.
/// No module-level state survives between runs.
#[derive(Debug)]
pub struct RunContext {
    pub stock: BuildingStock,
    pub dwellings: Vec<Dwelling>,
    pub climate: ClimateSeries,
    pub metadata: ClimateMetadata,
    pub parameters: Parameters,
    pub solar_masks: Option<SolarMaskSet>,
}

impl RunContext {
    pub fn new(
        stock: BuildingStock,
        dwellings: Vec<Dwelling>,
        climate: ClimateSeries,
        metadata: ClimateMetadata,
        parameters: Parameters,
    ) -> Result<Self, DataError> {
        for dwelling in &dwellings {
            if stock.building(dwelling.building_id).is_none() {
                return Err(DataError::UnmappedDwelling(dwelling.building_id));
            }
        }
        Ok(Self {
            stock,
            dwellings,
            climate,
            metadata,
            parameters,
            solar_masks: None,
        })
    }
}

/// Checks a requested model list for validity.
///
/// A list is valid iff it is the non-empty prefix of
/// [`CANONICAL_MODEL_ORDER`]: partial pipelines are allowed, reordering or
/// omission with gaps is not.
pub fn check_model_list(models: &[ModelStage]) -> Result<(), ModelListError> {
    if !models.is_empty() && CANONICAL_MODEL_ORDER.starts_with(models) {
        Ok(())
    } else {
        Err(ModelListError {
            requested: models.to_vec(),
            canonical: CANONICAL_MODEL_ORDER.to_vec(),
        })
    }
}

/// Validates the requested model list and runs each model in order over
/// the shared state. Models later than the executed prefix leave their
/// result columns at the defaults.
pub fn run_models(context: &mut RunContext) -> Result<(), BsemError> {
    check_model_list(&context.parameters.models)?;

    let models = context.parameters.models.clone();
    for stage in models {
        info!(model = %stage, "running model");
        run_stage(context, stage)?;
    }

    Ok(())
}

fn run_stage(context: &mut RunContext, stage: ModelStage) -> Result<(), BsemError> {
    match stage {
        ModelStage::Climate => {
            climate::run_models(&mut context.climate, &context.metadata)?;
        }
        ModelStage::SolarMasks => {
            let masks = solar_masks::run_models(
                context.stock.buildings(),
                context.stock.boundaries(),
                &context.parameters,
            )?;
            context.solar_masks = Some(masks);
        }
        ModelStage::SolarGains => {
            let masks = context
                .solar_masks
                .as_ref()
                .ok_or(DataError::MissingSolarMasks)?;
            solar_gains::run_models(
                context.stock.boundaries_mut(),
                masks,
                &context.climate,
                &context.parameters,
            )?;
        }
        ModelStage::ThermalLosses => {
            thermal_losses::run_models(&mut context.stock, &context.climate, &context.parameters)?;
        }
        ModelStage::DwellingNeeds => {
            dwelling_needs::run_models(
                &mut context.stock,
                &mut context.dwellings,
                &context.climate,
                &context.parameters,
            )?;
        }
        ModelStage::ThermalNeeds => {
            thermal_needs::run_models(&mut context.stock, &context.parameters)?;
        }
        ModelStage::EnergyConsumption => {
            energy_consumption::run_models(&mut context.stock)?;
        }
        ModelStage::EnergyIndicators => {
            energy_indicators::run_models(context.stock.buildings_mut(), &context.parameters)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use strum::IntoEnumIterator;

    #[rstest]
    fn every_stage_should_appear_once_in_the_canonical_order() {
        let stages: Vec<ModelStage> = ModelStage::iter().collect();
        assert_eq!(stages.len(), CANONICAL_MODEL_ORDER.len());
        for stage in stages {
            assert_eq!(
                CANONICAL_MODEL_ORDER.iter().filter(|s| **s == stage).count(),
                1
            );
        }
    }

    #[rstest]
    fn should_accept_every_prefix() {
        for n in 1..=CANONICAL_MODEL_ORDER.len() {
            assert!(check_model_list(&CANONICAL_MODEL_ORDER[..n]).is_ok());
        }
    }

    #[rstest]
    fn should_reject_empty_list() {
        let error = check_model_list(&[]).unwrap_err();
        assert_eq!(error.canonical, CANONICAL_MODEL_ORDER.to_vec());
        assert!(error.requested.is_empty());
    }

    #[rstest]
    #[case::gap(vec![ModelStage::Climate, ModelStage::SolarGains])]
    #[case::reordered(vec![ModelStage::SolarMasks, ModelStage::Climate])]
    #[case::missing_head(vec![ModelStage::SolarMasks])]
    #[case::tail_only(vec![ModelStage::EnergyIndicators])]
    fn should_reject_non_prefix_lists(#[case] requested: Vec<ModelStage>) {
        let error = check_model_list(&requested).unwrap_err();
        assert_eq!(error.requested, requested);
    }

    #[rstest]
    fn stage_names_should_serialize_as_snake_case() {
        assert_eq!(ModelStage::SolarMasks.to_string(), "solar_masks");
        let stage: ModelStage = serde_json::from_str("\"energy_indicators\"").unwrap();
        assert_eq!(stage, ModelStage::EnergyIndicators);
    }

    mod full_pipeline {
        use super::*;
        use crate::climate::tests::hourly_timestamps;
        use crate::core::units::{CP_AIR, RHO_AIR};
        use crate::input::tests::{test_boundary, test_building};
        use crate::input::{BoundaryType, FuelType};
        use approx::assert_relative_eq;
        use pretty_assertions::assert_eq;

        /// 0 degC during the first 100 hours of January, 25 degC (above
        /// every set point) for the rest of the year.
        fn cold_snap_climate() -> ClimateSeries {
            let timestamps = hourly_timestamps(2019);
            let hours = timestamps.len();
            let air: Vec<f64> = (0..hours).map(|h| if h < 100 { 0. } else { 25. }).collect();
            let dew: Vec<f64> = air.iter().map(|t| t - 2.).collect();
            ClimateSeries::new(
                timestamps,
                air,
                dew,
                vec![0.; hours],
                vec![0.; hours],
                vec![0.; hours],
            )
            .unwrap()
        }

        fn metadata() -> ClimateMetadata {
            ClimateMetadata {
                latitude: 45.2,
                longitude: 5.7,
                timezone: 1.,
                altitude: 200.,
                building_altitude: 200.,
            }
        }

        fn context(models: Vec<ModelStage>) -> RunContext {
            let stock = BuildingStock::new(
                vec![test_building(1)],
                vec![test_boundary(10, 1, BoundaryType::ExteriorWall)],
            )
            .unwrap();
            let parameters = Parameters {
                models,
                ..Default::default()
            };
            RunContext::new(stock, vec![], cold_snap_climate(), metadata(), parameters).unwrap()
        }

        #[rstest]
        fn hundred_cold_hours_should_yield_1900_degree_hours() {
            let mut context = context(CANONICAL_MODEL_ORDER.to_vec());
            run_models(&mut context).unwrap();

            let boundary = &context.stock.boundaries()[0];
            assert_relative_eq!(boundary.results.actual_unified_degree_hours, 1900.);
            // U=1.0 over 20 m2 with no windows: 38 kWh over the cold snap
            assert_relative_eq!(boundary.results.annual_thermal_losses, 38.);

            let building = &context.stock.buildings()[0];
            assert_relative_eq!(building.results.heating_season_duration, 100.);

            let air_heat = 500. * 0.5 * CP_AIR * RHO_AIR / 3600.;
            let expected_losses = 38. + 1900. * air_heat / 1000.;
            assert_relative_eq!(
                building.results.annual_thermal_losses,
                expected_losses,
                max_relative = 1e-9
            );
            // no solar or occupant gains in this scenario
            assert_relative_eq!(
                building.results.annual_heating_needs,
                expected_losses,
                max_relative = 1e-9
            );
            assert_relative_eq!(
                building.results.peak_heating_needs,
                20. * 19. + 19. * air_heat,
                max_relative = 1e-9
            );

            // gas main heating at 0.9 efficiency picks up the whole need
            assert_relative_eq!(
                building.results.energy.annual_tally(FuelType::Gas).heating,
                expected_losses / 0.9,
                max_relative = 1e-9
            );
            assert!(building.results.diagnosis_class.is_some());
        }

        #[rstest]
        fn partial_prefix_should_leave_later_columns_untouched() {
            let mut context = context(vec![ModelStage::Climate]);
            run_models(&mut context).unwrap();

            assert!(context.climate.has_derived());
            assert!(context.solar_masks.is_none());
            let boundary = &context.stock.boundaries()[0];
            assert_eq!(boundary.results.actual_unified_degree_hours, 0.);
            assert_eq!(
                context.stock.buildings()[0].results.annual_heating_needs,
                0.
            );
        }

        #[rstest]
        fn invalid_model_list_should_fail_before_any_model_runs() {
            let mut context = context(vec![ModelStage::ThermalNeeds, ModelStage::Climate]);
            let error = run_models(&mut context).unwrap_err();
            assert!(matches!(error, BsemError::InvalidModelList(_)));
            assert!(!context.climate.has_derived());
        }

        #[rstest]
        fn masks_should_be_present_after_the_solar_masks_stage() {
            let mut context = context(vec![ModelStage::Climate, ModelStage::SolarMasks]);
            run_models(&mut context).unwrap();
            let masks = context.solar_masks.as_ref().unwrap();
            assert_eq!(masks.boundary_count(), 1);
            assert!(masks.mask(10).unwrap().iter().all(|&h| h == 0.));
        }
    }
}
