pub mod climate;
pub mod core;
pub mod errors;
pub mod input;
pub mod pipeline;
pub mod read_climate_file;
pub mod solar_position;

pub use crate::climate::{ClimateMetadata, ClimateSeries};
pub use crate::core::energy_consumption::{EnergyUse, FuelTally};
pub use crate::core::energy_indicators::{DiagnosisClass, EnergyIndicators};
pub use crate::errors::{BsemError, DataError, ModelListError};
pub use crate::input::{
    Boundary, BoundaryType, Building, BuildingStock, Dwelling, FuelType, Parameters, RunInput,
};
pub use crate::pipeline::{check_model_list, ModelStage, RunContext, CANONICAL_MODEL_ORDER};

use anyhow::anyhow;
use serde_valid::Validate;

/// Validates the configuration and runs the requested model prefix over
/// the shared run state. The building (and boundary) tables in the
/// context carry the results of every model that ran.
pub fn run_simulation(context: &mut RunContext) -> Result<(), BsemError> {
    context
        .parameters
        .validate()
        .map_err(|errors| anyhow!("invalid parameters: {errors}"))?;
    pipeline::run_models(context)
}
