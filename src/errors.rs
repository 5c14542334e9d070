use crate::pipeline::ModelStage;
use thiserror::Error;

/// Top-level error type for a simulation run.
///
/// The taxonomy distinguishes configuration problems (detected before any
/// model executes), data problems (detected while a model is reading the
/// shared tables), and everything else raised during calculation. None of
/// these are retried; a failing run leaves the tables partially mutated.
#[derive(Debug, Error)]
pub enum BsemError {
    #[error("Invalid model configuration: {0}")]
    InvalidModelList(#[from] ModelListError),
    #[error("Input data error: {0}")]
    Data(#[from] DataError),
    #[error("Error identified during BSEM calculation: {0}")]
    Calculation(#[from] anyhow::Error),
}

/// A requested model list that is not a prefix of the canonical model order.
///
/// Carries both lists so the caller can see what was submitted and what
/// would have been accepted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("model list {requested:?} is incompatible with model order {canonical:?}")]
pub struct ModelListError {
    pub requested: Vec<ModelStage>,
    pub canonical: Vec<ModelStage>,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DataError {
    #[error("boundary {boundary_id} references unknown building {building_id}")]
    UnmappedBoundary { boundary_id: u64, building_id: u64 },
    #[error("duplicate building id {0}")]
    DuplicateBuildingId(u64),
    #[error("duplicate boundary id {0}")]
    DuplicateBoundaryId(u64),
    #[error("negative area {area} on boundary {boundary_id}")]
    NegativeArea { boundary_id: u64, area: f64 },
    #[error("window share {value} outside [0, 1] on boundary {boundary_id}")]
    WindowShareOutOfRange { boundary_id: u64, value: f64 },
    #[error("living area must be positive for simulated building {0}")]
    NonPositiveLivingArea(u64),
    #[error("footprint of building {0} has fewer than 3 distinct vertices")]
    DegenerateFootprint(u64),
    #[error("climate series columns have inconsistent lengths ({found} rows in {column}, expected {expected})")]
    ColumnLength {
        column: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("climate series timestamps are not hourly and monotonically increasing (at row {row})")]
    NotHourly { row: usize },
    #[error("climate series spans {hours} hours, expected one full year")]
    NotOneYear { hours: usize },
    #[error("derived climate columns are missing; the climate model has not run")]
    MissingDerivedClimate,
    #[error("solar masks are missing; the solar_masks model has not run")]
    MissingSolarMasks,
    #[error("dwelling references unknown building {0}")]
    UnmappedDwelling(u64),
}
