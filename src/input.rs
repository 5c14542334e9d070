//! Typed input records for a simulation run: buildings, their envelope
//! boundaries, dwellings, and the run configuration.
//!
//! The building and boundary tables are loaded once per run and shared by
//! every model; models only fill the result blocks, they never add or
//! remove rows.

use crate::core::energy_consumption::EnergyUse;
use crate::core::energy_indicators::{DiagnosisClass, EnergyIndicators};
use crate::core::geometry::Polygon;
use crate::errors::DataError;
use crate::pipeline::{ModelStage, CANONICAL_MODEL_ORDER};
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use nalgebra::Point3;
use serde::{Deserialize, Deserializer};
use serde_valid::Validate;
use strum_macros::{Display, EnumIter};

pub type BuildingId = u64;
pub type BoundaryId = u64;

/// The closed set of fuels consumption can be allocated to.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FuelType {
    Electricity,
    Gas,
    Oil,
    Biomass,
    DistrictNetwork,
    Biogas,
}

impl FuelType {
    /// Conventional efficiency of domestic hot water production.
    pub fn dhw_efficiency(&self) -> f64 {
        match self {
            FuelType::Electricity => 0.7,
            _ => 0.6,
        }
    }
}

/// Envelope element type. The applicable physical models (solar exposure,
/// ground coupling) depend strictly on this.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoundaryType {
    ExteriorWall,
    InteriorWall,
    Roof,
    Floor,
}

impl BoundaryType {
    /// Exterior walls and roofs receive direct solar radiation.
    pub fn is_solar_exposed(&self) -> bool {
        matches!(self, BoundaryType::ExteriorWall | BoundaryType::Roof)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ResidentialType {
    House,
    Apartment,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyType {
    PrimaryResidence,
    SecondaryResidence,
    VacantDwelling,
}

/// Usage of the space on the far side of an interior wall.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyUsage {
    Residential,
    Commercial,
    Other,
}

/// A month/day pair bounding the heating season.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct SeasonDate {
    pub month: u32,
    pub day: u32,
}

impl SeasonDate {
    pub fn day_of_year(&self, year: i32) -> u32 {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .expect("season date must be a valid calendar date")
            .ordinal()
    }
}

/// Per-fuel conversion factors (primary energy or CO2). Electricity used
/// for domestic hot water carries its own factor, distinct from
/// electricity used for heating.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct EnergyFactors {
    pub electricity: f64,
    pub electricity_dhw: f64,
    pub gas: f64,
    pub oil: f64,
    pub biomass: f64,
    pub district_network: f64,
    pub biogas: f64,
}

impl EnergyFactors {
    pub fn heating_factor(&self, fuel: FuelType) -> f64 {
        match fuel {
            FuelType::Electricity => self.electricity,
            FuelType::Gas => self.gas,
            FuelType::Oil => self.oil,
            FuelType::Biomass => self.biomass,
            FuelType::DistrictNetwork => self.district_network,
            FuelType::Biogas => self.biogas,
        }
    }

    pub fn dhw_factor(&self, fuel: FuelType) -> f64 {
        match fuel {
            FuelType::Electricity => self.electricity_dhw,
            _ => self.heating_factor(fuel),
        }
    }
}

/// Bounded beta distribution used by the statistical sampling of occupant
/// behavior: a draw in [0, 1] from Beta(alpha, beta) rescaled to
/// [min, max].
#[derive(Clone, Copy, Debug, Deserialize, Validate)]
pub struct BetaRange {
    pub min: f64,
    pub max: f64,
    #[validate(exclusive_minimum = 0.)]
    pub alpha: f64,
    #[validate(exclusive_minimum = 0.)]
    pub beta: f64,
}

impl BetaRange {
    pub const fn new(min: f64, max: f64, alpha: f64, beta: f64) -> Self {
        Self {
            min,
            max,
            alpha,
            beta,
        }
    }
}

/// Distribution parameters for the dwelling-level sampling models.
#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(default)]
pub struct SamplingParameters {
    /// Daily hot water draw per occupant, in litres at 40 degC
    #[validate]
    pub dhw_daily_use: BetaRange,
    /// Annual specific (appliance) electricity per dwelling, in kWh
    #[validate]
    pub specific_house: BetaRange,
    #[validate]
    pub specific_apartment: BetaRange,
    /// Annual cooking energy per dwelling, in kWh
    #[validate]
    pub cooking: BetaRange,
    /// Share of time occupants are present
    #[validate]
    pub intermittency_primary: BetaRange,
    #[validate]
    pub intermittency_secondary: BetaRange,
    /// Occupant-driven under-heating relative to the nominal set point
    #[validate]
    pub regulation_house: BetaRange,
    #[validate]
    pub regulation_apartment: BetaRange,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            dhw_daily_use: BetaRange::new(10., 150., 2.5, 4.5),
            specific_house: BetaRange::new(900., 3000., 2.5, 4.5),
            specific_apartment: BetaRange::new(700., 2600., 2., 4.5),
            cooking: BetaRange::new(200., 900., 2., 4.),
            intermittency_primary: BetaRange::new(0.6, 1., 3., 1.5),
            intermittency_secondary: BetaRange::new(0.05, 0.5, 2., 2.),
            regulation_house: BetaRange::new(0.7, 1., 2., 2.),
            regulation_apartment: BetaRange::new(0.8, 1., 2., 2.),
        }
    }
}

/// Immutable configuration for one run.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default)]
pub struct Parameters {
    /// Models to run, a prefix of the canonical model order
    pub models: Vec<ModelStage>,
    /// Resolution of the elevation model grid, in m
    #[validate(exclusive_minimum = 0.)]
    pub grid_resolution: f64,
    /// Width of the solar mask azimuth bins, in degrees
    #[validate(exclusive_minimum = 0.)]
    #[validate(maximum = 360.)]
    pub angular_resolution: f64,
    /// Half-extent of the bounding box around a boundary center inside
    /// which elevation points can obstruct it, in m
    #[validate(exclusive_minimum = 0.)]
    pub bbox_filter: f64,
    pub heating_season_start: SeasonDate,
    pub heating_season_end: SeasonDate,
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub maximal_occupant_gain_share: f64,
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub maximal_solar_gain_share: f64,
    /// Compute thermal-bridge loss factors instead of taking them as 0
    pub thermal_bridge_model: bool,
    /// Compute adjacency factors instead of taking them as 1
    pub adjacency_model: bool,
    /// Derive the heated area share from usage flags instead of taking
    /// the input column as-is
    pub derive_heated_area_share: bool,
    /// Re-sample building regulation factors from the configured beta
    /// distributions instead of taking the input column as-is
    pub sample_regulation_factors: bool,
    pub sampling_seed: u64,
    #[validate]
    pub sampling: SamplingParameters,
    pub primary_energies: EnergyFactors,
    pub co2_energies: EnergyFactors,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            models: CANONICAL_MODEL_ORDER.to_vec(),
            grid_resolution: 2.0,
            angular_resolution: 10.,
            bbox_filter: 100.,
            heating_season_start: SeasonDate { month: 10, day: 1 },
            heating_season_end: SeasonDate { month: 5, day: 20 },
            maximal_occupant_gain_share: 0.3,
            maximal_solar_gain_share: 0.3,
            thermal_bridge_model: false,
            adjacency_model: false,
            derive_heated_area_share: false,
            sample_regulation_factors: false,
            sampling_seed: 0,
            sampling: SamplingParameters::default(),
            primary_energies: EnergyFactors {
                electricity: 2.0,
                electricity_dhw: 2.0,
                gas: 1.,
                oil: 1.,
                biomass: 0.6,
                district_network: 0.6,
                biogas: 1.,
            },
            co2_energies: EnergyFactors {
                electricity: 0.079,
                electricity_dhw: 0.065,
                gas: 0.227,
                oil: 0.324,
                biomass: 0.024,
                district_network: 0.204,
                biogas: 0.024,
            },
        }
    }
}

fn deserialize_point3<'de, D>(deserializer: D) -> Result<Point3<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let [x, y, z] = <[f64; 3]>::deserialize(deserializer)?;
    Ok(Point3::new(x, y, z))
}

fn default_share_one() -> f64 {
    1.
}

fn default_true() -> bool {
    true
}

/// One row per structure. Result fields accumulate as models run.
#[derive(Clone, Debug, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub footprint: Polygon,
    /// Height above ground, in m
    pub height: f64,
    /// Ground altitude, in m
    pub altitude: f64,
    /// Heated volume, in m3
    pub volume: f64,
    /// Air change rate, in 1/h
    pub air_change_rate: f64,
    /// Living area, in m2
    pub living_area: f64,
    pub floor_count: f64,
    pub residential_type: ResidentialType,
    #[serde(default = "default_true")]
    pub residential_only: bool,
    #[serde(default)]
    pub has_annex: bool,
    #[serde(default = "default_share_one")]
    pub living_area_share: f64,
    /// Included in the simulation
    #[serde(default = "default_true")]
    pub to_sim: bool,
    pub main_heating_energy: FuelType,
    #[serde(default)]
    pub backup_heating_energy: Option<FuelType>,
    #[serde(default)]
    pub backup_heating_share: f64,
    pub main_heating_system_efficiency: f64,
    #[serde(default = "default_share_one")]
    pub backup_heating_system_efficiency: f64,
    pub dhw_energy: FuelType,
    pub cooking_energy: FuelType,
    pub actual_heating_set_point: f64,
    pub conventional_heating_set_point: f64,
    #[serde(default = "default_share_one")]
    pub intermittency_factor: f64,
    #[serde(default = "default_share_one")]
    pub regulation_factor: f64,
    #[serde(default = "default_share_one")]
    pub heated_area_share: f64,
    #[serde(skip)]
    pub results: BuildingResults,
}

/// Result columns on a building, filled stage by stage. Fields left at
/// their defaults simply mean the corresponding model has not run.
#[derive(Clone, Debug, Default)]
pub struct BuildingResults {
    pub actual_unified_degree_hours: f64,
    pub conventional_unified_degree_hours: f64,
    /// Hours of the heating season with the air below the set point
    pub heating_season_duration: f64,
    pub maximal_temperature_difference: f64,
    pub annual_ventilation_losses: f64,
    pub conventional_ventilation_losses: f64,
    pub peak_ventilation_losses: f64,
    pub annual_thermal_losses: f64,
    pub conventional_thermal_losses: f64,
    pub annual_solar_gains: f64,
    pub annual_occupant_gains: f64,
    pub conventional_occupant_gains: f64,
    pub conventional_intermittency_factor: f64,
    pub annual_heating_needs: f64,
    pub conventional_heating_needs: f64,
    pub peak_heating_needs: f64,
    pub annual_dhw_needs: f64,
    pub peak_dhw_needs: f64,
    pub conventional_dhw_needs: f64,
    pub annual_specific_needs: f64,
    pub peak_specific_needs: f64,
    pub annual_cooking_needs: f64,
    pub energy: EnergyUse,
    pub indicators: EnergyIndicators,
    pub diagnosis_class: Option<DiagnosisClass>,
}

/// One row per envelope element, foreign-keyed to a building.
#[derive(Clone, Debug, Deserialize)]
pub struct Boundary {
    pub id: BoundaryId,
    pub building_id: BuildingId,
    #[serde(rename = "type")]
    pub boundary_type: BoundaryType,
    /// Center of the element, in m (easting, northing, altitude)
    #[serde(deserialize_with = "deserialize_point3")]
    pub center: Point3<f64>,
    /// Outward normal azimuth, compass degrees
    pub azimuth: f64,
    /// Element area, in m2
    pub area: f64,
    /// In-plan length of the element, in m
    pub length: f64,
    #[serde(default)]
    pub window_share: f64,
    /// U-value of the opaque part, in W/(m2.K)
    pub u_value: f64,
    /// U-value of the glazed part, in W/(m2.K)
    #[serde(default)]
    pub window_u_value: f64,
    /// Solar factor of the glazing, 0 to 1
    #[serde(default)]
    pub window_solar_factor: f64,
    pub actual_heating_set_point: f64,
    pub conventional_heating_set_point: f64,
    #[serde(default)]
    pub adjacency_usage: Option<AdjacencyUsage>,
    #[serde(skip)]
    pub results: BoundaryResults,
}

#[derive(Clone, Debug)]
pub struct BoundaryResults {
    pub window_area: f64,
    pub opaque_area: f64,
    pub transmitted_solar_gain: f64,
    pub actual_unified_degree_hours: f64,
    pub conventional_unified_degree_hours: f64,
    pub maximal_temperature_difference: f64,
    pub adjacency_factor: f64,
    pub thermal_bridge_loss_factor: f64,
    pub loss_factor: f64,
    pub annual_thermal_losses: f64,
    pub conventional_thermal_losses: f64,
    pub peak_thermal_losses: f64,
}

impl Default for BoundaryResults {
    fn default() -> Self {
        Self {
            window_area: 0.,
            opaque_area: 0.,
            transmitted_solar_gain: 0.,
            actual_unified_degree_hours: 0.,
            conventional_unified_degree_hours: 0.,
            maximal_temperature_difference: 0.,
            adjacency_factor: 1.,
            thermal_bridge_loss_factor: 0.,
            loss_factor: 0.,
            annual_thermal_losses: 0.,
            conventional_thermal_losses: 0.,
            peak_thermal_losses: 0.,
        }
    }
}

/// One row per dwelling, feeding the dwelling-level needs models.
#[derive(Clone, Debug, Deserialize)]
pub struct Dwelling {
    pub building_id: BuildingId,
    pub living_area: f64,
    pub occupant_count: f64,
    pub occupancy_type: OccupancyType,
    pub residential_type: ResidentialType,
    #[serde(skip)]
    pub results: DwellingResults,
}

#[derive(Clone, Debug, Default)]
pub struct DwellingResults {
    pub intermittency_factor: f64,
    pub occupant_gains: f64,
    pub conventional_occupant_gains: f64,
    pub annual_dhw_needs: f64,
    pub peak_dhw_needs: f64,
    pub conventional_dhw_needs: f64,
    pub annual_specific_needs: f64,
    pub peak_specific_needs: f64,
    pub annual_cooking_needs: f64,
}

/// Deserialized shape of a building-stock input file.
#[derive(Debug, Deserialize)]
pub struct RunInput {
    pub buildings: Vec<Building>,
    pub boundaries: Vec<Boundary>,
    #[serde(default)]
    pub dwellings: Vec<Dwelling>,
    #[serde(default)]
    pub parameters: Parameters,
}

/// The building and boundary tables of one run, with the id cross
/// references resolved up front.
#[derive(Clone, Debug)]
pub struct BuildingStock {
    buildings: Vec<Building>,
    boundaries: Vec<Boundary>,
    building_positions: IndexMap<BuildingId, usize>,
    boundaries_by_building: IndexMap<BuildingId, Vec<usize>>,
}

impl BuildingStock {
    pub fn new(buildings: Vec<Building>, boundaries: Vec<Boundary>) -> Result<Self, DataError> {
        let mut building_positions = IndexMap::with_capacity(buildings.len());
        for (position, building) in buildings.iter().enumerate() {
            if building_positions.insert(building.id, position).is_some() {
                return Err(DataError::DuplicateBuildingId(building.id));
            }
            if building.to_sim {
                if building.living_area <= 0. {
                    return Err(DataError::NonPositiveLivingArea(building.id));
                }
                if building.footprint.vertex_count() < 3 {
                    return Err(DataError::DegenerateFootprint(building.id));
                }
            }
        }

        let mut boundaries_by_building: IndexMap<BuildingId, Vec<usize>> = buildings
            .iter()
            .map(|building| (building.id, Vec::new()))
            .collect();
        let mut seen_boundary_ids = IndexMap::with_capacity(boundaries.len());
        for (position, boundary) in boundaries.iter().enumerate() {
            if seen_boundary_ids.insert(boundary.id, position).is_some() {
                return Err(DataError::DuplicateBoundaryId(boundary.id));
            }
            if boundary.area < 0. {
                return Err(DataError::NegativeArea {
                    boundary_id: boundary.id,
                    area: boundary.area,
                });
            }
            if !(0. ..=1.).contains(&boundary.window_share) {
                return Err(DataError::WindowShareOutOfRange {
                    boundary_id: boundary.id,
                    value: boundary.window_share,
                });
            }
            boundaries_by_building
                .get_mut(&boundary.building_id)
                .ok_or(DataError::UnmappedBoundary {
                    boundary_id: boundary.id,
                    building_id: boundary.building_id,
                })?
                .push(position);
        }

        Ok(Self {
            buildings,
            boundaries,
            building_positions,
            boundaries_by_building,
        })
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn buildings_mut(&mut self) -> &mut [Building] {
        &mut self.buildings
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    pub fn boundaries_mut(&mut self) -> &mut [Boundary] {
        &mut self.boundaries
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.building_positions
            .get(&id)
            .map(|&position| &self.buildings[position])
    }

    /// Positions into `boundaries()` of the given building's envelope.
    pub fn boundary_positions_of(&self, id: BuildingId) -> &[usize] {
        self.boundaries_by_building
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Split borrow for the boundary loops that read building columns
    /// while mutating boundaries.
    pub fn boundaries_with_buildings_mut(&mut self) -> (&mut [Boundary], &[Building]) {
        (&mut self.boundaries, &self.buildings)
    }

    /// Split borrow for the per-building aggregation loops that read
    /// boundaries while mutating their building.
    pub fn buildings_with_boundaries_mut(
        &mut self,
    ) -> (
        &mut [Building],
        &[Boundary],
        &IndexMap<BuildingId, Vec<usize>>,
    ) {
        (
            &mut self.buildings,
            &self.boundaries,
            &self.boundaries_by_building,
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nalgebra::Point3;
    use pretty_assertions::assert_eq;
    use rstest::*;

    pub(crate) fn test_building(id: BuildingId) -> Building {
        Building {
            id,
            footprint: Polygon::from(vec![[0., 0.], [10., 0.], [10., 10.], [0., 10.]]),
            height: 6.,
            altitude: 200.,
            volume: 500.,
            air_change_rate: 0.5,
            living_area: 160.,
            floor_count: 2.,
            residential_type: ResidentialType::House,
            residential_only: true,
            has_annex: false,
            living_area_share: 1.,
            to_sim: true,
            main_heating_energy: FuelType::Gas,
            backup_heating_energy: None,
            backup_heating_share: 0.,
            main_heating_system_efficiency: 0.9,
            backup_heating_system_efficiency: 1.,
            dhw_energy: FuelType::Electricity,
            cooking_energy: FuelType::Electricity,
            actual_heating_set_point: 19.,
            conventional_heating_set_point: 19.,
            intermittency_factor: 1.,
            regulation_factor: 1.,
            heated_area_share: 1.,
            results: BuildingResults::default(),
        }
    }

    pub(crate) fn test_boundary(
        id: BoundaryId,
        building_id: BuildingId,
        boundary_type: BoundaryType,
    ) -> Boundary {
        Boundary {
            id,
            building_id,
            boundary_type,
            center: Point3::new(5., 0., 203.),
            azimuth: 180.,
            area: 20.,
            length: 10.,
            window_share: 0.,
            u_value: 1.,
            window_u_value: 2.5,
            window_solar_factor: 0.6,
            actual_heating_set_point: 19.,
            conventional_heating_set_point: 19.,
            adjacency_usage: None,
            results: BoundaryResults::default(),
        }
    }

    #[rstest]
    fn should_reject_boundary_with_unknown_building() {
        let result = BuildingStock::new(
            vec![test_building(1)],
            vec![test_boundary(10, 99, BoundaryType::ExteriorWall)],
        );
        assert_eq!(
            result.unwrap_err(),
            DataError::UnmappedBoundary {
                boundary_id: 10,
                building_id: 99
            }
        );
    }

    #[rstest]
    fn should_reject_negative_area() {
        let mut boundary = test_boundary(10, 1, BoundaryType::Roof);
        boundary.area = -4.;
        let result = BuildingStock::new(vec![test_building(1)], vec![boundary]);
        assert!(matches!(result, Err(DataError::NegativeArea { .. })));
    }

    #[rstest]
    fn should_reject_duplicate_ids() {
        let result = BuildingStock::new(vec![test_building(1), test_building(1)], vec![]);
        assert_eq!(result.unwrap_err(), DataError::DuplicateBuildingId(1));
    }

    #[rstest]
    fn should_index_boundaries_by_building() {
        let stock = BuildingStock::new(
            vec![test_building(1), test_building(2)],
            vec![
                test_boundary(10, 1, BoundaryType::ExteriorWall),
                test_boundary(11, 2, BoundaryType::Roof),
                test_boundary(12, 1, BoundaryType::Floor),
            ],
        )
        .unwrap();
        assert_eq!(stock.boundary_positions_of(1), &[0, 2]);
        assert_eq!(stock.boundary_positions_of(2), &[1]);
        assert!(stock.building(2).is_some());
        assert!(stock.building(3).is_none());
    }

    #[rstest]
    fn default_parameters_should_validate() {
        use serde_valid::Validate;
        assert!(Parameters::default().validate().is_ok());
    }

    #[rstest]
    fn fuel_types_should_deserialize_from_snake_case() {
        let fuel: FuelType = serde_json::from_str("\"district_network\"").unwrap();
        assert_eq!(fuel, FuelType::DistrictNetwork);
    }
}
