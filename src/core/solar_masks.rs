//! Solar mask engine.
//!
//! Two passes: (a) an elevation model discretizing every building outline
//! into a point cloud tagged with the roof altitude, and (b) per-boundary
//! angular masks giving, for each azimuth bin, the highest angular
//! obstruction among the cloud points near the boundary.

use crate::input::{Boundary, BoundaryId, Building, BuildingId, Parameters};
use indexmap::IndexMap;
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::debug;

/// Point cloud of building outlines at roof altitude.
///
/// Points of one building occupy a contiguous range; `polygon_ends`
/// records the exclusive end offset of each range so the mask pass can
/// tell which building a point belongs to and skip a boundary's own
/// building.
#[derive(Clone, Debug)]
pub struct ElevationModel {
    points: Vec<Point3<f64>>,
    polygon_ends: Vec<usize>,
    building_ids: Vec<BuildingId>,
}

impl ElevationModel {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Building owning the point at `position`.
    pub fn owner_of(&self, position: usize) -> BuildingId {
        let polygon = self.polygon_ends.partition_point(|&end| end <= position);
        self.building_ids[polygon]
    }
}

/// Builds the elevation model from the building footprints.
///
/// Every building contributes, included in the simulation or not: excluded
/// buildings still cast shadows on their neighbours.
pub fn elevation_model(buildings: &[Building], grid_resolution: f64) -> ElevationModel {
    let mut points = Vec::new();
    let mut polygon_ends = Vec::with_capacity(buildings.len());
    let mut building_ids = Vec::with_capacity(buildings.len());

    for building in buildings {
        let roof_altitude = building.height + building.altitude;
        points.extend(
            building
                .footprint
                .discretize_outline(grid_resolution)
                .into_iter()
                .map(|ground| Point3::new(ground.x, ground.y, roof_altitude)),
        );
        polygon_ends.push(points.len());
        building_ids.push(building.id);
    }

    ElevationModel {
        points,
        polygon_ends,
        building_ids,
    }
}

/// Angular horizon heights per solar-exposed boundary and azimuth bin.
/// Produced once, read-only afterwards.
#[derive(Clone, Debug)]
pub struct SolarMaskSet {
    angular_resolution: f64,
    bin_count: usize,
    masks: IndexMap<BoundaryId, Vec<f64>>,
}

impl SolarMaskSet {
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn boundary_count(&self) -> usize {
        self.masks.len()
    }

    pub fn bin_for(&self, azimuth: f64) -> usize {
        let bin = (azimuth.rem_euclid(360.) / self.angular_resolution) as usize;
        bin.min(self.bin_count - 1)
    }

    pub fn mask(&self, boundary: BoundaryId) -> Option<&[f64]> {
        self.masks.get(&boundary).map(Vec::as_slice)
    }

    /// Mask height seen from the boundary towards `azimuth`, 0 (fully
    /// unobstructed) when the boundary has no mask row.
    pub fn height_at(&self, boundary: BoundaryId, azimuth: f64) -> f64 {
        self.mask(boundary)
            .map(|mask| mask[self.bin_for(azimuth)])
            .unwrap_or(0.)
    }
}

/// Computes the solar mask of every solar-exposed boundary.
///
/// For each cloud point within the bounding-box filter of the boundary
/// center (own building excluded), the angular height and azimuth from
/// the center to the point are computed; the mask value of an azimuth bin
/// is the maximum angular height falling into it.
pub fn solar_mask(
    boundaries: &[Boundary],
    elevation: &ElevationModel,
    angular_resolution: f64,
    bbox_filter: f64,
) -> SolarMaskSet {
    let bin_count = (360. / angular_resolution).ceil() as usize;

    let masks: Vec<(BoundaryId, Vec<f64>)> = boundaries
        .par_iter()
        .filter(|boundary| boundary.boundary_type.is_solar_exposed())
        .map(|boundary| {
            let mut mask = vec![0.; bin_count];
            for (position, point) in elevation.points().iter().enumerate() {
                if elevation.owner_of(position) == boundary.building_id {
                    continue;
                }
                let dx = point.x - boundary.center.x;
                let dy = point.y - boundary.center.y;
                if dx.abs() > bbox_filter || dy.abs() > bbox_filter {
                    continue;
                }
                let dz = point.z - boundary.center.z;
                let distance = dx.hypot(dy);
                if dz <= 0. || distance < f64::EPSILON {
                    continue;
                }

                let height = dz.atan2(distance).to_degrees();
                let azimuth = dx.atan2(dy).to_degrees().rem_euclid(360.);
                let bin = ((azimuth / angular_resolution) as usize).min(bin_count - 1);
                if height > mask[bin] {
                    mask[bin] = height;
                }
            }
            (boundary.id, mask)
        })
        .collect();

    SolarMaskSet {
        angular_resolution,
        bin_count,
        masks: masks.into_iter().collect(),
    }
}

pub(crate) fn run_models(
    buildings: &[Building],
    boundaries: &[Boundary],
    parameters: &Parameters,
) -> anyhow::Result<SolarMaskSet> {
    let elevation = elevation_model(buildings, parameters.grid_resolution);
    debug!(
        points = elevation.len(),
        buildings = buildings.len(),
        "elevation model built"
    );
    let masks = solar_mask(
        boundaries,
        &elevation,
        parameters.angular_resolution,
        parameters.bbox_filter,
    );
    debug!(
        boundaries = masks.boundary_count(),
        bins = masks.bin_count(),
        "solar masks computed"
    );
    Ok(masks)
}
