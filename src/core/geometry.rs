//! Planar footprint geometry for the elevation model.

use nalgebra::Point2;
use serde::Deserialize;

/// A building footprint: a simple closed ring of ground-plane vertices.
///
/// Consecutive duplicate vertices (including a closing vertex equal to the
/// first) are removed on construction, so the stored ring is open and
/// `edges` wraps around implicitly.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "Vec<[f64; 2]>")]
pub struct Polygon {
    exterior: Vec<Point2<f64>>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2<f64>>) -> Self {
        let mut exterior: Vec<Point2<f64>> = Vec::with_capacity(vertices.len());
        for vertex in vertices {
            if exterior.last() != Some(&vertex) {
                exterior.push(vertex);
            }
        }
        if exterior.len() > 1 && exterior.first() == exterior.last() {
            exterior.pop();
        }
        Self { exterior }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.exterior
    }

    pub fn vertex_count(&self) -> usize {
        self.exterior.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        let count = self.exterior.len();
        (0..count).map(move |i| (self.exterior[i], self.exterior[(i + 1) % count]))
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().map(|(a, b)| (b - a).norm()).sum()
    }

    /// Points along the outline spaced at most `resolution` apart.
    ///
    /// Each vertex is emitted once; edges longer than `resolution` get
    /// evenly spaced intermediate points.
    pub fn discretize_outline(&self, resolution: f64) -> Vec<Point2<f64>> {
        let mut points = Vec::new();
        for (start, end) in self.edges() {
            let length = (end - start).norm();
            let steps = (length / resolution).ceil().max(1.) as usize;
            for step in 0..steps {
                let t = step as f64 / steps as f64;
                points.push(start + (end - start) * t);
            }
        }
        points
    }
}

impl From<Vec<[f64; 2]>> for Polygon {
    fn from(vertices: Vec<[f64; 2]>) -> Self {
        Self::new(
            vertices
                .into_iter()
                .map(|[x, y]| Point2::new(x, y))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn unit_square() -> Polygon {
        Polygon::from(vec![[0., 0.], [1., 0.], [1., 1.], [0., 1.], [0., 0.]])
    }

    #[rstest]
    fn should_strip_closing_and_duplicate_vertices(unit_square: Polygon) {
        assert_eq!(unit_square.vertex_count(), 4);
        let with_duplicates =
            Polygon::from(vec![[0., 0.], [0., 0.], [1., 0.], [1., 1.], [1., 1.], [0., 1.]]);
        assert_eq!(with_duplicates, unit_square);
    }

    #[rstest]
    fn should_compute_perimeter(unit_square: Polygon) {
        assert_relative_eq!(unit_square.perimeter(), 4.0);
    }

    #[rstest]
    fn should_discretize_outline_at_resolution(unit_square: Polygon) {
        let points = unit_square.discretize_outline(0.5);
        // each 1m edge splits into two segments, vertices emitted once
        assert_eq!(points.len(), 8);
        assert!(points.contains(&Point2::new(0.5, 0.)));
        assert!(points.contains(&Point2::new(1., 0.5)));
    }

    #[rstest]
    fn should_emit_only_vertices_for_coarse_resolution(unit_square: Polygon) {
        let points = unit_square.discretize_outline(10.);
        assert_eq!(points.len(), 4);
    }
}
