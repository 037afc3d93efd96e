use crate::types::{CrimeRecord, Neighborhood};
use geo::bounding_rect::BoundingRect;
use geo::contains::Contains;
use geo::Point;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::BTreeMap;
use tracing::info;

// Bounding box of one neighborhood, pointing back into the dataset.
struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point-in-neighborhood lookup over an R-tree of bounding boxes.
pub struct NeighborhoodIndex {
    tree: RTree<AreaIndex>,
}

impl NeighborhoodIndex {
    pub fn build(neighborhoods: &[Neighborhood]) -> Self {
        let items: Vec<AreaIndex> = neighborhoods
            .iter()
            .enumerate()
            .filter_map(|(index, n)| {
                // Empty geometries have no box and can never contain a point.
                let rect = n.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        info!(areas = items.len(), "Built neighborhood index");
        Self { tree: RTree::bulk_load(items) }
    }

    /// Index of the neighborhood containing (lon, lat), if any.
    pub fn locate(&self, neighborhoods: &[Neighborhood], lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|&index| {
                neighborhoods
                    .get(index)
                    .is_some_and(|n| n.geometry.contains(&point))
            })
            .min()
    }

    /// Per-neighborhood incident counts by category, aligned with `neighborhoods`.
    pub fn category_counts(
        &self,
        neighborhoods: &[Neighborhood],
        crimes: &[CrimeRecord],
    ) -> Vec<BTreeMap<String, u32>> {
        let located: Vec<(usize, &str)> = crimes
            .par_iter()
            .filter_map(|crime| {
                self.locate(neighborhoods, crime.longitude, crime.latitude)
                    .map(|index| (index, crime.category.as_str()))
            })
            .collect();

        let mut counts = vec![BTreeMap::new(); neighborhoods.len()];
        for (index, category) in located {
            *counts[index].entry(category.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
