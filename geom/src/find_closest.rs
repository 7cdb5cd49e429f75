use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::{Distance, Pt2D};

/// Nearest-neighbor lookup over a set of keyed points, backed by an R-tree. Built once, queried
/// many times.
pub struct FindClosest<K> {
    tree: RTree<GeomWithData<[f64; 2], K>>,
}

impl<K: Clone + PartialEq> FindClosest<K> {
    pub fn new(pts: Vec<(K, Pt2D)>) -> FindClosest<K> {
        let tree = RTree::bulk_load(
            pts.into_iter()
                .map(|(key, pt)| GeomWithData::new([pt.x(), pt.y()], key))
                .collect(),
        );
        FindClosest { tree }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds the closest point to the query point, with the straight-line distance to it.
    pub fn closest_pt(&self, query_pt: Pt2D) -> Option<(K, Distance)> {
        let nearest = self.tree.nearest_neighbor(&[query_pt.x(), query_pt.y()])?;
        let pt = Pt2D::new(nearest.geom()[0], nearest.geom()[1]);
        Some((nearest.data.clone(), query_pt.dist_to(pt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest() {
        let closest = FindClosest::new(vec![
            ("a", Pt2D::new(0.0, 0.0)),
            ("b", Pt2D::new(100.0, 0.0)),
            ("c", Pt2D::new(0.0, 300.0)),
        ]);
        let (key, dist) = closest.closest_pt(Pt2D::new(90.0, 10.0)).unwrap();
        assert_eq!(key, "b");
        assert_eq!(dist, Distance::meters((100.0f64 + 100.0).sqrt()));
    }

    #[test]
    fn empty() {
        let closest: FindClosest<usize> = FindClosest::new(Vec::new());
        assert!(closest.is_empty());
        assert!(closest.closest_pt(Pt2D::new(0.0, 0.0)).is_none());
    }
}
