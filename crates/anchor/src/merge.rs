//! Collapse fragmented image placements into single logical images.
//!
//! Many documents paint one figure as several adjacent or overlapping
//! XObjects (tiles, strips, clipped slices). Images whose boxes overlap or
//! sit within `tolerance` points of each other on both axes are clustered
//! with a union-find and replaced by their bounding envelope.

use crate::types::{BoundingBox, ImageElement};

/// Default merge distance, in points.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Disjoint-set forest over `0..n`, scoped to one merge call.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    /// Root of `i`, compressing the path on the way.
    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    fn union(&mut self, i: usize, j: usize) {
        let root_i = self.find(i);
        let root_j = self.find(j);
        if root_i != root_j {
            self.parent[root_i] = root_j;
        }
    }
}

/// Gap between two boxes along each axis, zero when they overlap.
fn gaps(b1: &BoundingBox, b2: &BoundingBox) -> (f64, f64) {
    let h = (b1.x0.max(b2.x0) - b1.x1.min(b2.x1)).max(0.0);
    let v = (b1.y0.max(b2.y0) - b1.y1.min(b2.y1)).max(0.0);
    (h, v)
}

/// `true` when the boxes overlap or are within `tolerance` on both axes.
pub fn boxes_touch(b1: &BoundingBox, b2: &BoundingBox, tolerance: f64) -> bool {
    let (h, v) = gaps(b1, b2);
    h <= tolerance && v <= tolerance
}

/// Merge touching images into one element per cluster.
///
/// Clusters come out in the order their first member appears. Inside a
/// cluster, names are joined with `+` in index order and the box is the
/// min/max envelope of every member.
pub fn merge_image_elements(images: &[ImageElement], tolerance: f64) -> Vec<ImageElement> {
    let n = images.len();
    let mut sets = UnionFind::new(n);

    for i in 0..n {
        for j in (i + 1)..n {
            if boxes_touch(&images[i].bbox, &images[j].bbox, tolerance) {
                sets.union(i, j);
            }
        }
    }

    // (root, member indices) in order of first appearance.
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..n {
        let root = sets.find(i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(i),
            None => groups.push((root, vec![i])),
        }
    }

    groups
        .into_iter()
        .map(|(_, members)| {
            let first = &images[members[0]];
            let mut bbox = first.bbox;
            let mut name = first.name.clone();
            for &idx in &members[1..] {
                bbox = bbox.union(&images[idx].bbox);
                name.push('+');
                name.push_str(&images[idx].name);
            }
            if members.len() > 1 {
                log::trace!("merged {} image placements into {}", members.len(), name);
            }
            ImageElement { name, bbox }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(name: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> ImageElement {
        ImageElement::new(name, BoundingBox::new(x0, y0, x1, y1))
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_image_elements(&[], DEFAULT_TOLERANCE).is_empty());
    }

    #[test]
    fn test_merge_single_unchanged() {
        let images = vec![img("Im0", 1.0, 2.0, 3.0, 4.0)];
        assert_eq!(merge_image_elements(&images, DEFAULT_TOLERANCE), images);
    }

    #[test]
    fn test_merge_within_tolerance() {
        let images = vec![
            img("A", 0.0, 0.0, 10.0, 10.0),
            img("B", 10.2, 0.0, 20.0, 10.0),
        ];

        let merged = merge_image_elements(&images, 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, BoundingBox::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(merged[0].name, "A+B");
    }

    #[test]
    fn test_merge_outside_tolerance() {
        let images = vec![
            img("A", 0.0, 0.0, 10.0, 10.0),
            img("B", 10.2, 0.0, 20.0, 10.0),
        ];

        let merged = merge_image_elements(&images, 0.1);
        assert_eq!(merged, images);
    }

    #[test]
    fn test_merge_requires_both_axes() {
        // Aligned horizontally but far apart vertically.
        let images = vec![
            img("A", 0.0, 0.0, 10.0, 10.0),
            img("B", 0.0, 50.0, 10.0, 60.0),
        ];
        assert_eq!(merge_image_elements(&images, 0.5).len(), 2);
    }

    #[test]
    fn test_merge_overlapping() {
        let images = vec![
            img("A", 0.0, 0.0, 10.0, 10.0),
            img("B", 5.0, 5.0, 15.0, 15.0),
        ];
        let merged = merge_image_elements(&images, 0.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, BoundingBox::new(0.0, 0.0, 15.0, 15.0));
    }

    #[test]
    fn test_merge_transitive_chain() {
        // A touches B, B touches C, A does not touch C directly.
        let images = vec![
            img("A", 0.0, 0.0, 10.0, 10.0),
            img("C", 20.0, 0.0, 30.0, 10.0),
            img("B", 10.0, 0.0, 20.0, 10.0),
        ];
        let merged = merge_image_elements(&images, 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "A+C+B");
        assert_eq!(merged[0].bbox, BoundingBox::new(0.0, 0.0, 30.0, 10.0));
    }

    #[test]
    fn test_merge_cluster_order_follows_first_member() {
        let images = vec![
            img("Far", 500.0, 500.0, 510.0, 510.0),
            img("Left", 0.0, 0.0, 10.0, 10.0),
            img("Right", 10.0, 0.0, 20.0, 10.0),
        ];
        let merged = merge_image_elements(&images, 0.5);
        let names: Vec<&str> = merged.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Far", "Left+Right"]);
    }

    #[test]
    fn test_union_find_path_compression() {
        let mut sets = UnionFind::new(4);
        sets.union(0, 1);
        sets.union(1, 2);
        sets.union(2, 3);
        let root = sets.find(0);
        assert_eq!(root, 3);
        assert_eq!(sets.parent[0], 3);
    }
}
