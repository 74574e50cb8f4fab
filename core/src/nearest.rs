//! Nearest-point lookup over the projected coordinates.
//!
//! Both implementations return the index minimizing squared Euclidean
//! distance to the query, resolving ties to the lowest index. Non-finite
//! queries and empty point sets have no nearest point.

use crate::Point;

pub trait NearestPoint {
    fn nearest(&self, query: Point) -> Option<usize>;
}

fn dist2(a: Point, b: Point) -> f64 {
    let dx = a[0] as f64 - b[0] as f64;
    let dy = a[1] as f64 - b[1] as f64;
    dx * dx + dy * dy
}

fn closer(candidate: (f64, usize), best: Option<(f64, usize)>) -> bool {
    match best {
        None => true,
        Some((bd, bi)) => candidate.0 < bd || (candidate.0 == bd && candidate.1 < bi),
    }
}

/// Full scan over every point.
pub fn closest_point(points: &[Point], query: Point) -> Option<usize> {
    if !query.iter().all(|c| c.is_finite()) {
        return None;
    }
    let mut best: Option<(f64, usize)> = None;
    for (i, p) in points.iter().enumerate() {
        let d = dist2(*p, query);
        // strict comparison keeps the first index on ties
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, i));
        }
    }
    best.map(|(_, i)| i)
}

pub struct LinearScan<'a> {
    points: &'a [Point],
}

impl<'a> LinearScan<'a> {
    pub fn new(points: &'a [Point]) -> Self {
        Self { points }
    }
}

impl NearestPoint for LinearScan<'_> {
    fn nearest(&self, query: Point) -> Option<usize> {
        closest_point(self.points, query)
    }
}

#[derive(Debug, Clone)]
struct Node {
    index: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static 2D k-d tree built once over the table's points.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Point>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    pub fn build(points: Vec<Point>) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = Self::build_rec(&points, &mut order[..], 0, &mut nodes);
        Self { points, nodes, root }
    }

    fn build_rec(points: &[Point], order: &mut [usize], depth: usize, nodes: &mut Vec<Node>) -> Option<usize> {
        if order.is_empty() {
            return None;
        }
        let axis = depth % 2;
        order.sort_by(|a, b| points[*a][axis].total_cmp(&points[*b][axis]).then(a.cmp(b)));
        let mid = order.len() / 2;
        let index = order[mid];
        let (lo, rest) = order.split_at_mut(mid);
        let hi = &mut rest[1..];
        let slot = nodes.len();
        nodes.push(Node { index, axis, left: None, right: None });
        let left = Self::build_rec(points, lo, depth + 1, nodes);
        let right = Self::build_rec(points, hi, depth + 1, nodes);
        nodes[slot].left = left;
        nodes[slot].right = right;
        Some(slot)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn search(&self, slot: usize, query: Point, best: &mut Option<(f64, usize)>) {
        let node = &self.nodes[slot];
        let p = self.points[node.index];
        let candidate = (dist2(p, query), node.index);
        if closer(candidate, *best) {
            *best = Some(candidate);
        }
        let diff = query[node.axis] as f64 - p[node.axis] as f64;
        let (near, far) = if diff < 0.0 { (node.left, node.right) } else { (node.right, node.left) };
        if let Some(n) = near {
            self.search(n, query, best);
        }
        if let Some(f) = far {
            // equal distances may still hold a lower index on the far side
            if best.map_or(true, |(bd, _)| diff * diff <= bd) {
                self.search(f, query, best);
            }
        }
    }
}

impl NearestPoint for KdTree {
    fn nearest(&self, query: Point) -> Option<usize> {
        if !query.iter().all(|c| c.is_finite()) {
            return None;
        }
        let mut best = None;
        if let Some(root) = self.root {
            self.search(root, query, &mut best);
        }
        best.map(|(_, i)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // xorshift, enough to scatter test points
    fn scatter(n: usize, seed: u64) -> Vec<Point> {
        let mut s = seed;
        let mut next = || {
            s ^= s << 13;
            s ^= s >> 7;
            s ^= s << 17;
            ((s % 2000) as f32 / 100.0) - 10.0
        };
        (0..n).map(|_| [next(), next()]).collect()
    }

    #[test]
    fn linear_scan_prefers_lowest_index_on_ties() {
        let pts = vec![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0]];
        assert_eq!(closest_point(&pts, [0.0, 0.0]), Some(0));
        assert_eq!(closest_point(&pts, [-0.9, 0.0]), Some(1));
        assert_eq!(closest_point(&[], [0.0, 0.0]), None);
        assert_eq!(closest_point(&pts, [f32::NAN, 0.0]), None);
    }

    #[test]
    fn kd_tree_agrees_with_linear_scan() {
        let pts = scatter(500, 0x9e3779b97f4a7c15);
        let tree = KdTree::build(pts.clone());
        let linear = LinearScan::new(&pts);
        for q in scatter(300, 42) {
            assert_eq!(tree.nearest(q), linear.nearest(q), "query {q:?}");
        }
        for (i, p) in pts.iter().enumerate() {
            let found = tree.nearest(*p).unwrap();
            assert_eq!(found, closest_point(&pts, *p).unwrap());
            assert!(found <= i);
        }
    }

    #[test]
    fn kd_tree_ties_resolve_to_lowest_index() {
        let pts = vec![[2.0, 2.0], [0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        let tree = KdTree::build(pts);
        assert_eq!(tree.nearest([0.0, 0.0]), Some(1));
        assert_eq!(tree.nearest([0.5, 0.5]), Some(1));
        assert_eq!(KdTree::build(vec![]).nearest([0.0, 0.0]), None);
    }
}
