//! Octree spatial sampler.
//!
//! A depth-bounded octree used as a 3-D Poisson-disk-like sampler: build an empty tree to
//! a fixed leaf radius, prune leaves outside a target sphere, toggle leaf validity until
//! exactly `N` cells remain, then emit one jittered point per valid leaf. This is a flat
//! arena (`Vec<OctreeNode>`) rather than a pointer tree; child links are indices into
//! that arena and the "home" pointer is a plain `usize`.

use crate::error::{GenError, Result};
use crate::pool::ThreadPool;
use crate::random::Engine;
use rand::Rng;
use rand::seq::SliceRandom;

pub type Point = [f64; 3];

fn length(p: Point) -> f64 {
    (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
}

/// One node of the arena-backed octree. Children are `None` for a
/// leaf; `points` holds the jittered stellar-slot positions generated at that leaf (one
/// per leaf in practice, but the field stays a `Vec` to support `query`'s multi-point
/// results); `links` holds arena indices into whatever owner (e.g. `Universe`'s
/// `StellarSystem` array) has been bound to this leaf.
#[derive(Debug, Clone)]
pub struct OctreeNode {
    pub center: Point,
    pub radius: f64,
    pub valid: bool,
    pub children: Option<[u32; 8]>,
    pub points: Vec<Point>,
    pub links: Vec<usize>,
}

impl OctreeNode {
    fn leaf(center: Point, radius: f64) -> Self {
        OctreeNode {
            center,
            radius,
            valid: true,
            children: None,
            points: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// AABB containment test.
    pub fn contains(&self, p: Point) -> bool {
        (0..3).all(|i| p[i] >= self.center[i] - self.radius && p[i] <= self.center[i] + self.radius)
    }

    fn intersects_sphere(&self, p: Point, r: f64) -> bool {
        let mut dist_sq = 0.0;
        for i in 0..3 {
            let lo = self.center[i] - self.radius;
            let hi = self.center[i] + self.radius;
            let closest = p[i].clamp(lo, hi);
            let d = p[i] - closest;
            dist_sq += d * d;
        }
        dist_sq.sqrt() <= r
    }
}

/// Arena-backed octree. Node `0` is always the root.
pub struct Octree {
    nodes: Vec<OctreeNode>,
}

const CHILD_OFFSETS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0],
    [1.0, 1.0, 1.0],
];

/// Build a self-contained subtree as its own small arena (root at local index 0),
/// recursing sequentially. Used both for the non-parallel fallback and as the unit of
/// work handed to the thread pool for each of the root's 8 children.
fn build_subtree_arena(center: Point, radius: f64, leaf_radius: f64, depth: u32) -> Vec<OctreeNode> {
    if radius <= leaf_radius || depth == 0 {
        return vec![OctreeNode::leaf(center, radius)];
    }

    let mut arena = vec![OctreeNode::leaf(center, radius)];
    let next_radius = radius * 0.5;
    let mut child_indices = [0u32; 8];

    for (i, offset) in CHILD_OFFSETS.iter().enumerate() {
        let child_center = [
            center[0] + offset[0] * next_radius,
            center[1] + offset[1] * next_radius,
            center[2] + offset[2] * next_radius,
        ];
        let subtree = build_subtree_arena(child_center, next_radius, leaf_radius, depth - 1);
        let base = arena.len() as u32;
        child_indices[i] = base;
        arena.extend(reindexed(subtree, base));
    }

    arena[0].children = Some(child_indices);
    arena
}

/// Shift every child-index reference in a just-built subtree arena by `base` so it can be
/// spliced into a larger arena starting at that offset.
fn reindexed(mut arena: Vec<OctreeNode>, base: u32) -> Vec<OctreeNode> {
    for node in &mut arena {
        if let Some(children) = &mut node.children {
            for c in children.iter_mut() {
                *c += base;
            }
        }
    }
    arena
}

impl Octree {
    /// Builds a full tree to depth `ceil(log2(root_radius / leaf_radius))`, every leaf
    /// initially valid. The root's 8 children are built in parallel via `pool`; each
    /// child's own subtree is then built sequentially within its worker.
    pub fn build_empty(root_radius: f64, leaf_radius: f64, pool: &ThreadPool) -> Octree {
        let depth = (root_radius / leaf_radius).log2().ceil() as u32;
        if depth == 0 {
            return Octree {
                nodes: vec![OctreeNode::leaf([0.0, 0.0, 0.0], root_radius)],
            };
        }

        let next_radius = root_radius * 0.5;
        let handles: Vec<_> = CHILD_OFFSETS
            .iter()
            .map(|&offset| {
                let child_center = [offset[0] * next_radius, offset[1] * next_radius, offset[2] * next_radius];
                pool.submit(move || build_subtree_arena(child_center, next_radius, leaf_radius, depth - 1))
            })
            .collect();

        let mut nodes = vec![OctreeNode::leaf([0.0, 0.0, 0.0], root_radius)];
        let mut child_indices = [0u32; 8];
        for (i, handle) in handles.into_iter().enumerate() {
            let subtree = handle.join();
            let base = nodes.len() as u32;
            child_indices[i] = base;
            nodes.extend(reindexed(subtree, base));
        }
        nodes[0].children = Some(child_indices);

        Octree { nodes }
    }

    fn child_indices(&self, node: usize) -> [usize; 8] {
        match self.nodes[node].children {
            Some(children) => children.map(|c| c as usize),
            None => [node; 8], // never dereferenced: callers check `is_leaf()` first
        }
    }

    fn leaf_indices(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&i| self.nodes[i].is_leaf()).collect()
    }

    /// Count of currently-valid leaves.
    pub fn valid_leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf() && n.valid).count()
    }

    /// Total stored points across every leaf.
    pub fn point_count(&self) -> usize {
        self.nodes.iter().map(|n| n.points.len()).sum()
    }

    /// Pre-order visitor over every node.
    pub fn traverse<F: FnMut(&OctreeNode)>(&self, mut f: F) {
        self.traverse_from(0, &mut f);
    }

    fn traverse_from<F: FnMut(&OctreeNode)>(&self, node: usize, f: &mut F) {
        f(&self.nodes[node]);
        if !self.nodes[node].is_leaf() {
            for child in self.child_indices(node) {
                self.traverse_from(child, f);
            }
        }
    }

    fn traverse_mut_from<F: FnMut(&mut OctreeNode)>(&mut self, node: usize, f: &mut F) {
        f(&mut self.nodes[node]);
        if !self.nodes[node].is_leaf() {
            for child in self.child_indices(node) {
                self.traverse_mut_from(child, f);
            }
        }
    }

    /// Depth-first search for the first node containing `p` that satisfies `pred`.
    pub fn find<F: Fn(&OctreeNode) -> bool>(&self, p: Point, pred: F) -> Option<usize> {
        self.find_from(0, p, &pred)
    }

    fn find_from<F: Fn(&OctreeNode) -> bool>(&self, node: usize, p: Point, pred: &F) -> Option<usize> {
        let n = &self.nodes[node];
        if n.contains(p) && pred(n) {
            return Some(node);
        }
        if !n.is_leaf() {
            for child in self.child_indices(node) {
                if let Some(found) = self.find_from(child, p, pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Points within `r` of `p`, excluding `p` itself, found by recursive pruning against
    /// each node's AABB/sphere intersection.
    pub fn query(&self, p: Point, r: f64) -> Vec<Point> {
        let mut results = Vec::new();
        self.query_from(0, p, r, &mut results);
        results
    }

    fn query_from(&self, node: usize, p: Point, r: f64, out: &mut Vec<Point>) {
        let n = &self.nodes[node];
        if n.is_leaf() {
            for &stored in &n.points {
                if stored != p && length([stored[0] - p[0], stored[1] - p[1], stored[2] - p[2]]) <= r {
                    out.push(stored);
                }
            }
            return;
        }
        for child in self.child_indices(node) {
            if self.nodes[child].intersects_sphere(p, r) {
                self.query_from(child, p, r, out);
            }
        }
    }

    pub fn node(&self, index: usize) -> &OctreeNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut OctreeNode {
        &mut self.nodes[index]
    }
}

/// Derived parameters for the octree sampler: target sample count `n`,
/// minimum inter-sample spacing `delta`, and density `rho` together fix the sampling
/// sphere's radius, the leaf edge length, and the tree depth needed to reach it.
#[derive(Debug, Clone, Copy)]
pub struct SamplerParams {
    pub sample_count: usize,
    pub min_distance: f64,
    pub density: f64,
}

impl SamplerParams {
    pub fn sample_radius(&self) -> f64 {
        (3.0 * self.sample_count as f64 / (4.0 * std::f64::consts::PI * self.density)).cbrt()
    }

    pub fn leaf_edge(&self) -> f64 {
        (1.0 / self.density).cbrt()
    }

    fn root_radius(&self) -> f64 {
        let leaf_edge = self.leaf_edge();
        let exponent = (self.sample_radius() / leaf_edge).log2().ceil();
        leaf_edge * 2f64.powf(exponent)
    }
}

/// Runs the full sampling algorithm: build the empty tree, prune to the target sphere,
/// toggle leaf validity until exactly `params.sample_count` leaves remain, jitter one
/// point per valid leaf, and pin the leaf nearest `(leaf_radius, leaf_radius,
/// leaf_radius)` to the origin as the "home" system's slot.
///
/// Returns `GenError::OctreeStalled` if a full pass over every leaf toggles nothing —
/// the shell band at the current `sample_radius` has run out of candidates before
/// `params.sample_count` was reached, which otherwise would spin the toggling loop
/// forever.
pub fn sample(params: SamplerParams, engine: &mut Engine, pool: &ThreadPool) -> Result<Octree> {
    let root_radius = params.root_radius();
    let leaf_radius = params.leaf_edge() * 0.5;
    let sample_radius = params.sample_radius();

    let mut tree = Octree::build_empty(root_radius, leaf_radius, pool);

    invalidate_outside(&mut tree, sample_radius);

    let mut valid_count = tree.valid_leaf_count();
    while valid_count != params.sample_count {
        let mut leaves = tree.leaf_indices();
        leaves.shuffle(engine);
        let before = valid_count;

        if valid_count < params.sample_count {
            for &idx in &leaves {
                let n = tree.node(idx);
                let dist = length(n.center);
                if !n.valid && dist >= sample_radius && dist <= sample_radius + leaf_radius {
                    tree.node_mut(idx).valid = true;
                    valid_count += 1;
                    if valid_count == params.sample_count {
                        break;
                    }
                }
            }
        } else {
            for &idx in &leaves {
                let n = tree.node(idx);
                let dist = length(n.center);
                if n.valid && dist >= sample_radius - leaf_radius && dist <= sample_radius {
                    tree.node_mut(idx).valid = false;
                    valid_count -= 1;
                    if valid_count == params.sample_count {
                        break;
                    }
                }
            }
        }

        if valid_count == before {
            log::error!(
                "octree sampler stalled at {valid_count} valid leaves, target was {}",
                params.sample_count
            );
            return Err(GenError::OctreeStalled {
                requested: params.sample_count,
                reached: valid_count,
            });
        }
    }

    jitter_points(&mut tree, leaf_radius, params.min_distance, engine);
    pin_home_leaf(&mut tree, leaf_radius);

    Ok(tree)
}

fn invalidate_outside(tree: &mut Octree, sample_radius: f64) {
    let mut f = |n: &mut OctreeNode| {
        if n.is_leaf() && length(n.center) > sample_radius {
            n.valid = false;
        }
    };
    tree.traverse_mut_from(0, &mut f);
}

fn jitter_points(tree: &mut Octree, leaf_radius: f64, min_distance: f64, engine: &mut Engine) {
    let low = -leaf_radius;
    let high = leaf_radius - min_distance;
    let mut f = |n: &mut OctreeNode| {
        if n.is_leaf() && n.valid {
            let offset = [
                engine.gen_range(low..high),
                engine.gen_range(low..high),
                engine.gen_range(low..high),
            ];
            n.points.push([n.center[0] + offset[0], n.center[1] + offset[1], n.center[2] + offset[2]]);
        }
    };
    tree.traverse_mut_from(0, &mut f);
}

/// Reserves the "home" system's slot: the leaf containing `(leaf_radius, leaf_radius,
/// leaf_radius)` has its stored point replaced with the origin.
fn pin_home_leaf(tree: &mut Octree, leaf_radius: f64) {
    let probe = [leaf_radius, leaf_radius, leaf_radius];
    if let Some(idx) = tree.find(probe, |n| n.is_leaf()) {
        let node = tree.node_mut(idx);
        node.points.clear();
        node.points.push([0.0, 0.0, 0.0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn small_pool() -> ThreadPool {
        ThreadPool::new(2)
    }

    #[test]
    fn build_empty_creates_leaves_at_requested_radius() {
        let pool = small_pool();
        let tree = Octree::build_empty(8.0, 1.0, &pool);
        assert!(tree.valid_leaf_count() > 0);
        tree.traverse(|n| {
            if n.is_leaf() {
                assert!(n.radius <= 1.0 + 1e-9);
            }
        });
    }

    #[test]
    fn sample_reaches_exact_target_count() {
        let pool = small_pool();
        let params = SamplerParams {
            sample_count: 50,
            min_distance: 0.1,
            density: 0.5,
        };
        let mut engine = Engine::seed_from_u64(99);
        let tree = sample(params, &mut engine, &pool).expect("reaches target count");
        assert_eq!(tree.point_count(), 50);
    }

    #[test]
    fn sample_includes_origin_for_home_system() {
        let pool = small_pool();
        let params = SamplerParams {
            sample_count: 30,
            min_distance: 0.1,
            density: 0.5,
        };
        let mut engine = Engine::seed_from_u64(7);
        let tree = sample(params, &mut engine, &pool).expect("reaches target count");
        let mut found_origin = false;
        tree.traverse(|n| {
            if n.points.iter().any(|&p| p == [0.0, 0.0, 0.0]) {
                found_origin = true;
            }
        });
        assert!(found_origin);
    }

    #[test]
    fn sample_points_stay_within_radius_plus_half_leaf() {
        let pool = small_pool();
        let params = SamplerParams {
            sample_count: 40,
            min_distance: 0.1,
            density: 0.5,
        };
        let mut engine = Engine::seed_from_u64(3);
        let tree = sample(params, &mut engine, &pool).expect("reaches target count");
        let bound = params.sample_radius() + params.leaf_edge() * 0.5 + params.leaf_edge();
        tree.traverse(|n| {
            for &p in &n.points {
                assert!(length(p) <= bound);
            }
        });
    }

    #[test]
    fn query_excludes_the_query_point_itself() {
        let pool = small_pool();
        let params = SamplerParams {
            sample_count: 60,
            min_distance: 0.05,
            density: 0.8,
        };
        let mut engine = Engine::seed_from_u64(11);
        let tree = sample(params, &mut engine, &pool).expect("reaches target count");

        let mut all_points = Vec::new();
        tree.traverse(|n| all_points.extend(n.points.iter().copied()));

        for &p in &all_points {
            let neighbors = tree.query(p, 1000.0);
            assert!(!neighbors.contains(&p));
        }
    }
}
