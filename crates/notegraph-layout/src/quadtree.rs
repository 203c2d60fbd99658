//! Barnes-Hut quadtree for O(n log n) repulsion approximation.
//!
//! The tree recursively subdivides space and stores center of mass per
//! cell. During force accumulation, a cell far enough away (by the theta
//! criterion) is treated as a single point, collapsing whole clusters of
//! distant nodes into one interaction.

use notegraph_core::Vec2;

/// One cell of the flattened quadtree.
#[derive(Debug, Clone, Copy)]
struct Cell {
    /// Center of mass.
    com: Vec2,
    /// Total mass (node count weighted by size).
    mass: f32,
    /// Cell side length, for the theta criterion.
    width: f32,
    /// Child indices (-1 if absent).
    children: [i32; 4],
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            com: Vec2::ZERO,
            mass: 0.0,
            width: 0.0,
            children: [-1; 4],
        }
    }
}

/// A Barnes-Hut quadtree over 2D node positions.
#[derive(Debug)]
pub struct QuadTree {
    cells: Vec<Cell>,
}

impl QuadTree {
    /// Build a quadtree from node positions and masses.
    pub fn build(positions: &[Vec2], masses: &[f32], max_depth: usize) -> Self {
        if positions.is_empty() {
            return Self {
                cells: vec![Cell::default()],
            };
        }

        // Bounding box with padding, then squared off.
        let mut min = Vec2::new(f32::MAX, f32::MAX);
        let mut max = Vec2::new(f32::MIN, f32::MIN);
        for pos in positions {
            min.x = min.x.min(pos.x);
            min.y = min.y.min(pos.y);
            max.x = max.x.max(pos.x);
            max.y = max.y.max(pos.y);
        }
        let padding = ((max.x - min.x).max(max.y - min.y) * 0.1).max(1.0);
        min.x -= padding;
        min.y -= padding;
        max.x += padding;
        max.y += padding;

        let width = (max.x - min.x).max(max.y - min.y);
        let center = Vec2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);
        let origin = Vec2::new(center.x - width / 2.0, center.y - width / 2.0);

        let mut cells = Vec::with_capacity(positions.len() * 2);
        let mut builder = TreeBuilder {
            positions,
            masses,
            cells: &mut cells,
            max_depth,
        };
        let indices: Vec<usize> = (0..positions.len()).collect();
        builder.build_cell(&indices, origin, width, 0);

        Self { cells }
    }

    /// Number of cells in the tree.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Accumulate the inverse-square repulsion force acting on a point.
    ///
    /// Walks the tree with an explicit stack; cells satisfying
    /// `width / distance < theta` contribute as a single aggregate point.
    /// Contributions closer than `min_distance` are skipped — the caller is
    /// expected to have perturbed exact overlaps already.
    pub fn repulsion_at(&self, point: Vec2, theta: f32, strength: f32, min_distance: f32) -> Vec2 {
        let mut force = Vec2::ZERO;
        if self.cells.is_empty() || self.cells[0].mass <= 0.0 {
            return force;
        }

        let mut stack: Vec<usize> = vec![0];
        while let Some(idx) = stack.pop() {
            let cell = &self.cells[idx];
            if cell.mass <= 0.0 {
                continue;
            }

            let delta = point - cell.com;
            let dist_sq = delta.length_sq();
            let dist = dist_sq.sqrt();

            let is_leaf = cell.children.iter().all(|&c| c < 0);
            if is_leaf || (dist > 0.0 && cell.width / dist < theta) {
                if dist < min_distance {
                    continue;
                }
                let magnitude = strength * cell.mass / dist_sq;
                force += delta.normalized_or_zero() * magnitude;
            } else {
                for &child in &cell.children {
                    if child >= 0 {
                        stack.push(child as usize);
                    }
                }
            }
        }

        force
    }
}

struct TreeBuilder<'a> {
    positions: &'a [Vec2],
    masses: &'a [f32],
    cells: &'a mut Vec<Cell>,
    max_depth: usize,
}

impl TreeBuilder<'_> {
    fn build_cell(&mut self, indices: &[usize], origin: Vec2, width: f32, depth: usize) -> i32 {
        if indices.is_empty() {
            return -1;
        }

        let cell_idx = self.cells.len() as i32;
        self.cells.push(Cell::default());

        let mut com = Vec2::ZERO;
        let mut mass = 0.0;
        for &i in indices {
            let m = self.masses.get(i).copied().unwrap_or(1.0).max(0.1);
            com += self.positions[i] * m;
            mass += m;
        }
        com = com * (1.0 / mass);

        if indices.len() == 1 || depth >= self.max_depth {
            self.cells[cell_idx as usize] = Cell {
                com,
                mass,
                width,
                children: [-1; 4],
            };
            return cell_idx;
        }

        let half = width / 2.0;
        let mid = Vec2::new(origin.x + half, origin.y + half);

        let mut quadrants: [Vec<usize>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
        for &i in indices {
            let pos = self.positions[i];
            let quadrant = match (pos.x < mid.x, pos.y < mid.y) {
                (true, true) => 0,   // south-west
                (true, false) => 1,  // north-west
                (false, true) => 2,  // south-east
                (false, false) => 3, // north-east
            };
            quadrants[quadrant].push(i);
        }

        let origins = [
            origin,
            Vec2::new(origin.x, mid.y),
            Vec2::new(mid.x, origin.y),
            mid,
        ];
        let mut children = [-1; 4];
        for (q, quadrant_indices) in quadrants.iter().enumerate() {
            children[q] = self.build_cell(quadrant_indices, origins[q], half, depth + 1);
        }

        self.cells[cell_idx as usize] = Cell {
            com,
            mass,
            width,
            children,
        };
        cell_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_masses(n: usize) -> Vec<f32> {
        vec![1.0; n]
    }

    #[test]
    fn empty_tree_exerts_no_force() {
        let tree = QuadTree::build(&[], &[], 10);
        assert_eq!(tree.repulsion_at(Vec2::ZERO, 0.8, 1000.0, 0.1), Vec2::ZERO);
    }

    #[test]
    fn single_node_tree() {
        let positions = vec![Vec2::new(0.0, 0.0)];
        let tree = QuadTree::build(&positions, &uniform_masses(1), 10);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn multiple_nodes_subdivide() {
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(0.0, 100.0),
            Vec2::new(100.0, 100.0),
        ];
        let tree = QuadTree::build(&positions, &uniform_masses(4), 10);
        assert!(tree.len() > 1);
    }

    #[test]
    fn repulsion_points_away_from_cluster() {
        let positions = vec![Vec2::new(10.0, 0.0), Vec2::new(12.0, 0.0)];
        let tree = QuadTree::build(&positions, &uniform_masses(2), 10);
        let force = tree.repulsion_at(Vec2::new(0.0, 0.0), 0.8, 1000.0, 0.1);
        // Cluster sits at +x; the probe point is pushed toward -x.
        assert!(force.x < 0.0);
        assert!(force.y.abs() < 1e-3);
    }

    #[test]
    fn approximation_tracks_exact_sum() {
        // A spread of nodes; BH with small theta should be close to exact.
        let positions: Vec<Vec2> = (0..50)
            .map(|i| Vec2::new((i % 10) as f32 * 40.0, (i / 10) as f32 * 40.0))
            .collect();
        let masses = uniform_masses(positions.len());
        let tree = QuadTree::build(&positions, &masses, 12);

        let probe = Vec2::new(-50.0, -50.0);
        let approx = tree.repulsion_at(probe, 0.3, 1000.0, 0.1);

        let mut exact = Vec2::ZERO;
        for pos in &positions {
            let delta = probe - *pos;
            let dist_sq = delta.length_sq();
            exact += delta.normalized_or_zero() * (1000.0 / dist_sq);
        }

        let error = (approx - exact).length() / exact.length().max(1e-6);
        assert!(error < 0.1, "relative error {error} too high");
    }
}
