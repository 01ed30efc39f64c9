use std::ops::Range;

use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 4;
const MAX_DEPTH: usize = 12;

pub(super) const ROOT: usize = 0;

/// Axis-aligned square cell, `min` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Square {
    pub(super) min: Vec2,
    pub(super) size: f32,
}

impl Square {
    /// Smallest square (plus a one unit margin) holding every point, centred
    /// on their bounding box.
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (low, high) = rest
            .iter()
            .fold((*first, *first), |(low, high), point| {
                (low.min(*point), high.max(*point))
            });
        if !(low.is_finite() && high.is_finite()) {
            return None;
        }

        let size = (high - low).max_elem().max(1.0) + 2.0;
        let middle = (low + high) * 0.5;
        Some(Self {
            min: middle - vec2(size, size) * 0.5,
            size,
        })
    }

    fn max(self) -> Vec2 {
        self.min + vec2(self.size, self.size)
    }

    fn middle(self) -> Vec2 {
        self.min + vec2(self.size, self.size) * 0.5
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let max = self.max();
        (self.min.x..=max.x).contains(&point.x) && (self.min.y..=max.y).contains(&point.y)
    }

    /// Quadrants are numbered row-major: 0 top-left, 1 top-right,
    /// 2 bottom-left, 3 bottom-right.
    fn quadrant_of(self, point: Vec2) -> usize {
        let middle = self.middle();
        usize::from(point.x >= middle.x) | (usize::from(point.y >= middle.y) << 1)
    }

    fn quadrant(self, quadrant: usize) -> Self {
        let half = self.size * 0.5;
        let column = (quadrant & 1) as f32;
        let row = (quadrant >> 1) as f32;
        Self {
            min: self.min + vec2(column * half, row * half),
            size: half,
        }
    }

    /// Squared gap between two squares; zero when they touch or overlap.
    pub(super) fn distance_sq_to(self, other: Self) -> f32 {
        let gap = (other.min - self.max())
            .max(self.min - other.max())
            .max(Vec2::ZERO);
        gap.length_sq()
    }
}

#[derive(Debug)]
pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    points: Range<usize>,
    children: [Option<usize>; 4],
}

impl Cell {
    fn new(square: Square, points: Range<usize>) -> Self {
        Self {
            square,
            center_of_mass: Vec2::ZERO,
            mass: 0.0,
            points,
            children: [None; 4],
        }
    }
}

/// Region quadtree stored as a flat arena. Point indices are kept in one
/// buffer, partitioned so every cell owns a contiguous range of it. Every body
/// has unit mass, so a cell's mass is its point count.
#[derive(Debug)]
pub(super) struct Quadtree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

impl Quadtree {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        let mut tree = Self {
            cells: vec![Cell::new(square, 0..positions.len())],
            order: (0..positions.len()).collect(),
        };

        let mut pending = vec![(ROOT, 0)];
        while let Some((id, depth)) = pending.pop() {
            let range = tree.cells[id].points.clone();
            let sum = tree.order[range.clone()]
                .iter()
                .fold(Vec2::ZERO, |sum, &index| sum + positions[index]);
            let cell = &mut tree.cells[id];
            cell.mass = range.len() as f32;
            cell.center_of_mass = sum / cell.mass;

            if depth >= MAX_DEPTH || range.len() <= LEAF_CAPACITY {
                continue;
            }

            let square = cell.square;
            let mut counts = [0; 4];
            for &index in &tree.order[range.clone()] {
                counts[square.quadrant_of(positions[index])] += 1;
            }
            // Coincident points would otherwise split down to the depth limit.
            if counts.iter().filter(|&&count| count > 0).count() <= 1 {
                continue;
            }

            tree.order[range.clone()].sort_by_key(|&index| square.quadrant_of(positions[index]));
            let mut start = range.start;
            for (quadrant, count) in counts.into_iter().enumerate() {
                if count == 0 {
                    continue;
                }
                let child = tree.cells.len();
                tree.cells
                    .push(Cell::new(square.quadrant(quadrant), start..start + count));
                tree.cells[id].children[quadrant] = Some(child);
                pending.push((child, depth + 1));
                start += count;
            }
        }

        Some(tree)
    }

    pub(super) fn cell(&self, id: usize) -> &Cell {
        &self.cells[id]
    }

    pub(super) fn is_leaf(&self, id: usize) -> bool {
        self.cells[id].children.iter().all(Option::is_none)
    }

    pub(super) fn children(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.cells[id].children.iter().flatten().copied()
    }

    /// Indices of the bodies inside cell `id`.
    pub(super) fn points(&self, id: usize) -> &[usize] {
        &self.order[self.cells[id].points.clone()]
    }

    /// Barnes-Hut acceptance test: cell `id` is far enough from `point` to be
    /// treated as a single body.
    pub(super) fn is_far(&self, id: usize, point: Vec2, distance: f32, theta: f32) -> bool {
        let square = self.cells[id].square;
        !square.contains(point) && square.size / distance < theta
    }
}
