use eframe::egui::{Vec2, vec2};

use super::quadtree::Quadtree;

const MIN_DISTANCE_SQ: f32 = 1.0;

/// Unit vector used when two bodies sit exactly on top of each other. Derived
/// from the indices so the split is repeatable.
pub(super) fn separation_direction(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

/// Spring along every link towards `distance`. Velocities are updated in
/// place, link by link, so later links see earlier corrections.
pub(super) fn apply_links(
    links: &[(usize, usize)],
    degrees: &[usize],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    distance: f32,
    alpha: f32,
) {
    for &(source, target) in links {
        if source == target {
            continue;
        }

        let mut delta =
            (positions[target] + velocities[target]) - (positions[source] + velocities[source]);
        if delta.length_sq() < f32::EPSILON {
            delta = separation_direction(source, target) * 1e-3;
        }
        let length = delta.length();

        let degree_source = degrees[source].max(1) as f32;
        let degree_target = degrees[target].max(1) as f32;
        let strength = 1.0 / degree_source.min(degree_target);
        let bias = degree_source / (degree_source + degree_target);

        let correction = delta * ((length - distance) / length * alpha * strength);
        velocities[target] -= correction * bias;
        velocities[source] += correction * (1.0 - bias);
    }
}

/// Many-body charge felt by the node at `index`, approximated with Barnes-Hut
/// over cell `cell` of `tree`. A negative `strength` repels. The magnitude
/// falls off with 1/distance.
pub(super) fn accumulate_charge(
    tree: &Quadtree,
    cell: usize,
    index: usize,
    positions: &[Vec2],
    strength: f32,
    theta: f32,
    velocity_delta: &mut Vec2,
) {
    let point = positions[index];

    if tree.is_leaf(cell) {
        for &other in tree.points(cell) {
            if other == index {
                continue;
            }
            let mut delta = positions[other] - point;
            if delta.length_sq() < f32::EPSILON {
                delta = separation_direction(index, other);
            }
            *velocity_delta += delta * (strength / delta.length_sq().max(MIN_DISTANCE_SQ));
        }
        return;
    }

    let summary = tree.cell(cell);
    let delta = summary.center_of_mass - point;
    let distance_sq = delta.length_sq().max(MIN_DISTANCE_SQ);
    if summary.mass > 1.0 && tree.is_far(cell, point, distance_sq.sqrt(), theta) {
        *velocity_delta += delta * (strength * summary.mass / distance_sq);
        return;
    }

    for child in tree.children(cell) {
        accumulate_charge(tree, child, index, positions, strength, theta, velocity_delta);
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) radius: f32,
    pub(super) strength: f32,
}

fn resolve_overlap(
    from: usize,
    to: usize,
    predicted: &[Vec2],
    params: CollisionParams,
    velocity_deltas: &mut [Vec2],
) {
    let min_distance = params.radius * 2.0;
    let mut delta = predicted[from] - predicted[to];
    let mut distance = delta.length();
    if distance >= min_distance {
        return;
    }
    if distance < 1e-3 {
        delta = separation_direction(from, to) * 1e-3;
        distance = 1e-3;
    }

    // Equal radii, so each side takes half of the overlap.
    let push = delta * ((min_distance - distance) / distance * params.strength * 0.5);
    velocity_deltas[from] += push;
    velocity_deltas[to] -= push;
}

/// Pushes apart every pair of circles (of `params.radius`) whose predicted
/// positions overlap, for bodies in cells `a` and `b` (the same cell when
/// `a == b`). Cells further apart than one diameter are pruned.
pub(super) fn accumulate_collisions(
    tree: &Quadtree,
    a: usize,
    b: usize,
    predicted: &[Vec2],
    params: CollisionParams,
    velocity_deltas: &mut [Vec2],
) {
    let reach = params.radius * 2.0;
    let (square_a, square_b) = (tree.cell(a).square, tree.cell(b).square);
    if square_a.distance_sq_to(square_b) > reach * reach {
        return;
    }

    let (leaf_a, leaf_b) = (tree.is_leaf(a), tree.is_leaf(b));
    if leaf_a && leaf_b {
        let points_a = tree.points(a);
        if a == b {
            for (i, &from) in points_a.iter().enumerate() {
                for &to in &points_a[i + 1..] {
                    resolve_overlap(from, to, predicted, params, velocity_deltas);
                }
            }
        } else {
            for &from in points_a {
                for &to in tree.points(b) {
                    resolve_overlap(from, to, predicted, params, velocity_deltas);
                }
            }
        }
        return;
    }

    if a == b {
        let children = tree.children(a).collect::<Vec<_>>();
        for (first, &child_a) in children.iter().enumerate() {
            for &child_b in &children[first..] {
                accumulate_collisions(tree, child_a, child_b, predicted, params, velocity_deltas);
            }
        }
        return;
    }

    // Descend into the larger cell, or the only one that can be split.
    if !leaf_a && (leaf_b || square_a.size >= square_b.size) {
        for child in tree.children(a) {
            accumulate_collisions(tree, child, b, predicted, params, velocity_deltas);
        }
    } else {
        for child in tree.children(b) {
            accumulate_collisions(tree, a, child, predicted, params, velocity_deltas);
        }
    }
}

/// Translates every position so the centroid lands on `center`.
pub(super) fn apply_centering(positions: &mut [Vec2], center: Vec2) {
    if positions.is_empty() {
        return;
    }

    let centroid = positions.iter().fold(Vec2::ZERO, |sum, p| sum + *p) / positions.len() as f32;
    let shift = centroid - center;
    for position in positions {
        *position -= shift;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::quadtree::ROOT;

    #[test]
    fn stretched_link_pulls_endpoints_together() {
        let positions = vec![vec2(0.0, 0.0), vec2(1000.0, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        apply_links(&[(0, 1)], &[1, 1], &positions, &mut velocities, 360.0, 1.0);

        assert!(velocities[0].x > 0.0);
        assert!(velocities[1].x < 0.0);
        assert_eq!(velocities[0].y, 0.0);
    }

    #[test]
    fn compressed_link_pushes_endpoints_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(100.0, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        apply_links(&[(0, 1)], &[1, 1], &positions, &mut velocities, 360.0, 1.0);

        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
    }

    #[test]
    fn charge_repels_and_weakens_with_distance() {
        let near = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let far = vec![vec2(0.0, 0.0), vec2(100.0, 0.0)];

        let push = |positions: &[Vec2]| {
            let tree = Quadtree::build(positions).unwrap();
            let mut delta = Vec2::ZERO;
            accumulate_charge(&tree, ROOT, 0, positions, -30.0, 0.9, &mut delta);
            delta
        };

        let near_push = push(&near);
        let far_push = push(&far);
        assert!(near_push.x < 0.0);
        assert!(far_push.x < 0.0);
        assert!(near_push.x.abs() > far_push.x.abs());
        assert!((near_push.x - -3.0).abs() < 1e-4);
    }

    #[test]
    fn overlapping_circles_are_separated() {
        let predicted = vec![vec2(0.0, 0.0), vec2(100.0, 0.0), vec2(5000.0, 0.0)];
        let tree = Quadtree::build(&predicted).unwrap();
        let mut deltas = vec![Vec2::ZERO; 3];
        accumulate_collisions(
            &tree,
            ROOT,
            ROOT,
            &predicted,
            CollisionParams {
                radius: 180.0,
                strength: 1.0,
            },
            &mut deltas,
        );

        assert!((deltas[0] - vec2(-130.0, 0.0)).length() < 1e-3);
        assert!((deltas[1] - vec2(130.0, 0.0)).length() < 1e-3);
        assert_eq!(deltas[2], Vec2::ZERO);
    }

    #[test]
    fn centering_moves_centroid() {
        let mut positions = vec![vec2(0.0, 0.0), vec2(100.0, 50.0)];
        apply_centering(&mut positions, vec2(500.0, 500.0));
        assert_eq!(positions, vec![vec2(450.0, 475.0), vec2(550.0, 525.0)]);
    }
}
