//! Per-lane rules of the three parallel passes
//!
//! Each function computes the output of a single lane from read-only input
//! buffers. They reuse the sequential rules, so the parallel mapping and the
//! sequential solver differ only in buffer precision.

use crate::compatibility::compatibility_score;
use crate::forces::{PointNeighborhood, displaced_point};
use crate::geometry::Point;
use crate::graph::EdgeGeometry;
use crate::parallel::layout::GridView;
use crate::parallel::substrate::KernelParams;
use crate::subdivision::resampled_point;

/// Written into compatibility slots past the last compatible edge
pub const NO_EDGE: f32 = -1.0;

fn edge_point(points: &GridView<'_>, params: &KernelParams, edge: u32, column: u32) -> Point {
    let x = (edge / params.rows) * params.points_per_edge + column;
    points.point(x, edge % params.rows)
}

fn texel_of(point: Point) -> [f32; 4] {
    [point.x as f32, point.y as f32, point.z as f32, 0.0]
}

/// Edge owning cell `(x, y)` and the cell's column within the edge's block
fn locate(params: &KernelParams, block: u32, x: u32, y: u32) -> Option<(u32, u32)> {
    let edge = (x / block) * params.rows + y;
    (edge < params.edge_count).then_some((edge, x % block))
}

/// Compatibility lane for the edge in column block `tile`, row `row`.
///
/// Returns the edge's `capacity` slots: channel 0 holds the index of the
/// k-th compatible edge (ascending) or [`NO_EDGE`], channel 1 the edge's
/// total compatible count, which may exceed the capacity.
pub fn compatibility_lane(
    points: &GridView<'_>,
    params: &KernelParams,
    tile: u32,
    row: u32,
) -> Vec<[f32; 4]> {
    let mut slots = vec![[NO_EDGE, 0.0, 0.0, 0.0]; params.capacity as usize];
    let edge = tile * params.rows + row;
    if edge >= params.edge_count {
        return slots;
    }

    let target_column = params.previous_subdivisions + 1;
    let geometry = |e: u32| {
        EdgeGeometry::new(
            edge_point(points, params, e, 0),
            edge_point(points, params, e, target_column),
        )
    };

    let own = geometry(edge);
    let mut count = 0usize;
    for other in 0..params.edge_count {
        if other == edge {
            continue;
        }
        let theirs = geometry(other);
        let score = if edge < other {
            compatibility_score(&own, &theirs)
        } else {
            compatibility_score(&theirs, &own)
        };
        if score >= params.threshold {
            if let Some(slot) = slots.get_mut(count) {
                slot[0] = other as f32;
            }
            count += 1;
        }
    }

    for slot in &mut slots {
        slot[1] = count as f32;
    }
    slots
}

/// Subdivision lane: point `(x, y)` of the polyline resampled from
/// `previous_subdivisions` to `subdivisions` interior points.
pub fn subdivision_lane(points: &GridView<'_>, params: &KernelParams, x: u32, y: u32) -> [f32; 4] {
    let Some((edge, column)) = locate(params, params.points_per_edge, x, y) else {
        return points.texel(x, y);
    };
    if column > params.subdivisions + 1 {
        return points.texel(x, y);
    }

    // Endpoints are copied bit-for-bit
    let base = x - column;
    if column == 0 {
        return points.texel(base, y);
    }
    if column == params.subdivisions + 1 {
        return points.texel(base + params.previous_subdivisions + 1, y);
    }

    let old: Vec<Point> = (0..params.previous_subdivisions + 2)
        .map(|c| edge_point(points, params, edge, c))
        .collect();
    texel_of(resampled_point(
        &old,
        params.subdivisions as usize,
        column as usize,
    ))
}

/// Update lane: one force iteration for the subdivision point at `(x, y)`.
pub fn update_lane(
    points: &GridView<'_>,
    compatibility: &GridView<'_>,
    params: &KernelParams,
    x: u32,
    y: u32,
) -> [f32; 4] {
    let Some((edge, column)) = locate(params, params.points_per_edge, x, y) else {
        return points.texel(x, y);
    };
    if column == 0 || column > params.subdivisions {
        return points.texel(x, y);
    }

    let source = edge_point(points, params, edge, 0);
    let target = edge_point(points, params, edge, params.subdivisions + 1);
    let neighborhood = PointNeighborhood {
        prev: edge_point(points, params, edge, column - 1),
        current: points.point(x, y),
        next: edge_point(points, params, edge, column + 1),
        edge_length: EdgeGeometry::new(source, target).length(),
    };

    let tile_offset = (edge / params.rows) * params.capacity;
    let others = (0..params.capacity)
        .map(|slot| compatibility.texel(tile_offset + slot, y)[0])
        .take_while(|&index| index >= 0.0)
        .map(|index| edge_point(points, params, index as u32, column));

    texel_of(displaced_point(
        neighborhood,
        params.subdivisions as usize,
        params.stiffness,
        params.step_size,
        others,
    ))
}
