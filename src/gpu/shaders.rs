//! WGSL compute shaders for the bundling kernels
//!
//! Buffers are `array<vec4<f32>>` laid out row-major as 2D grids. Each kernel
//! is compiled as its own module from [`COMMON`] plus its bindings and entry
//! point.

use crate::parallel::Kernel;

/// Parameter struct, layout helpers and compatibility math shared by all kernels
pub const COMMON: &str = r#"
struct Params {
    edge_count: u32,
    rows: u32,
    tiles: u32,
    points_per_edge: u32,
    capacity: u32,
    subdivisions: u32,
    previous_subdivisions: u32,
    _padding: u32,
    stiffness: f32,
    step_size: f32,
    threshold: f32,
    epsilon: f32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> points_in: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> cells_out: array<vec4<f32>>;

fn point_columns() -> u32 {
    return params.points_per_edge * params.tiles;
}

fn point_index(edge: u32, column: u32) -> u32 {
    let x = (edge / params.rows) * params.points_per_edge + column;
    let y = edge % params.rows;
    return y * point_columns() + x;
}

fn load_point(edge: u32, column: u32) -> vec3<f32> {
    return points_in[point_index(edge, column)].xyz;
}

fn floored_length(a: vec3<f32>, b: vec3<f32>) -> f32 {
    return max(distance(a, b), params.epsilon);
}
"#;

/// Compatibility kernel: one lane per edge writes its capacity slots
pub const COMPATIBILITY: &str = r#"
fn project_onto_line(p: vec3<f32>, start_pt: vec3<f32>, end_pt: vec3<f32>) -> vec3<f32> {
    let direction = end_pt - start_pt;
    let denom = max(dot(direction, direction), params.epsilon * params.epsilon);
    let r = dot(p - start_pt, direction) / denom;
    return start_pt + direction * r;
}

fn edge_visibility(ps: vec3<f32>, pt: vec3<f32>, qs: vec3<f32>, qt: vec3<f32>) -> f32 {
    let i0 = project_onto_line(qs, ps, pt);
    let i1 = project_onto_line(qt, ps, pt);
    let mid_i = (i0 + i1) / 2.0;
    let mid_p = (ps + pt) / 2.0;
    let span = max(distance(i0, i1), params.epsilon);
    return max(1.0 - 2.0 * distance(mid_p, mid_i) / span, 0.0);
}

fn compatibility_score(ps: vec3<f32>, pt: vec3<f32>, qs: vec3<f32>, qt: vec3<f32>) -> f32 {
    let a = floored_length(ps, pt);
    let b = floored_length(qs, qt);
    let lavg = (a + b) / 2.0;

    let angle_c = abs(dot(pt - ps, qt - qs) / (a * b));
    let scale_c = 2.0 / (lavg / min(a, b) + max(a, b) / lavg);
    let position_c = lavg / (lavg + distance((ps + pt) / 2.0, (qs + qt) / 2.0));
    let visibility_c = min(edge_visibility(ps, pt, qs, qt), edge_visibility(qs, qt, ps, pt));

    return angle_c * scale_c * position_c * visibility_c;
}

@compute @workgroup_size(8, 8)
fn compatibility(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let tile = global_id.x;
    let row = global_id.y;
    if (tile >= params.tiles || row >= params.rows) {
        return;
    }

    let edge = tile * params.rows + row;
    let base = row * params.capacity * params.tiles + tile * params.capacity;
    let end_column = params.previous_subdivisions + 1u;

    var count = 0u;
    if (edge < params.edge_count) {
        let ps = load_point(edge, 0u);
        let pt = load_point(edge, end_column);
        for (var other = 0u; other < params.edge_count; other++) {
            if (other == edge) {
                continue;
            }
            let qs = load_point(other, 0u);
            let qt = load_point(other, end_column);

            // Canonical (lower, higher) order keeps the relation symmetric
            var score: f32;
            if (edge < other) {
                score = compatibility_score(ps, pt, qs, qt);
            } else {
                score = compatibility_score(qs, qt, ps, pt);
            }

            if (score >= params.threshold) {
                if (count < params.capacity) {
                    cells_out[base + count] = vec4<f32>(f32(other), 0.0, 0.0, 0.0);
                }
                count++;
            }
        }
    }

    for (var slot = 0u; slot < params.capacity; slot++) {
        var neighbor = -1.0;
        if (slot < count) {
            neighbor = cells_out[base + slot].x;
        }
        cells_out[base + slot] = vec4<f32>(neighbor, f32(count), 0.0, 0.0);
    }
}
"#;

/// Subdivision kernel: resamples each polyline to `subdivisions` interior points
pub const SUBDIVISION: &str = r#"
@compute @workgroup_size(8, 8)
fn subdivision(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let width = point_columns();
    if (global_id.x >= width || global_id.y >= params.rows) {
        return;
    }

    let cell = global_id.y * width + global_id.x;
    let column = global_id.x % params.points_per_edge;
    let edge = (global_id.x / params.points_per_edge) * params.rows + global_id.y;
    let p = params.subdivisions;

    // Cells past the last edge or the live columns pass through
    if (edge >= params.edge_count || column > p + 1u) {
        cells_out[cell] = points_in[cell];
        return;
    }

    let base = cell - column;
    let old_last = params.previous_subdivisions + 1u;
    if (column == 0u) {
        cells_out[cell] = points_in[base];
        return;
    }
    if (column == p + 1u) {
        cells_out[cell] = points_in[base + old_last];
        return;
    }

    var total = 0.0;
    for (var i = 1u; i <= old_last; i++) {
        total += distance(points_in[base + i - 1u].xyz, points_in[base + i].xyz);
    }
    let goal = (total / f32(p + 1u)) * f32(column);

    var walked = 0.0;
    var resampled = points_in[base + old_last].xyz;
    for (var i = 1u; i <= old_last; i++) {
        let a = points_in[base + i - 1u].xyz;
        let b = points_in[base + i].xyz;
        let len = distance(a, b);
        if (len > 0.0 && walked + len >= goal) {
            resampled = a + (b - a) * ((goal - walked) / len);
            break;
        }
        walked += len;
    }

    cells_out[cell] = vec4<f32>(resampled, 0.0);
}
"#;

/// Update kernel: one force iteration per subdivision point
pub const UPDATE: &str = r#"
@group(0) @binding(3) var<storage, read> compatibility: array<vec4<f32>>;

@compute @workgroup_size(8, 8)
fn update(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let width = point_columns();
    if (global_id.x >= width || global_id.y >= params.rows) {
        return;
    }

    let cell = global_id.y * width + global_id.x;
    let tile = global_id.x / params.points_per_edge;
    let column = global_id.x % params.points_per_edge;
    let edge = tile * params.rows + global_id.y;
    let p = params.subdivisions;

    // Endpoints, dead columns and padding rows are copied
    if (edge >= params.edge_count || column == 0u || column > p) {
        cells_out[cell] = points_in[cell];
        return;
    }

    let base = cell - column;
    let start_pt = points_in[base].xyz;
    let end_pt = points_in[base + p + 1u].xyz;
    let current = points_in[cell].xyz;
    let prev_pt = points_in[cell - 1u].xyz;
    let next_pt = points_in[cell + 1u].xyz;

    let kp = params.stiffness / (floored_length(start_pt, end_pt) * f32(p + 1u));
    let spring = ((prev_pt - current) + (next_pt - current)) * kp;

    var electrostatic = vec3<f32>(0.0, 0.0, 0.0);
    let compat_base = global_id.y * params.capacity * params.tiles + tile * params.capacity;
    for (var slot = 0u; slot < params.capacity; slot++) {
        let neighbor = compatibility[compat_base + slot].x;
        if (neighbor < 0.0) {
            break;
        }
        let delta = load_point(u32(neighbor), column) - current;
        if (all(abs(delta) <= vec3<f32>(params.epsilon))) {
            continue;
        }
        electrostatic += delta / length(delta);
    }

    cells_out[cell] = vec4<f32>(current + (spring + electrostatic) * params.step_size, 0.0);
}
"#;

/// Full WGSL source of one kernel module
pub fn kernel_source(kernel: Kernel) -> String {
    let body = match kernel {
        Kernel::Compatibility => COMPATIBILITY,
        Kernel::Subdivision => SUBDIVISION,
        Kernel::Update => UPDATE,
    };
    format!("{}\n{}", COMMON, body)
}
