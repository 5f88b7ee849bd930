//! Buffer layout of the parallel mapping
//!
//! Each edge is one row of a point buffer and owns `points_per_edge` columns.
//! When there are more edges than the substrate's maximum extent, edges wrap
//! into further column blocks ("tiles") of the same buffer:
//!
//! ```text
//!            tile 0                 tile 1
//!        col 0 .. ppe-1        col ppe .. 2*ppe-1
//! row 0  edge 0                edge rows
//! row 1  edge 1                edge rows + 1
//! ...
//! ```
//!
//! Tiling only moves cells around; it never changes the numbers computed.

use crate::error::{BundleError, BundleResult};
use crate::geometry::Point;
use crate::graph::EdgeGeometry;
use crate::parallel::substrate::{CHANNELS, KernelParams};

/// Host-side image of a four-channel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Grid {
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * CHANNELS],
        }
    }

    pub fn view(&self) -> GridView<'_> {
        GridView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    pub fn set(&mut self, x: u32, y: u32, texel: [f32; 4]) {
        let offset = self.offset(x, y);
        self.data[offset..offset + CHANNELS].copy_from_slice(&texel);
    }

    pub fn set_point(&mut self, x: u32, y: u32, point: Point) {
        self.set(x, y, [point.x as f32, point.y as f32, point.z as f32, 0.0]);
    }
}

/// Read-only view of a row-major four-channel buffer
#[derive(Debug, Clone, Copy)]
pub struct GridView<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [f32],
}

impl<'a> GridView<'a> {
    pub fn new(width: u32, height: u32, data: &'a [f32]) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    pub fn point(&self, x: u32, y: u32) -> Point {
        let [x, y, z, _] = self.texel(x, y);
        Point::new(x as f64, y as f64, z as f64)
    }
}

/// Largest edge count whose indices a compatibility slot holds exactly.
///
/// Neighbour indices are stored in f32 channels.
pub const MAX_EDGES: usize = 1 << 24;

/// Where each edge lives in the point and compatibility buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub edge_count: u32,
    /// Rows per tile
    pub rows: u32,
    /// Column blocks
    pub tiles: u32,
    /// Columns per edge in the point buffers
    pub points_per_edge: u32,
    /// Columns per edge in the compatibility buffer
    pub capacity: u32,
}

impl TileLayout {
    /// Lay out `edge_count` edges within `max_extent` rows and columns.
    pub fn new(
        edge_count: usize,
        points_per_edge: u32,
        capacity: u32,
        max_extent: u32,
    ) -> BundleResult<Self> {
        let too_large = |required: u64| BundleError::ProblemTooLarge {
            required,
            max_extent,
        };

        if max_extent == 0 {
            return Err(too_large(1));
        }
        if edge_count > MAX_EDGES {
            return Err(too_large(edge_count as u64));
        }
        let edges = u32::try_from(edge_count).map_err(|_| too_large(edge_count as u64))?;
        let tiles = edges.div_ceil(max_extent).max(1);
        let rows = edges.min(max_extent).max(1);

        let point_columns = points_per_edge as u64 * tiles as u64;
        if point_columns > max_extent as u64 {
            return Err(too_large(point_columns));
        }
        let compat_columns = capacity as u64 * tiles as u64;
        if compat_columns > max_extent as u64 {
            return Err(too_large(compat_columns));
        }

        Ok(Self {
            edge_count: edges,
            rows,
            tiles,
            points_per_edge,
            capacity,
        })
    }

    pub fn point_columns(&self) -> u32 {
        self.points_per_edge * self.tiles
    }

    pub fn compat_columns(&self) -> u32 {
        self.capacity * self.tiles
    }

    /// Cell holding column `column` of `edge`, in a buffer with `block`-wide tiles
    pub fn cell(&self, edge: u32, column: u32, block: u32) -> (u32, u32) {
        ((edge / self.rows) * block + column, edge % self.rows)
    }

    pub fn point_cell(&self, edge: u32, column: u32) -> (u32, u32) {
        self.cell(edge, column, self.points_per_edge)
    }

    pub fn compat_cell(&self, edge: u32, slot: u32) -> (u32, u32) {
        self.cell(edge, slot, self.capacity)
    }

    /// Kernel parameters carrying this layout
    pub fn params(&self) -> KernelParams {
        KernelParams {
            edge_count: self.edge_count,
            rows: self.rows,
            tiles: self.tiles,
            points_per_edge: self.points_per_edge,
            capacity: self.capacity,
            subdivisions: 0,
            previous_subdivisions: 0,
            stiffness: 0.0,
            step_size: 0.0,
            threshold: 0.0,
        }
    }

    /// Initial point buffer: source in column 0, target in column 1 of each edge.
    pub fn encode_endpoints(&self, edges: &[EdgeGeometry]) -> Grid {
        let mut grid = Grid::zeroed(self.point_columns(), self.rows);
        for (e, edge) in edges.iter().enumerate() {
            let (x, y) = self.point_cell(e as u32, 0);
            grid.set_point(x, y, edge.source);
            grid.set_point(x + 1, y, edge.target);
        }
        grid
    }

    /// Decode `subdivisions + 2` points per edge from a read-back point buffer.
    ///
    /// Endpoints are replaced by the exact input positions; buffers only hold
    /// f32 copies of them.
    pub fn decode_paths(
        &self,
        data: &[f32],
        edges: &[EdgeGeometry],
        subdivisions: u32,
    ) -> Vec<Vec<Point>> {
        let view = GridView::new(self.point_columns(), self.rows, data);
        edges
            .iter()
            .enumerate()
            .map(|(e, edge)| {
                let mut points: Vec<Point> = (0..subdivisions + 2)
                    .map(|column| {
                        let (x, y) = self.point_cell(e as u32, column);
                        view.point(x, y)
                    })
                    .collect();
                let last = points.len() - 1;
                points[0] = edge.source;
                points[last] = edge.target;
                points
            })
            .collect()
    }

    /// Compatible-edge count the compatibility pass recorded for `edge`
    pub fn compatible_count(&self, data: &[f32], edge: u32) -> usize {
        let view = GridView::new(self.compat_columns(), self.rows, data);
        let (x, y) = self.compat_cell(edge, 0);
        view.texel(x, y)[1] as usize
    }

    /// Compatible-edge indices stored for `edge` (up to capacity)
    pub fn compatible_edges(&self, data: &[f32], edge: u32) -> Vec<usize> {
        let view = GridView::new(self.compat_columns(), self.rows, data);
        (0..self.capacity)
            .map(|slot| {
                let (x, y) = self.compat_cell(edge, slot);
                view.texel(x, y)[0]
            })
            .take_while(|&index| index >= 0.0)
            .map(|index| index as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tile_when_edges_fit() {
        let layout = TileLayout::new(100, 66, 500, 8192).unwrap();
        assert_eq!(layout.tiles, 1);
        assert_eq!(layout.rows, 100);
        assert_eq!(layout.point_columns(), 66);
    }

    #[test]
    fn test_tiles_wrap_edges_into_column_blocks() {
        let layout = TileLayout::new(10, 6, 5, 18).unwrap();
        insta::assert_snapshot!(
            format!("{:?}", layout),
            @"TileLayout { edge_count: 10, rows: 10, tiles: 1, points_per_edge: 6, capacity: 5 }"
        );

        let layout = TileLayout::new(10, 6, 5, 4).unwrap_err();
        assert!(matches!(
            layout,
            BundleError::ProblemTooLarge {
                required: 18,
                max_extent: 4
            }
        ));

        let layout = TileLayout::new(40, 4, 5, 16).unwrap();
        assert_eq!((layout.rows, layout.tiles), (16, 3));
        assert_eq!(layout.point_cell(0, 0), (0, 0));
        assert_eq!(layout.point_cell(17, 2), (6, 1));
        assert_eq!(layout.point_cell(39, 3), (11, 7));
        assert_eq!(layout.compat_cell(33, 4), (14, 1));
    }

    #[test]
    fn test_zero_extent_is_rejected() {
        let err = TileLayout::new(1, 3, 1, 0).unwrap_err();
        assert!(matches!(
            err,
            BundleError::ProblemTooLarge {
                required: 1,
                max_extent: 0
            }
        ));
    }

    #[test]
    fn test_edge_count_limited_to_exact_f32_indices() {
        assert!(TileLayout::new(MAX_EDGES, 3, 1, 1 << 30).is_ok());
        let err = TileLayout::new(MAX_EDGES + 1, 3, 1, 1 << 30).unwrap_err();
        assert!(matches!(
            err,
            BundleError::ProblemTooLarge { required, .. } if required == MAX_EDGES as u64 + 1
        ));
    }

    #[test]
    fn test_problem_too_large_message() {
        let err = TileLayout::new(10, 6, 1, 4).unwrap_err();
        insta::assert_snapshot!(
            err,
            @"problem too large: needs a buffer extent of 18, substrate allows 4"
        );
    }

    #[test]
    fn test_encode_then_decode_endpoints() {
        let edges = vec![
            EdgeGeometry::new(Point::planar(0.0, 0.0), Point::planar(1.0, 2.0)),
            EdgeGeometry::new(Point::new(0.1, 0.2, 0.3), Point::planar(5.0, 5.0)),
            EdgeGeometry::new(Point::planar(3.0, 3.0), Point::planar(4.0, 4.0)),
        ];
        let layout = TileLayout::new(edges.len(), 3, 2, 2).unwrap_err();
        assert!(matches!(layout, BundleError::ProblemTooLarge { .. }));

        let layout = TileLayout::new(edges.len(), 3, 2, 6).unwrap();
        let grid = layout.encode_endpoints(&edges);
        let paths = layout.decode_paths(&grid.data, &edges, 0);
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[1], vec![edges[1].source, edges[1].target]);
    }
}
