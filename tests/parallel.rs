use fdeb::parallel::{ComputeSubstrate, CpuSubstrate, Kernel, ParallelBundler, TileLayout};
use fdeb::{
    BundleConfig, BundleError, BundledGraph, Graph, OverflowPolicy, Point, PreparedGraph,
    Strategy, bundle, bundle_with_substrate,
};

/// Two groups of parallel edges, 20 apart
fn two_groups() -> Graph {
    let mut graph = Graph::new();
    for (i, y) in [0.0, 1.0, 2.0, 20.0, 21.0].into_iter().enumerate() {
        graph = graph
            .with_node(format!("s{}", i), Point::planar(0.0, y))
            .with_node(format!("t{}", i), Point::planar(40.0, y))
            .with_edge(format!("s{}", i), format!("t{}", i));
    }
    graph
}

/// `groups` clusters of five similar edges, far enough apart that no edge is
/// compatible with another cluster
fn clusters(groups: usize) -> Graph {
    let mut graph = Graph::new();
    for g in 0..groups {
        let x = g as f64 * 1000.0;
        for i in 0..5 {
            let y = i as f64 * 1.5;
            let s = format!("s{}_{}", g, i);
            let t = format!("t{}_{}", g, i);
            graph = graph
                .with_node(s.clone(), Point::planar(x, y))
                .with_node(t.clone(), Point::planar(x + 50.0, y + 0.5 * i as f64))
                .with_edge(s, t);
        }
    }
    graph
}

fn assert_close(a: &BundledGraph, b: &BundledGraph, tolerance: f64) {
    assert_eq!(a.edges.len(), b.edges.len());
    for (ea, eb) in a.edges.iter().zip(&b.edges) {
        assert_eq!(ea.input_index, eb.input_index);
        assert_eq!(ea.points.len(), eb.points.len());
        for (p, q) in ea.points.iter().zip(&eb.points) {
            assert!(
                p.distance(*q) < tolerance,
                "edge {}: {:?} vs {:?}",
                ea.input_index,
                p,
                q
            );
        }
    }
}

#[test]
fn parallel_matches_sequential() {
    let graph = two_groups();
    let config = BundleConfig::default()
        .with_cycles(2)
        .with_iterations(4.0, 1.0);

    let sequential = bundle(&graph, &config).unwrap();
    let parallel = bundle(&graph, &config.clone().with_strategy(Strategy::Parallel)).unwrap();

    assert_close(&sequential, &parallel, 1e-3);
}

#[test]
fn parallel_endpoints_are_exact() {
    let graph = Graph::new()
        .with_node("a", Point::new(0.1, 0.2, 0.3))
        .with_node("b", Point::new(100.7, 3.3, -0.9))
        .with_node("c", Point::new(0.1, 5.3, 0.0))
        .with_node("d", Point::new(99.9, 8.1, 0.0))
        .with_edge("a", "b")
        .with_edge("c", "d");
    let config = BundleConfig::default()
        .with_cycles(2)
        .with_strategy(Strategy::Parallel);
    let bundled = bundle(&graph, &config).unwrap();

    assert_eq!(bundled.edges[0].points[0], Point::new(0.1, 0.2, 0.3));
    assert_eq!(
        bundled.edges[0].points.last(),
        Some(&Point::new(100.7, 3.3, -0.9))
    );
    assert_eq!(bundled.edges[1].points[0], Point::new(0.1, 5.3, 0.0));
}

#[test]
fn parallel_zero_step_size_keeps_straight_interpolation() {
    let config = BundleConfig::default()
        .with_cycles(3)
        .with_step_size(0.0)
        .with_strategy(Strategy::Parallel);
    let bundled = bundle(&two_groups(), &config).unwrap();

    for edge in &bundled.edges {
        let source = edge.points[0];
        let target = edge.points[edge.points.len() - 1];
        let segments = (edge.points.len() - 1) as f64;
        for (j, point) in edge.points.iter().enumerate() {
            let expected = source.lerp(target, j as f64 / segments);
            assert!(
                point.distance(expected) < 1e-4,
                "edge {} point {} at {:?}, expected {:?}",
                edge.input_index,
                j,
                point,
                expected
            );
        }
    }
}

#[test]
fn tiled_layout_matches_untiled() {
    let graph = clusters(8);
    let config = BundleConfig::default()
        .with_cycles(1)
        .with_iterations(6.0, 1.0)
        .with_max_compatible_edges(5)
        .with_strategy(Strategy::Parallel);

    // 40 edges, 4 points per edge: three column blocks of 16 rows
    let layout = TileLayout::new(40, 4, 5, 16).unwrap();
    assert_eq!((layout.rows, layout.tiles), (16, 3));
    assert_eq!(layout.point_columns(), 12);
    assert_eq!(layout.compat_columns(), 15);

    let untiled = bundle(&graph, &config).unwrap();
    let tiled = bundle(&graph, &config.clone().with_max_extent(16)).unwrap();
    assert_eq!(untiled, tiled);

    let sequential = bundle(&graph, &config.clone().with_strategy(Strategy::Sequential)).unwrap();
    assert_close(&sequential, &tiled, 1e-3);
}

#[test]
fn problem_too_large_after_tiling() {
    // 5 edges in rows of 3 need two blocks of 4 point columns
    let config = BundleConfig::default()
        .with_cycles(1)
        .with_max_extent(3)
        .with_strategy(Strategy::Parallel);
    let err = bundle(&two_groups(), &config).unwrap_err();
    assert!(matches!(
        err,
        BundleError::ProblemTooLarge {
            required: 8,
            max_extent: 3
        }
    ));
}

#[test]
fn overflow_policy() {
    let graph = two_groups();
    let config = BundleConfig::default()
        .with_cycles(1)
        .with_max_compatible_edges(1)
        .with_strategy(Strategy::Parallel);

    let err = bundle(&graph, &config).unwrap_err();
    assert!(matches!(
        err,
        BundleError::CompatibilityOverflow { edge: 0, capacity: 1, .. }
    ));

    let truncated = bundle(&graph, &config.with_overflow(OverflowPolicy::Truncate)).unwrap();
    assert_eq!(truncated.edges.len(), 5);
    assert!(truncated.edges.iter().all(|e| e.points.len() == 4));
}

#[test]
fn kept_kernels_are_reused_across_runs() {
    let graph = two_groups();
    let config = BundleConfig::default()
        .with_cycles(1)
        .with_keep_kernels(true)
        .with_strategy(Strategy::Parallel);
    let mut substrate = CpuSubstrate::new();

    let first = bundle_with_substrate(&graph, &config, &mut substrate).unwrap();
    assert!(Kernel::ALL.iter().all(|&k| substrate.is_compiled(k)));
    let second = bundle_with_substrate(&graph, &config, &mut substrate).unwrap();

    assert_eq!(first, second);
    assert_eq!(substrate.live_buffers(), 0);
}

#[test]
fn empty_input_allocates_nothing() {
    let config = BundleConfig::default();
    let mut substrate = CpuSubstrate::with_max_extent(4);
    let paths = ParallelBundler::new(&config, &mut substrate)
        .run(&PreparedGraph::default())
        .unwrap();
    assert!(paths.is_empty());
    assert_eq!(substrate.live_buffers(), 0);
}
