//! Engine construction, memory accounting and tile validation tests

use crate::config::{SgmParams, TileParams};
use crate::core::Roi;
use crate::sgm::{SgmDepthList, SgmError, SgmTileEngine};
use crate::test_utils::{synthetic_camera_cache, tile, uniform_depth_list, StubComputeEngine};

fn small_params(optimize_volume: bool) -> SgmParams {
    SgmParams {
        scale: 1,
        step_xy: 1,
        max_depths: 8,
        optimize_volume,
        ..Default::default()
    }
}

fn small_engine(params: SgmParams) -> SgmTileEngine {
    SgmTileEngine::new(
        params,
        TileParams {
            width: 16,
            height: 8,
        },
        synthetic_camera_cache(),
        StubComputeEngine::gradient(),
    )
    .unwrap()
}

#[test]
fn test_engine_extent_follows_downscale() {
    let engine = SgmTileEngine::new(
        SgmParams::default(),
        TileParams::default(),
        synthetic_camera_cache(),
        StubComputeEngine::gradient(),
    )
    .unwrap();
    // scale 2, step 2 on a 1024x1024 tile bound
    assert_eq!(engine.max_tile_width(), 256);
    assert_eq!(engine.max_tile_height(), 256);
}

#[test]
fn test_memory_consumption_padded_vs_unpadded() {
    let engine = small_engine(small_params(false));
    let padded = engine.device_memory_consumption();
    let unpadded = engine.device_memory_consumption_unpadded();
    assert!(unpadded > 0.0);
    assert!(padded >= unpadded);
}

#[test]
fn test_filtering_increases_memory_consumption() {
    let without = small_engine(small_params(false));
    let with = small_engine(small_params(true));
    assert!(with.device_memory_consumption() > without.device_memory_consumption());
    assert!(
        with.device_memory_consumption_unpadded() > without.device_memory_consumption_unpadded()
    );
}

#[test]
fn test_empty_neighbor_list_rejected() {
    let mut engine = small_engine(small_params(false));
    let result = engine.compute_tile_depth_map(
        &tile(1, &[], Roi::new(0, 8, 0, 8)),
        &uniform_depth_list(4, 0),
    );
    assert!(matches!(result, Err(SgmError::Configuration { .. })));

    // a rejected tile must leave the freshly allocated volumes untouched
    let (w, h, d) = engine.best_sim_volume().dims();
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                assert_eq!(engine.best_sim_volume().at(x, y, z), 0);
                assert_eq!(engine.sec_best_sim_volume().at(x, y, z), 0);
            }
        }
    }
}

#[test]
fn test_empty_depth_list_rejected() {
    let mut engine = small_engine(small_params(false));
    let result = engine.compute_tile_depth_map(
        &tile(1, &[2], Roi::new(0, 8, 0, 8)),
        &uniform_depth_list(0, 1),
    );
    assert!(matches!(result, Err(SgmError::Configuration { .. })));
}

#[test]
fn test_oversized_depth_list_rejected() {
    let mut engine = small_engine(small_params(false));
    let result = engine.compute_tile_depth_map(
        &tile(1, &[2], Roi::new(0, 8, 0, 8)),
        &uniform_depth_list(9, 1),
    );
    assert!(matches!(result, Err(SgmError::Configuration { .. })));
}

#[test]
fn test_limits_count_mismatch_rejected() {
    let mut engine = small_engine(small_params(false));
    let result = engine.compute_tile_depth_map(
        &tile(1, &[2, 3], Roi::new(0, 8, 0, 8)),
        &uniform_depth_list(4, 1),
    );
    assert!(matches!(result, Err(SgmError::Configuration { .. })));
}

#[test]
fn test_out_of_bounds_subrange_rejected() {
    let mut engine = small_engine(small_params(false));
    let list = SgmDepthList::new(vec![1.0, 1.25, 1.5, 1.75], vec![(2, 5)]);
    let result = engine.compute_tile_depth_map(&tile(1, &[2], Roi::new(0, 8, 0, 8)), &list);
    assert!(matches!(result, Err(SgmError::Configuration { .. })));
}

#[test]
fn test_empty_roi_rejected() {
    let mut engine = small_engine(small_params(false));
    let result = engine.compute_tile_depth_map(
        &tile(1, &[2], Roi::new(4, 4, 0, 8)),
        &uniform_depth_list(4, 1),
    );
    assert!(matches!(result, Err(SgmError::Configuration { .. })));
}

#[test]
fn test_oversized_roi_rejected() {
    let mut engine = small_engine(small_params(false));
    let result = engine.compute_tile_depth_map(
        &tile(1, &[2], Roi::new(0, 32, 0, 8)),
        &uniform_depth_list(4, 1),
    );
    assert!(matches!(result, Err(SgmError::Configuration { .. })));
}

#[test]
fn test_configuration_error_reports_view_and_region() {
    let mut engine = small_engine(small_params(false));
    let err = engine
        .compute_tile_depth_map(&tile(42, &[], Roi::new(0, 8, 0, 4)), &uniform_depth_list(4, 0))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("view 42"), "unexpected message: {message}");
    assert!(message.contains("[0, 8)"), "unexpected message: {message}");
}

#[test]
fn test_engine_reuse_across_tiles() {
    let mut engine = small_engine(small_params(false));
    let list = uniform_depth_list(4, 1);

    let first = engine
        .compute_tile_depth_map(&tile(1, &[2], Roi::new(0, 16, 0, 8)), &list)
        .unwrap();
    assert_eq!((first.width(), first.height()), (16, 8));

    let second = engine
        .compute_tile_depth_map(&tile(1, &[2], Roi::new(4, 10, 2, 7)), &list)
        .unwrap();
    assert_eq!((second.width(), second.height()), (6, 5));
}
