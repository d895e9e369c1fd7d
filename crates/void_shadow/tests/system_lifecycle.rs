//! Integration tests for the shadow system lifecycle
//!
//! Tests resource ownership against the headless backend including:
//! - Init rollback on every failure point
//! - Shared render pass reuse
//! - Shutdown, resize and accessor bounds

use glam::Vec3;
use void_shadow::{
    CameraProjection, CameraSnapshot, HeadlessBackend, ResourceKind, ShadowBackend, ShadowConfig,
    ShadowError, ShadowFrameData, ShadowQuality, ShadowSettings, ShadowSystem, ShadowSystemState,
    SHADOW_RENDER_PASS_NAME,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera() -> CameraSnapshot {
    CameraSnapshot::looking_at(
        Vec3::new(0.0, 10.0, 20.0),
        Vec3::ZERO,
        Vec3::Y,
        CameraProjection::Perspective { fov_y: 1.1, aspect: 1.6 },
        0.3,
        500.0,
    )
}

fn config(quality: ShadowQuality) -> ShadowConfig {
    ShadowConfig::new(&ShadowSettings::preset(quality))
}

#[test]
fn test_full_lifecycle() {
    init_logging();
    let mut backend = HeadlessBackend::new(3);
    let mut system = ShadowSystem::new();
    assert_eq!(system.state(), ShadowSystemState::Uninitialized);

    system.init(&mut backend, config(ShadowQuality::High)).expect("Should initialize");
    let cascades = system.config().cascade_count();
    assert_eq!(system.state(), ShadowSystemState::Initialized);
    assert_eq!(backend.live_count(ResourceKind::DepthTexture), 3 * cascades);
    assert_eq!(backend.live_count(ResourceKind::RenderTarget), 3 * cascades);

    for frame in 0..3 {
        system.update(Some(&camera()), true, Vec3::new(0.2, -1.0, -0.3));
        let data = system.get_frame_data(frame);
        assert!(data.is_enabled());
        assert_eq!(data.cascade_count(), cascades);
        for cascade in 0..cascades {
            assert!(system.get_render_target(frame, cascade).is_valid());
            assert_eq!(data.depth_textures[cascade], system.get_depth_texture(frame, cascade));
        }
        assert_eq!(data.uniform_bytes().len(), std::mem::size_of_val(&data.uniforms));
    }

    system.shutdown(&mut backend);
    assert_eq!(system.state(), ShadowSystemState::ShutDown);
    assert_eq!(backend.live_resources(), 0);
    assert_eq!(backend.invalid_destroys(), 0);
    assert_eq!(backend.texture_memory(), 0);
}

#[test]
fn test_rollback_at_every_failure_point() {
    init_logging();
    let frames = 2;
    let cascades = 3;
    let settings = ShadowSettings::default().with_cascade_count(cascades as u32);

    let mut failure_points = vec![(ResourceKind::RenderPass, 0), (ResourceKind::Pipeline, 0)];
    for nth in 0..frames * cascades {
        failure_points.push((ResourceKind::DepthTexture, nth));
        failure_points.push((ResourceKind::RenderTarget, nth));
    }

    for (kind, nth) in failure_points {
        let mut backend = HeadlessBackend::new(frames);
        backend.fail_on(kind, nth);
        let mut system = ShadowSystem::new();

        let result = system.init(&mut backend, ShadowConfig::new(&settings));
        assert!(
            matches!(result, Err(ShadowError::ResourceCreation { .. })),
            "{:?} #{} should fail init, got {:?}",
            kind,
            nth,
            result
        );
        assert_eq!(system.state(), ShadowSystemState::Uninitialized);
        assert_eq!(backend.live_resources(), 0, "{:?} #{} leaked resources", kind, nth);
        assert_eq!(backend.invalid_destroys(), 0, "{:?} #{} destroyed twice", kind, nth);
        assert!(!system.get_render_target(0, 0).is_valid());
        assert_eq!(system.get_frame_data(0), ShadowFrameData::default());
    }
}

#[test]
fn test_failed_init_then_update_is_noop() {
    let mut backend = HeadlessBackend::new(2);
    backend.fail_on(ResourceKind::Pipeline, 0);
    let mut system = ShadowSystem::new();
    assert!(system.init(&mut backend, config(ShadowQuality::Low)).is_err());

    system.update(Some(&camera()), true, Vec3::NEG_Y);
    assert!(!system.is_enabled());
    assert!(system.splits().is_none());
    assert_eq!(system.get_frame_data(0), ShadowFrameData::default());
}

#[test]
fn test_shared_pass_survives_shutdown() {
    let mut backend = HeadlessBackend::new(2);
    let shared = backend.register_shared_pass(SHADOW_RENDER_PASS_NAME);

    let mut first = ShadowSystem::new();
    first.init(&mut backend, config(ShadowQuality::Medium)).unwrap();
    assert_eq!(first.render_pass(), shared);
    assert!(backend.is_shared_pass(first.render_pass()));

    first.shutdown(&mut backend);
    assert_eq!(backend.find_render_pass(SHADOW_RENDER_PASS_NAME), Some(shared));

    // A second system can pick the same pass up again
    let mut second = ShadowSystem::new();
    second.init(&mut backend, config(ShadowQuality::Medium)).unwrap();
    assert_eq!(second.render_pass(), shared);
    second.shutdown(&mut backend);
    assert_eq!(backend.invalid_destroys(), 0);
}

#[test]
fn test_owned_pass_destroyed_on_shutdown() {
    let mut backend = HeadlessBackend::new(1);
    let mut system = ShadowSystem::new();
    system.init(&mut backend, config(ShadowQuality::Ultra)).unwrap();
    assert_eq!(backend.find_render_pass(SHADOW_RENDER_PASS_NAME), Some(system.render_pass()));

    system.shutdown(&mut backend);
    assert_eq!(backend.find_render_pass(SHADOW_RENDER_PASS_NAME), None);
}

#[test]
fn test_zero_frames_in_flight_fails_cleanly() {
    let mut backend = HeadlessBackend::new(0);
    let mut system = ShadowSystem::new();
    assert_eq!(system.init(&mut backend, config(ShadowQuality::Medium)), Err(ShadowError::NoFramesInFlight));
    assert_eq!(backend.live_resources(), 0);

    backend.set_frames_in_flight(2);
    system.init(&mut backend, config(ShadowQuality::Medium)).unwrap();
    assert_eq!(system.frames_in_flight(), 2);
}

#[test]
fn test_accessors_return_invalid_out_of_range() {
    let mut backend = HeadlessBackend::new(2);
    let mut system = ShadowSystem::new();
    system
        .init(&mut backend, ShadowConfig::new(&ShadowSettings::default().with_cascade_count(2)))
        .unwrap();

    assert!(system.get_render_target(0, 1).is_valid());
    assert!(!system.get_render_target(0, 2).is_valid());
    assert!(!system.get_render_target(2, 0).is_valid());
    assert!(!system.get_depth_texture(9, 9).is_valid());
    assert_eq!(system.get_frame_data(2), ShadowFrameData::default());
}

#[test]
fn test_resize_keeps_cascades_running() {
    let mut backend = HeadlessBackend::new(2);
    let mut system = ShadowSystem::new();
    system.init(&mut backend, config(ShadowQuality::Medium)).unwrap();
    let cascades = system.config().cascade_count();

    system.resize(&mut backend, 1024).unwrap();
    assert_eq!(backend.live_count(ResourceKind::DepthTexture), 2 * cascades);
    assert_eq!(backend.texture_memory(), 2 * cascades * 1024 * 1024 * 4);

    system.update(Some(&camera()), true, Vec3::new(1.0, -1.0, 0.0));
    let data = system.get_frame_data(1);
    assert_eq!(data.uniforms.shadow_map_size, 1024);
    assert!(data.is_enabled());

    system.shutdown(&mut backend);
    assert_eq!(backend.live_resources(), 0);
    assert_eq!(system.resize(&mut backend, 2048), Err(ShadowError::ShutDown));
}

#[test]
fn test_set_scene_bounds_changes_anchor() {
    use void_shadow::{AnchorSource, SceneBounds};

    let mut backend = HeadlessBackend::new(1);
    let mut system = ShadowSystem::new();
    system.init(&mut backend, config(ShadowQuality::Medium)).unwrap();

    system.update(Some(&camera()), true, Vec3::NEG_Y);
    assert_eq!(system.light_view().unwrap().source, AnchorSource::Camera);

    system.set_scene_bounds(Some(SceneBounds::new(Vec3::splat(-50.0), Vec3::splat(50.0))));
    system.update(Some(&camera()), true, Vec3::NEG_Y);
    assert_eq!(system.light_view().unwrap().source, AnchorSource::SceneBounds);

    system.set_scene_bounds(None);
    system.update(Some(&camera()), true, Vec3::NEG_Y);
    assert_eq!(system.light_view().unwrap().source, AnchorSource::Camera);
}
