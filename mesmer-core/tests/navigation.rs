use mesmer_core::uniforms::{bind_live, U_CENTER, U_MAX_ITERATIONS, U_ZOOM};
use mesmer_core::{
    FractalKind, FrameInputs, IterationPolicy, PaletteSet, ScreenSize, UniformValue,
    ViewportState,
};

const SIZE: ScreenSize = ScreenSize {
    width: 1920,
    height: 1080,
};

#[test]
fn wheel_then_drag_session_keeps_invariants() {
    let mut vp = ViewportState::for_kind(FractalKind::Mandelbrot);
    let cursor = (1500.0, 200.0);

    // Ten notches in towards the cursor.
    for _ in 0..10 {
        let before = vp.screen_to_complex(cursor, SIZE);
        vp.zoom_at(cursor, 1.0, SIZE);
        let after = vp.screen_to_complex(cursor, SIZE);
        assert!((before.0 - after.0).abs() < 1e-12);
        assert!((before.1 - after.1).abs() < 1e-12);
    }
    assert!((vp.zoom() - 1.1f64.powi(10)).abs() < 1e-9);

    // A drag that returns to its starting point leaves the center untouched.
    let center = vp.center;
    vp.begin_drag((10.0, 10.0));
    for step in 1..=20 {
        vp.drag_to((10.0 + step as f32 * 7.0, 10.0 + step as f32 * 3.0), SIZE);
    }
    vp.drag_to((10.0, 10.0), SIZE);
    vp.end_drag();
    assert!((vp.center.0 - center.0).abs() < 1e-12);
    assert!((vp.center.1 - center.1).abs() < 1e-12);
}

#[test]
fn every_kind_binds_after_reset() {
    let iterations = IterationPolicy::default();
    let palettes = PaletteSet::default();
    for kind in FractalKind::ALL {
        let vp = ViewportState::for_kind(kind);
        let set = bind_live(&FrameInputs {
            kind,
            viewport: &vp,
            iterations: &iterations,
            palettes: &palettes,
            size: SIZE,
        })
        .expect("every selectable kind binds");
        assert!(set.contains(U_MAX_ITERATIONS), "{kind} lacks iterations");
        if !kind.uses_parameter_plane() {
            assert!(set.contains(U_CENTER));
            assert!(set.contains(U_ZOOM));
        }
    }
}

#[test]
fn burning_ship_reset_is_exact() {
    let mut vp = ViewportState::for_kind(FractalKind::Mandelbrot);
    vp.zoom_at((3.0, 4.0), 5.0, SIZE);
    vp.reset_to_defaults(FractalKind::BurningShip);
    assert_eq!(vp.center, (-1.75, -0.04));
    assert_eq!(vp.zoom(), 22.0);

    let iterations = IterationPolicy::default();
    let palettes = PaletteSet::default();
    let set = bind_live(&FrameInputs {
        kind: FractalKind::BurningShip,
        viewport: &vp,
        iterations: &iterations,
        palettes: &palettes,
        size: SIZE,
    })
    .unwrap();
    // 200 + floor(150 * ln 22) = 200 + 463
    assert_eq!(set.get(U_MAX_ITERATIONS), Some(UniformValue::Int(663)));
}
