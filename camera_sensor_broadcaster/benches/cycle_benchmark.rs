//! Cycle benchmark - cost of one broadcaster `update()` for common frame sizes.
//!
//! Covers the RT path only: binding check, try-acquire of the outgoing
//! message, HAL copy and hand-off. Delivery runs on the worker thread and is
//! not measured here.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use broadcaster_common::hal::{StateInterface, StateInterfaceTable};
use broadcaster_common::msgs::{Image, Time};
use camera_sensor_broadcaster::controller::ControllerContext;
use camera_sensor_broadcaster::lifecycle::LifecycleController;
use camera_sensor_broadcaster::{CAMERA_SENSOR_BROADCASTER, ControllerRegistry, InProcessTransport};
use parking_lot::Mutex;

/// (label, height, width, bytes per pixel)
const FRAME_SIZES: &[(&str, u32, u32, u32)] = &[
    ("qvga_mono8", 240, 320, 1),
    ("vga_bgr8", 480, 640, 3),
    ("hd_bgr8", 720, 1280, 3),
];

/// Build an active broadcaster reading a `height`×`width` frame.
fn active_broadcaster(
    height: u32,
    width: u32,
    bpp: u32,
) -> (LifecycleController, StateInterfaceTable) {
    let step = width * bpp;
    let mut hardware = StateInterfaceTable::new();
    hardware
        .register(StateInterface::new(
            "bench_cam",
            "data",
            Arc::new(Mutex::new(vec![0x5a; (height * step) as usize])),
        ))
        .unwrap();

    let mut params = toml::Table::new();
    params.insert("sensor_name".into(), "bench_cam".into());
    params.insert("frame_id".into(), "bench_cam_frame".into());
    params.insert("height".into(), i64::from(height).into());
    params.insert("width".into(), i64::from(width).into());
    params.insert("encoding".into(), if bpp == 1 { "mono8" } else { "bgr8" }.into());
    params.insert("step".into(), i64::from(step).into());

    let registry = ControllerRegistry::with_builtin();
    let mut lc = LifecycleController::new(
        registry.create(CAMERA_SENSOR_BROADCASTER).unwrap(),
        ControllerContext {
            name: "bench_broadcaster".into(),
            params,
            transport: Arc::new(InProcessTransport::<Image>::new()),
        },
    )
    .unwrap();
    lc.configure().unwrap();
    lc.activate(&hardware).unwrap();
    (lc, hardware)
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcaster_update");
    let period = Duration::from_millis(10);

    for &(label, height, width, bpp) in FRAME_SIZES {
        let (mut lc, _hardware) = active_broadcaster(height, width, bpp);
        group.bench_with_input(BenchmarkId::from_parameter(label), &period, |b, &period| {
            b.iter(|| black_box(lc.update(Time::now(), period)));
        });
    }
    group.finish();
}

fn bench_inactive_update(c: &mut Criterion) {
    let (mut lc, _hardware) = active_broadcaster(480, 640, 3);
    if lc.deactivate().is_err() {
        return;
    }
    c.bench_function("broadcaster_update_inactive", |b| {
        b.iter(|| black_box(lc.update(Time::now(), Duration::from_millis(10))));
    });
}

criterion_group!(benches, bench_update, bench_inactive_update);
criterion_main!(benches);
