// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the controller round trip: call decoding,
// synchronous dispatch, and provider-backed calls answered by callback.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use visit_sdk_bridge::simulated::SimulatedPlatform;
use visit_sdk_bridge::{VisitSdkPlugin, platform_device};
use visit_sdk_core::config::BridgeConfig;
use visit_sdk_core::types::{ConnectionState, MethodCall};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
}

/// Plugin attached to a connected simulated platform, logging off.
fn attached_plugin(rt: &Runtime) -> (VisitSdkPlugin, SimulatedPlatform) {
    let platform = SimulatedPlatform::new(ConnectionState::Connected);
    let config = BridgeConfig {
        logging_enabled: false,
        ..BridgeConfig::default()
    };
    let _guard = rt.enter();
    let plugin = VisitSdkPlugin::attach_to_engine(config, platform_device(), platform.factory());
    plugin
        .on_attached_to_surface(Some(platform.surface_handle()))
        .expect("controller running");
    (plugin, platform)
}

fn bench_decode_call(c: &mut Criterion) {
    let line = r#"{"method":"requestActivityDataFromHealthConnect","arguments":{"type":"steps","frequency":"day","timestamp":1700000000000}}"#;

    c.bench_function("decode MethodCall (activity query)", |b| {
        b.iter(|| {
            let call: MethodCall = serde_json::from_str(black_box(line)).expect("valid call");
            assert!(call.known_method().is_some());
        });
    });
}

fn bench_platform_version(c: &mut Criterion) {
    let rt = runtime();
    let (plugin, _platform) = attached_plugin(&rt);

    c.bench_function("invoke getPlatformVersion", |b| {
        b.iter(|| {
            let reply = rt
                .block_on(plugin.channel().invoke(MethodCall::new("getPlatformVersion")))
                .expect("reply");
            black_box(reply);
        });
    });
}

fn bench_not_implemented(c: &mut Criterion) {
    let rt = runtime();
    let (plugin, _platform) = attached_plugin(&rt);

    c.bench_function("invoke unknown method", |b| {
        b.iter(|| {
            let reply = rt
                .block_on(plugin.channel().invoke(MethodCall::new(black_box("getHeartRate"))))
                .expect("reply");
            black_box(reply);
        });
    });
}

fn bench_daily_data(c: &mut Criterion) {
    let rt = runtime();
    let (plugin, _platform) = attached_plugin(&rt);

    c.bench_function("invoke requestDailyFitnessData (callback)", |b| {
        b.iter(|| {
            let reply = rt
                .block_on(plugin.channel().invoke(MethodCall::new("requestDailyFitnessData")))
                .expect("reply");
            assert!(reply.is_success());
        });
    });
}

criterion_group!(
    benches,
    bench_decode_call,
    bench_platform_version,
    bench_not_implemented,
    bench_daily_data,
);
criterion_main!(benches);
