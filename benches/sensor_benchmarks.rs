use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dht_exporter::{
    sensor::dht::{bits_from_pulses, decode_frame},
    sensor::ValidSample,
    DerivedReading, LoopSettings, MetricRegistry, MonitorLoop, SensorIdentity, SensorModel,
    SimulatedSensor,
};
use std::sync::Arc;

/// 20.0°C / 45.3% as a DHT22 would clock it out.
const DHT22_FRAME: [u8; 5] = [0x01, 0xc5, 0x00, 0xc8, 0x8e];

fn pulses_for(bytes: [u8; 5]) -> Vec<u32> {
    (0..40)
        .map(|i| if bytes[i / 8] & (0x80 >> (i % 8)) != 0 { 70 } else { 26 })
        .collect()
}

fn registry() -> Arc<MetricRegistry> {
    let identity = SensorIdentity::new("bench", "DHT22", "bench-host");
    Arc::new(MetricRegistry::new(identity).expect("Should create registry"))
}

/// Benchmark pulse packing and frame decoding
fn bench_frame_decoding(c: &mut Criterion) {
    let pulses = pulses_for(DHT22_FRAME);

    c.bench_function("bits_from_pulses", |b| {
        b.iter(|| bits_from_pulses(black_box(&pulses)).expect("Should pack"))
    });

    for model in [SensorModel::Dht22, SensorModel::Dht11] {
        c.bench_with_input(
            BenchmarkId::new("decode_frame", model),
            &model,
            |b, &model| b.iter(|| decode_frame(model, black_box(DHT22_FRAME))),
        );
    }
}

/// Benchmark publishing a reading into the registry
fn bench_record_reading(c: &mut Criterion) {
    let metrics = registry();
    let identity = metrics.identity().clone();
    let sample = ValidSample {
        temperature_celsius: 20.0,
        humidity_percent: 45.3,
        captured_at: chrono::Utc::now(),
    };
    let reading = DerivedReading::from_sample(&sample, &identity);

    c.bench_function("record_reading", |b| {
        b.iter(|| metrics.record_reading(black_box(&reading)))
    });
}

/// Benchmark the text exposition served on /metrics
fn bench_render(c: &mut Criterion) {
    let metrics = registry();
    metrics.set_info(env!("CARGO_PKG_VERSION"));
    let mut monitor = MonitorLoop::new(
        SimulatedSensor::new(21.0, 45.0),
        metrics.clone(),
        LoopSettings::default(),
    );
    monitor.tick();

    c.bench_function("metrics_render", |b| {
        b.iter(|| metrics.render().expect("Should render"))
    });
}

/// Benchmark one full tick against the simulated sensor
fn bench_tick(c: &mut Criterion) {
    let mut monitor = MonitorLoop::new(
        SimulatedSensor::new(21.0, 45.0),
        registry(),
        LoopSettings::default(),
    );

    c.bench_function("monitor_tick", |b| b.iter(|| monitor.tick()));
}

criterion_group!(
    benches,
    bench_frame_decoding,
    bench_record_reading,
    bench_render,
    bench_tick
);

criterion_main!(benches);
