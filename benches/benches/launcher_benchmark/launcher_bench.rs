use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use sitl_core::{encode_request, exchange_data_body, simple_body, SitlCommand, ACTION_EXCHANGE_DATA, ACTION_RESET_AIRCRAFT};
use sitl_types::{LaunchConfig, LaunchMode};

fn bench_simple_body(c: &mut Criterion) {
    c.bench_function("simple_body", |b| {
        b.iter(|| simple_body(black_box(ACTION_RESET_AIRCRAFT)))
    });
}

fn bench_exchange_data_body(c: &mut Criterion) {
    c.bench_function("exchange_data_body", |b| {
        b.iter(|| exchange_data_body(black_box(0.0)))
    });
}

fn bench_encode_request(c: &mut Criterion) {
    let body = exchange_data_body(0.0);

    c.bench_function("encode_request", |b| {
        b.iter(|| encode_request(black_box(ACTION_EXCHANGE_DATA), black_box(&body)))
    });
}

fn bench_command_from_config(c: &mut Criterion) {
    let config = LaunchConfig::new("tailwind", "4.2.0", LaunchMode::Headless, "Strip-A");

    c.bench_function("command_from_config", |b| {
        b.iter(|| SitlCommand::from_config(black_box("bin".as_ref()), black_box(&config)))
    });
}

criterion_group!(
    benches,
    bench_simple_body,
    bench_exchange_data_body,
    bench_encode_request,
    bench_command_from_config
);
criterion_main!(benches);
