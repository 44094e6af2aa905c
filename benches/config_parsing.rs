//! Benchmark for config parsing performance (NFR-001: < 10ms)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

fn bench_config_load_from_file(c: &mut Criterion) {
    let config_path = Path::new("gatehouse.example.toml");

    c.bench_function("config_parse_from_file", |b| {
        b.iter(|| {
            let config = gatehouse::config::GatehouseConfig::load(Some(black_box(config_path)));
            black_box(config)
        });
    });
}

fn bench_config_load_defaults(c: &mut Criterion) {
    c.bench_function("config_parse_defaults_only", |b| {
        b.iter(|| {
            let config = gatehouse::config::GatehouseConfig::load(None);
            black_box(config)
        });
    });
}

fn bench_config_toml_parsing(c: &mut Criterion) {
    let toml_content = r#"
[server]
host = "0.0.0.0"
port = 8000
request_timeout_seconds = 300
max_concurrent_requests = 8

[logging]
level = "info"
format = "pretty"

[cache]
root = "/var/cache/gatehouse"
offline = false

[engine]
install_dir = "/var/cache/gatehouse/engines"
min_version = "0.0.0"
startup_timeout_seconds = 120
ctx_size = 4096
"#;

    c.bench_function("config_parse_complex_toml", |b| {
        b.iter(|| {
            let config: gatehouse::config::GatehouseConfig =
                toml::from_str(black_box(toml_content)).unwrap();
            black_box(config)
        });
    });
}

criterion_group!(
    benches,
    bench_config_load_from_file,
    bench_config_load_defaults,
    bench_config_toml_parsing
);
criterion_main!(benches);
