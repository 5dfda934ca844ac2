//! Benchmarks for label resolution and configuration search.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vram_planner::config::PlannerConfig;
use vram_planner::gpu::device::{Device, Vendor, GIB};
use vram_planner::gpu::label::resolve_key;
use vram_planner::gpu::map::DeviceMap;
use vram_planner::planner::calculator::GgufEstimator;
use vram_planner::planner::catalog::ModelProfile;
use vram_planner::planner::recommend::recommend_config;
use vram_planner::probe::nvidia::parse_query_output;

fn qwen_14b() -> ModelProfile {
    ModelProfile {
        repo: "Sakura-14B-Qwen2.5-v1.0-GGUF".to_string(),
        filename: "sakura-14b-qwen2.5-v1.0-iq4xs.gguf".to_string(),
        sha256: String::new(),
        size_bytes: 8 * GIB,
        minimal_gpu_memory_gib: 10,
        base_model_id: "Qwen/Qwen2.5-14B-Instruct".to_string(),
        bytes_per_weight: 0.53,
        cached_config: Some(serde_json::json!({
            "num_hidden_layers": 48,
            "num_attention_heads": 40,
            "num_key_value_heads": 8,
            "hidden_size": 5120,
            "vocab_size": 152064,
        })),
    }
}

fn bench_recommend(c: &mut Criterion) {
    let estimator = GgufEstimator::default();
    let model = qwen_14b();
    let config = PlannerConfig::default();

    // 10 GiB forces a scan down most of the parallelism range.
    c.bench_function("recommend_config_10gib", |b| {
        b.iter(|| {
            let best = recommend_config(&estimator, black_box(&model), 10.0, &config);
            black_box(best.ok());
        })
    });
}

fn bench_resolve_key(c: &mut Criterion) {
    let mut devices = DeviceMap::new();
    for i in 0..64 {
        let device = Device::new(format!("NVIDIA GeForce RTX {}", 3000 + i % 8), Vendor::Nvidia, 24 * GIB)
            .with_pci_bus_id(format!("00000000:{i:02X}:00.0"));
        devices.insert(device.key(), device);
    }

    c.bench_function("resolve_key_64_devices", |b| {
        b.iter(|| {
            black_box(resolve_key(black_box("NVIDIA GeForce RTX 3007 (GPU 5)"), &devices));
            black_box(resolve_key(black_box("00000000:3F:00.0"), &devices));
        })
    });
}

fn bench_parse_nvidia_smi(c: &mut Criterion) {
    let stdout: String = (0..16)
        .map(|i| format!("NVIDIA H100 80GB HBM3, 00000000:{i:02X}:00.0, 80000 MiB, 81559 MiB\n"))
        .collect();

    c.bench_function("parse_nvidia_smi_16_rows", |b| {
        b.iter(|| black_box(parse_query_output(black_box(&stdout))))
    });
}

criterion_group!(
    benches,
    bench_recommend,
    bench_resolve_key,
    bench_parse_nvidia_smi,
);
criterion_main!(benches);
