//! Integration tests for ability checks and recommendations.

use vram_planner::config::PlannerConfig;
use vram_planner::gpu::device::{Device, Vendor, GIB};
use vram_planner::gpu::registry::DeviceRegistry;
use vram_planner::planner::ability::{CapacityPlanner, PlanError};
use vram_planner::planner::calculator::{
    CalculatorError, GgufEstimator, MemoryBreakdown, MemoryCalculator,
};
use vram_planner::planner::catalog::{ModelCatalog, ModelProfile};
use vram_planner::planner::recommend::RecommendedConfig;

const MODEL: &str = "sakura-14b-qwen2.5-v1.0-iq4xs.gguf";

/// `gib_per_unit` GiB for every 1536 tokens of context.
struct Linear {
    gib_per_unit: f64,
}

impl MemoryCalculator for Linear {
    fn calculate(
        &self,
        _model: &ModelProfile,
        context_length: u32,
    ) -> Result<MemoryBreakdown, CalculatorError> {
        let units = f64::from(context_length) / 1536.0;
        Ok(MemoryBreakdown::new(0.0, self.gib_per_unit * units, 0.0))
    }
}

struct Broken;

impl MemoryCalculator for Broken {
    fn calculate(
        &self,
        model: &ModelProfile,
        _context_length: u32,
    ) -> Result<MemoryBreakdown, CalculatorError> {
        Err(CalculatorError::MissingConfig(model.filename.clone()))
    }
}

fn catalog(min_gib: u32) -> ModelCatalog {
    ModelCatalog::new(vec![ModelProfile {
        repo: "Sakura-14B-Qwen2.5-v1.0-GGUF".to_string(),
        filename: MODEL.to_string(),
        sha256: String::new(),
        size_bytes: 8 * GIB,
        minimal_gpu_memory_gib: min_gib,
        base_model_id: "Qwen/Qwen2.5-14B-Instruct".to_string(),
        bytes_per_weight: 0.53,
        cached_config: None,
    }])
}

fn planner_with<C: MemoryCalculator>(min_gib: u32, calculator: C) -> CapacityPlanner<C> {
    CapacityPlanner::new(PlannerConfig::default(), catalog(min_gib), calculator)
}

fn registry_with(devices: Vec<Device>) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    for device in devices {
        registry.push_label(&device);
        registry.ingest(device);
    }
    registry
}

fn live_nvidia(available: u64) -> Device {
    Device::new("NVIDIA GeForce RTX 3090", Vendor::Nvidia, 24 * GIB)
        .with_pci_bus_id("00000000:01:00.0")
        .with_available_memory(available)
}

const LIVE_LABEL: &str = "NVIDIA GeForce RTX 3090 (GPU 1)";

#[test]
fn test_unresolvable_label_not_found() {
    let planner = planner_with(10, Linear { gib_per_unit: 1.2 });
    let mut registry = registry_with(vec![live_nvidia(24 * GIB)]);

    let ability = planner.check_ability(&mut registry, "Phantom GPU", MODEL, None, None);
    assert!(!ability.is_capable);
    assert!(ability.reason.contains("not found"));
}

#[test]
fn test_unsupported_vendor() {
    let planner = planner_with(0, Linear { gib_per_unit: 1.2 });
    let arc = Device::new("Intel(R) Arc(TM) A770", Vendor::Intel, 16 * GIB)
        .with_available_memory(16 * GIB);
    let mut registry = registry_with(vec![arc]);

    let ability = planner.check_ability(&mut registry, "Intel(R) Arc(TM) A770", MODEL, None, None);
    assert!(!ability.is_capable);
    assert!(ability.reason.contains("unsupported vendor"));
}

#[test]
fn test_dynamic_recommended_fit_is_cached() {
    let planner = planner_with(10, Linear { gib_per_unit: 1.2 });
    let mut registry = registry_with(vec![live_nvidia(24 * GIB)]);

    let ability = planner.check_ability(&mut registry, LIVE_LABEL, MODEL, None, None);
    assert!(ability.is_capable);
    assert!(ability.reason.is_empty());
    assert_eq!(
        registry.get("00000000:01:00.0").unwrap().last_ability,
        Some(ability)
    );
}

#[test]
fn test_dynamic_explicit_config_too_large() {
    let planner = planner_with(10, Linear { gib_per_unit: 1.2 });
    let mut registry = registry_with(vec![live_nvidia(8 * GIB)]);

    // 10 slots × 1536 tokens → 12 GiB required.
    let ability = planner.check_ability(&mut registry, LIVE_LABEL, MODEL, Some(15360), Some(10));
    assert!(!ability.is_capable);

    let required = ability.reason.find("12.00").unwrap();
    let available = ability.reason.find("8.00").unwrap();
    let total = ability.reason.find("24.00").unwrap();
    assert!(required < available && available < total, "{}", ability.reason);
}

#[test]
fn test_dynamic_partial_request_uses_recommendation() {
    let planner = planner_with(10, Linear { gib_per_unit: 1.2 });
    let mut registry = registry_with(vec![live_nvidia(8 * GIB)]);

    // Only one of the pair given: the recommendation (6 slots, 7.2 GiB) is checked.
    let ability = planner.check_ability(&mut registry, LIVE_LABEL, MODEL, Some(15360), None);
    assert!(ability.is_capable);
}

#[test]
fn test_dynamic_floor_reports_infeasible() {
    let planner = planner_with(0, Linear { gib_per_unit: 1.2 });
    let mut registry = registry_with(vec![live_nvidia(GIB)]);

    let ability = planner.check_ability(&mut registry, LIVE_LABEL, MODEL, None, None);
    assert!(!ability.is_capable);
    assert!(ability.reason.contains("1.20"));
}

#[test]
fn test_dynamic_unknown_model_is_permissive() {
    let planner = planner_with(10, Linear { gib_per_unit: 100.0 });
    let mut registry = registry_with(vec![live_nvidia(GIB)]);

    let ability = planner.check_ability(&mut registry, LIVE_LABEL, "unknown.gguf", None, None);
    assert!(ability.is_capable);
}

#[test]
fn test_calculator_failure_falls_back_to_static_minimum() {
    let mut registry = registry_with(vec![live_nvidia(2 * GIB)]);

    let strict = planner_with(32, Broken);
    let ability = strict.check_ability(&mut registry, LIVE_LABEL, MODEL, None, None);
    assert!(!ability.is_capable);
    assert!(ability.reason.contains("32.00 GiB"));
    assert!(ability.reason.contains("24.00 GiB total"));

    let lenient = planner_with(10, Broken);
    let ability = lenient.check_ability(&mut registry, LIVE_LABEL, MODEL, None, None);
    assert!(ability.is_capable);
    assert_eq!(
        registry.get("00000000:01:00.0").unwrap().last_ability,
        Some(ability),
        "a later check overwrites the cached verdict"
    );
}

#[test]
fn test_overflowing_architecture_falls_back_to_static() {
    let mut models: Vec<ModelProfile> = catalog(32).iter().cloned().collect();
    models[0].cached_config = Some(serde_json::json!({
        "num_hidden_layers": 1u64 << 40,
        "num_attention_heads": 1,
        "hidden_size": 1u64 << 20,
        "vocab_size": 152064
    }));
    let planner = CapacityPlanner::new(
        PlannerConfig::default(),
        ModelCatalog::new(models),
        GgufEstimator::default(),
    );
    let mut registry = registry_with(vec![live_nvidia(24 * GIB)]);

    let ability = planner.check_ability(&mut registry, LIVE_LABEL, MODEL, None, None);
    assert!(!ability.is_capable);
    assert!(ability.reason.contains("needs at least 32.00 GiB"), "{}", ability.reason);
    assert!(ability.reason.contains("24.00 GiB total"));
}

#[test]
fn test_static_mode_rounding_boundary() {
    let over_one_gib = Device::new("AMD Radeon RX 550", Vendor::Amd, GIB + 1);
    let mut registry = registry_with(vec![over_one_gib]);

    let two = planner_with(2, Linear { gib_per_unit: 1.0 });
    assert!(two
        .check_ability(&mut registry, "AMD Radeon RX 550", MODEL, None, None)
        .is_capable);

    let three = planner_with(3, Linear { gib_per_unit: 1.0 });
    let ability = three.check_ability(&mut registry, "AMD Radeon RX 550", MODEL, None, None);
    assert!(!ability.is_capable);
    assert!(ability.reason.contains("3.00 GiB"));
    assert!(ability.reason.contains("2.00 GiB total"));
}

#[test]
fn test_plan_recommends_and_sizes() {
    let planner = planner_with(10, Linear { gib_per_unit: 1.2 });
    let registry = registry_with(vec![live_nvidia(24 * GIB)]);

    let plan = planner.plan(&registry, LIVE_LABEL, MODEL).unwrap();
    assert_eq!(
        plan.config,
        RecommendedConfig {
            context_length: 24576,
            parallelism: 16
        }
    );
    assert!((plan.memory.total_size_gib - 19.2).abs() < 1e-9);
    assert_eq!(plan.available_gib, 24.0);
}

#[test]
fn test_plan_errors() {
    let planner = planner_with(10, Broken);
    let registry = registry_with(vec![live_nvidia(24 * GIB)]);

    assert!(matches!(
        planner.plan(&registry, "Phantom GPU", MODEL),
        Err(PlanError::DeviceNotFound(_))
    ));
    assert!(matches!(
        planner.plan(&registry, LIVE_LABEL, "unknown.gguf"),
        Err(PlanError::UnknownModel(_))
    ));
    assert!(matches!(
        planner.plan(&registry, LIVE_LABEL, MODEL),
        Err(PlanError::Calculator(_))
    ));
}
