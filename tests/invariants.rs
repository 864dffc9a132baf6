//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::fs;

use sceneplan_core::{
    build_scene_spec, compute_control_hash,
    pipeline::PipelineError,
    policy::PolicyError,
    sanitize::SanitizeError,
    AspectRatio, CameraAngle, CompileRequest, CompositionRule, GenerationMode, Lighting,
    PolicyRegistry, QualityPreset, SafetyProfile, ScenePipeline,
};

fn compile(prompt: &str) -> Result<sceneplan_core::CompiledScene, PipelineError> {
    build_scene_spec(
        prompt,
        GenerationMode::TextToImage,
        SafetyProfile::Safe,
        QualityPreset::High,
    )
}

#[test]
fn invariant_portrait_keyword_outranks_explicit_wide_ratio() {
    let compiled = compile("A cinematic portrait, 16:9, soft lighting, rule of thirds").unwrap();
    let plan = &compiled.scene_plan;

    // The vertical rule is evaluated first, so "portrait" decides the ratio
    assert_eq!(plan.aspect_ratio(), AspectRatio::Ratio9x16);
    assert_eq!(plan.color_lighting().lighting, Lighting::Soft);
    assert_eq!(plan.composition().rule, CompositionRule::RuleOfThirds);
    assert_eq!(plan.camera().angle, CameraAngle::EyeLevel);
    assert!(!plan.camera().depth_of_field);
    assert_eq!(plan.quality_preset(), QualityPreset::High);
}

#[test]
fn invariant_empty_input_rejected() {
    let result = compile("");
    assert!(matches!(
        result,
        Err(PipelineError::InputRejected(SanitizeError::InvalidInput(_)))
    ));
}

#[test]
fn invariant_whitespace_only_input_exhausted() {
    let result = compile("   ");
    assert!(matches!(
        result,
        Err(PipelineError::InputRejected(SanitizeError::SanitizationExhausted(_)))
    ));
}

#[test]
fn invariant_control_only_input_exhausted() {
    let pipeline = ScenePipeline::default();
    let request = CompileRequest::new(
        "\u{1}\u{2}\r\u{7f}",
        GenerationMode::TextToImage,
        SafetyProfile::Safe,
        QualityPreset::Standard,
    );
    assert!(matches!(
        pipeline.compile(&request),
        Err(PipelineError::InputRejected(SanitizeError::SanitizationExhausted(_)))
    ));
}

#[test]
fn invariant_full_scene_classification() {
    let compiled =
        compile("close-up of a dragon in a foggy forest at night, anime style, 9:16").unwrap();
    let plan = &compiled.scene_plan;

    assert_eq!(plan.camera().angle, CameraAngle::CloseUp);
    assert!(plan.camera().depth_of_field);
    assert_eq!(plan.background().environment, "forest");
    assert_eq!(plan.background().weather, "foggy");
    assert_eq!(plan.background().time_of_day, "night");
    assert_eq!(plan.art_style().style.as_str(), "anime");
    assert_eq!(plan.aspect_ratio(), AspectRatio::Ratio9x16);

    // Subject guess takes the last non-stop-word token, which here is the ratio
    assert_eq!(plan.primary_subject().name, "9:16");
}

#[test]
fn invariant_fixed_fields_from_default_policy() {
    let compiled = compile("a lighthouse").unwrap();
    let plan = &compiled.scene_plan;

    assert_eq!(plan.primary_subject().name, "lighthouse");
    assert_eq!(plan.primary_subject().attributes, "");
    assert_eq!(plan.primary_subject().position_hint, "center");
    assert!(plan.secondary_subjects().is_empty());
    assert_eq!(plan.camera().focal_length_mm, 35.0);
    assert!(plan.composition().allow_cropping);
    assert!(plan.composition().center_main_subject);
    assert_eq!(plan.art_style().brush_detail.as_str(), "normal");
    assert_eq!(plan.art_style().era_hint, "");
    assert_eq!(plan.color_lighting().palette_hint, "");
    assert_eq!(
        plan.negative_constraints().visual_artifacts,
        "blurry, extra limbs, distorted faces, text artifacts"
    );
    assert_eq!(
        plan.negative_constraints().content_exclusions,
        "no gore, no real-world logos"
    );
}

#[test]
fn invariant_compile_is_deterministic() {
    let prompt = "Isometric pastel city at dawn, leading lines";
    let first = compile(prompt).unwrap();
    let second = compile(prompt).unwrap();

    assert_eq!(first.scene_plan, second.scene_plan);
    assert_eq!(first.json_control, second.json_control);
    assert_eq!(
        compute_control_hash(&first.json_control),
        compute_control_hash(&second.json_control)
    );
}

#[test]
fn invariant_manifest_hashes_stable() {
    let pipeline = ScenePipeline::default();
    let request = CompileRequest::new(
        "a koi pond in the rain",
        GenerationMode::TextToImage,
        SafetyProfile::Safe,
        QualityPreset::Draft,
    );

    let (_, m1) = pipeline.compile_with_manifest(&request).unwrap();
    let (_, m2) = pipeline.compile_with_manifest(&request).unwrap();

    // Hashes are reproducible, ids are not
    assert_eq!(m1.control_hash, m2.control_hash);
    assert_eq!(m1.job_hash, m2.job_hash);
    assert_ne!(m1.id, m2.id);
    assert_eq!(m1.policy_id, "default");
}

#[test]
fn invariant_json_key_order_frozen() {
    let json = compile("a fox").unwrap().json_control;

    let keys = [
        "\"core_prompt\"",
        "\"mode\"",
        "\"safety_profile\"",
        "\"quality_preset\"",
        "\"aspect_ratio\"",
        "\"primary_subject\"",
        "\"secondary_subjects\"",
        "\"background\"",
        "\"color_lighting\"",
        "\"camera\"",
        "\"composition\"",
        "\"art_style\"",
        "\"negative_constraints\"",
    ];
    let positions: Vec<usize> = keys
        .iter()
        .map(|k| json.find(k).unwrap_or_else(|| panic!("missing key {}", k)))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert!(json.contains(r#""camera":{"angle":"eye-level","focal_length_mm":35.0,"depth_of_field":false}"#));
    assert!(json.contains(r#""mode":"text-to-image","safety_profile":"safe","quality_preset":"high""#));
}

#[test]
fn invariant_prompt_quotes_escaped_in_json() {
    let json = compile(r#"a sign reading "open" \ closed"#).unwrap().json_control;
    assert!(json.contains(r#""core_prompt":"a sign reading \"open\" \\ closed""#));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["core_prompt"], r#"a sign reading "open" \ closed"#);
}

#[test]
fn invariant_blocklisted_terms_never_reach_output() {
    let compiled = compile("an NSFW explicit scene of a cat").unwrap();
    assert_eq!(compiled.scene_plan.core_prompt(), "an **** ******** scene of a cat");
    assert!(!compiled.json_control.to_lowercase().contains("nsfw"));
}

#[test]
fn invariant_policies_loaded_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("studio.json"),
        r#"{"id": "studio", "policyVersion": "2.1.0", "camera": {"focalLengthMm": 85.0}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("broken.json"), "{not json").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let registry = PolicyRegistry::load_from_dir(dir.path()).unwrap();
    let ids: Vec<&str> = registry.list().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["default", "studio"]);

    let pipeline = ScenePipeline::new(registry);
    let mut request = CompileRequest::new(
        "a portrait shot of an astronaut",
        GenerationMode::TextToImage,
        SafetyProfile::Safe,
        QualityPreset::Ultra,
    );
    request.policy_id = Some("studio".to_string());

    let (compiled, manifest) = pipeline.compile_with_manifest(&request).unwrap();
    assert_eq!(compiled.scene_plan.camera().focal_length_mm, 85.0);
    assert!(compiled.json_control.contains(r#""focal_length_mm":85.0"#));
    // Unset policy fields keep their defaults
    assert_eq!(compiled.scene_plan.primary_subject().position_hint, "center");
    assert_eq!(manifest.policy_id, "studio");
    assert_eq!(manifest.policy_version, "2.1.0");
}

#[test]
fn invariant_policy_for_newer_engine_rejected() {
    let mut registry = PolicyRegistry::new();
    registry.register(
        sceneplan_core::PlanPolicy::from_json(r#"{"id": "future", "engineMinVersion": "99.0.0"}"#)
            .unwrap(),
    );
    let pipeline = ScenePipeline::new(registry);

    let mut request = CompileRequest::new(
        "a cat",
        GenerationMode::TextToImage,
        SafetyProfile::Safe,
        QualityPreset::Standard,
    );
    request.policy_id = Some("future".to_string());

    let result = pipeline.compile(&request);
    assert!(matches!(
        result,
        Err(PipelineError::Policy(PolicyError::EngineVersionMismatch { .. }))
    ));
}

#[test]
fn invariant_missing_policy_dir_yields_default() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PolicyRegistry::load_from_dir(&dir.path().join("absent")).unwrap();
    assert_eq!(registry.list().len(), 1);
    assert!(registry.get("default").is_some());
}

#[cfg(feature = "test-hooks")]
#[test]
fn invariant_rejected_input_never_classified() {
    use sceneplan_core::pipeline::{get_classify_call_count, reset_classify_call_count};

    reset_classify_call_count();
    assert!(compile("").is_err());
    assert!(compile(" \t\n ").is_err());
    assert_eq!(get_classify_call_count(), 0);

    compile("a cat").unwrap();
    assert_eq!(get_classify_call_count(), 1);
}
