//! Compilation Pipeline - Single Entry Point
//!
//! RawInput -> Sanitized -> Classified -> Assembled -> Serialized.
//! Only sanitization and policy lookup can reject a request; once
//! classification starts every stage is total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::assemble::from_classification;
use crate::canonical::serialize_scene_plan;
use crate::classify::{ClassifierBank, FacetVerdict};
use crate::hashing::{compute_control_hash, compute_job_hash};
use crate::policy::{PlanPolicy, PolicyError, PolicyRegistry, DEFAULT_POLICY_ID};
use crate::sanitize::{
    sanitize, sanitize_filename, sanitize_image_url, SanitizeError, SanitizedPrompt,
};
use crate::scene::{GenerationMode, QualityPreset, SafetyProfile, ScenePlan};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::cell::Cell;

#[cfg(feature = "test-hooks")]
thread_local! {
    static CLASSIFY_CALL_COUNT: Cell<u32> = const { Cell::new(0) };
}

/// Number of classification passes run on the current thread.
#[cfg(feature = "test-hooks")]
pub fn get_classify_call_count() -> u32 {
    CLASSIFY_CALL_COUNT.with(Cell::get)
}

#[cfg(feature = "test-hooks")]
pub fn reset_classify_call_count() {
    CLASSIFY_CALL_COUNT.with(|c| c.set(0));
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input rejected: {0}")]
    InputRejected(#[from] SanitizeError),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub raw_prompt: String,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub safety_profile: SafetyProfile,
    #[serde(default)]
    pub quality_preset: QualityPreset,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub reference_image_url: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
}

impl CompileRequest {
    pub fn new(
        raw_prompt: impl Into<String>,
        mode: GenerationMode,
        safety_profile: SafetyProfile,
        quality_preset: QualityPreset,
    ) -> Self {
        Self {
            raw_prompt: raw_prompt.into(),
            mode,
            safety_profile,
            quality_preset,
            policy_id: None,
            reference_image_url: None,
            output_name: None,
        }
    }
}

/// The plan and its JSON control spec, always produced together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledScene {
    pub scene_plan: ScenePlan,
    pub json_control: String,
}

/// Provenance for one compilation. Only the hashes are reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub policy_id: String,
    pub policy_version: String,
    pub control_hash: String,
    pub job_hash: String,
    #[serde(default)]
    pub reference_image_url: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
}

/// The scene compiler - single entry point for prompt compilation
pub struct ScenePipeline {
    registry: PolicyRegistry,
    bank: ClassifierBank,
}

impl ScenePipeline {
    pub fn new(registry: PolicyRegistry) -> Self {
        Self {
            registry,
            bank: ClassifierBank::new(),
        }
    }

    pub fn list_policies(&self) -> Vec<&PlanPolicy> {
        self.registry.list()
    }

    pub fn get_policy(&self, id: &str) -> Option<&PlanPolicy> {
        self.registry.get(id)
    }

    /// Compile a request into a plan plus JSON control spec.
    pub fn compile(&self, request: &CompileRequest) -> Result<CompiledScene, PipelineError> {
        let prompt = sanitize(&request.raw_prompt)?;
        let policy = self.resolve_policy(request.policy_id.as_deref())?;
        self.compile_sanitized(policy, &prompt, request)
    }

    /// Compile and attach a provenance manifest.
    ///
    /// Every user-controlled field is sanitized before classification runs.
    pub fn compile_with_manifest(
        &self,
        request: &CompileRequest,
    ) -> Result<(CompiledScene, SceneManifest), PipelineError> {
        let prompt = sanitize(&request.raw_prompt)?;
        let reference_image_url = request
            .reference_image_url
            .as_deref()
            .map(sanitize_image_url)
            .transpose()?;
        let output_name = request
            .output_name
            .as_deref()
            .map(sanitize_filename)
            .transpose()?;

        let policy = self.resolve_policy(request.policy_id.as_deref())?;
        let compiled = self.compile_sanitized(policy, &prompt, request)?;

        let manifest = SceneManifest {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            policy_id: policy.id.clone(),
            policy_version: policy.policy_version.clone(),
            control_hash: compute_control_hash(&compiled.json_control),
            job_hash: compute_job_hash(
                &policy.id,
                &policy.policy_version,
                &compiled.json_control,
                ENGINE_VERSION,
            ),
            reference_image_url,
            output_name,
        };

        Ok((compiled, manifest))
    }

    #[instrument(skip_all, fields(policy = %policy.id, mode = %request.mode, quality = %request.quality_preset))]
    fn compile_sanitized(
        &self,
        policy: &PlanPolicy,
        prompt: &SanitizedPrompt,
        request: &CompileRequest,
    ) -> Result<CompiledScene, PipelineError> {
        #[cfg(feature = "test-hooks")]
        CLASSIFY_CALL_COUNT.with(|c| c.set(c.get() + 1));

        let classification = self.bank.classify(prompt);
        let scene_plan = from_classification(
            policy,
            prompt,
            classification,
            request.mode,
            request.safety_profile,
            request.quality_preset,
        );
        let json_control = serialize_scene_plan(&scene_plan)?;

        debug!(
            aspect_ratio = %scene_plan.aspect_ratio(),
            json_bytes = json_control.len(),
            "scene compiled"
        );

        Ok(CompiledScene {
            scene_plan,
            json_control,
        })
    }

    /// Per-facet audit of which classifier rule fired.
    pub fn explain(&self, raw_prompt: &str) -> Result<Vec<FacetVerdict>, PipelineError> {
        let prompt = sanitize(raw_prompt)?;
        Ok(self.bank.explain(&prompt))
    }

    fn resolve_policy(&self, id: Option<&str>) -> Result<&PlanPolicy, PipelineError> {
        let id = id.unwrap_or(DEFAULT_POLICY_ID);
        let policy = self
            .registry
            .get(id)
            .ok_or_else(|| PipelineError::PolicyNotFound(id.to_string()))?;
        policy.check_engine_version()?;
        Ok(policy)
    }
}

impl Default for ScenePipeline {
    fn default() -> Self {
        Self::new(PolicyRegistry::default())
    }
}

/// Compile with the built-in policy.
pub fn build_scene_spec(
    raw_prompt: &str,
    mode: GenerationMode,
    safety: SafetyProfile,
    quality: QualityPreset,
) -> Result<CompiledScene, PipelineError> {
    ScenePipeline::default().compile(&CompileRequest::new(raw_prompt, mode, safety, quality))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_pipeline_is_shareable_across_threads() {
        assert_send_sync::<ScenePipeline>();
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: CompileRequest = serde_json::from_str(r#"{"raw_prompt": "a cat"}"#).unwrap();
        assert_eq!(request.mode, GenerationMode::TextToImage);
        assert_eq!(request.safety_profile, SafetyProfile::Safe);
        assert_eq!(request.quality_preset, QualityPreset::Standard);
        assert!(request.policy_id.is_none());
    }

    #[test]
    fn test_unknown_policy_rejected_after_sanitizing() {
        let pipeline = ScenePipeline::default();
        let mut request = CompileRequest::new(
            "a cat",
            GenerationMode::TextToImage,
            SafetyProfile::Safe,
            QualityPreset::Draft,
        );
        request.policy_id = Some("missing".to_string());
        assert!(matches!(
            pipeline.compile(&request),
            Err(PipelineError::PolicyNotFound(id)) if id == "missing"
        ));

        request.raw_prompt = String::new();
        assert!(matches!(
            pipeline.compile(&request),
            Err(PipelineError::InputRejected(SanitizeError::InvalidInput(_)))
        ));
    }

    #[test]
    fn test_manifest_sanitizes_auxiliary_fields() {
        let pipeline = ScenePipeline::default();
        let mut request = CompileRequest::new(
            "a cat",
            GenerationMode::ImageToImage,
            SafetyProfile::Safe,
            QualityPreset::High,
        );
        request.reference_image_url = Some(" https://cdn.example.com/cat.png ".to_string());
        request.output_name = Some("cats/hero:1.png".to_string());

        let (compiled, manifest) = pipeline.compile_with_manifest(&request).unwrap();
        assert_eq!(
            manifest.reference_image_url.as_deref(),
            Some("https://cdn.example.com/cat.png")
        );
        assert_eq!(manifest.output_name.as_deref(), Some("catshero1.png"));
        assert_eq!(manifest.control_hash, compute_control_hash(&compiled.json_control));
        assert!(!compiled.json_control.contains("cdn.example.com"));
    }

    #[test]
    fn test_manifest_rejects_bad_reference_url() {
        let pipeline = ScenePipeline::default();
        let mut request = CompileRequest::new(
            "a cat",
            GenerationMode::Inpaint,
            SafetyProfile::Safe,
            QualityPreset::High,
        );
        request.reference_image_url = Some("file:///etc/passwd".to_string());
        assert!(matches!(
            pipeline.compile_with_manifest(&request),
            Err(PipelineError::InputRejected(SanitizeError::UnsupportedUrlScheme))
        ));
    }

    #[test]
    fn test_manifest_fields_checked_before_policy_lookup() {
        let pipeline = ScenePipeline::default();
        let mut request = CompileRequest::new(
            "a cat",
            GenerationMode::Outpaint,
            SafetyProfile::Safe,
            QualityPreset::Standard,
        );
        request.policy_id = Some("missing".to_string());
        request.output_name = Some("///".to_string());
        assert!(matches!(
            pipeline.compile_with_manifest(&request),
            Err(PipelineError::InputRejected(SanitizeError::SanitizationExhausted("filename")))
        ));

        request.output_name = None;
        assert!(matches!(
            pipeline.compile_with_manifest(&request),
            Err(PipelineError::PolicyNotFound(id)) if id == "missing"
        ));
    }

    #[cfg(feature = "test-hooks")]
    #[test]
    fn test_bad_manifest_field_skips_classification() {
        let pipeline = ScenePipeline::default();
        let mut request = CompileRequest::new(
            "a cat",
            GenerationMode::ImageToImage,
            SafetyProfile::Safe,
            QualityPreset::Standard,
        );
        request.reference_image_url = Some("ftp://example.com/cat.png".to_string());

        reset_classify_call_count();
        assert!(pipeline.compile_with_manifest(&request).is_err());
        assert_eq!(get_classify_call_count(), 0);

        request.reference_image_url = Some("https://example.com/cat.png".to_string());
        pipeline.compile_with_manifest(&request).unwrap();
        assert_eq!(get_classify_call_count(), 1);
    }
}
