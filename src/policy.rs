//! Plan Policy - Assembler Defaults as Enforceable Contracts
//!
//! A policy holds every Scene Plan field that is not derived from the prompt.
//! `PlanPolicy::default()` is the built-in policy; JSON documents may override
//! individual fields and omit the rest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::scene::{BrushDetail, NegativeConstraints};
use crate::ENGINE_VERSION;

pub type PolicyId = String;

pub const DEFAULT_POLICY_ID: &str = "default";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse policy: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid version in policy {policy}: {version}")]
    InvalidVersion { policy: String, version: String },

    #[error("Policy {policy} requires engine >= {required}, current is {current}")]
    EngineVersionMismatch {
        policy: String,
        required: String,
        current: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPolicy {
    #[serde(default = "default_id")]
    pub id: PolicyId,
    #[serde(default = "default_version")]
    pub policy_version: String,
    #[serde(default = "default_version")]
    pub engine_min_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub camera: CameraPolicy,
    #[serde(default)]
    pub composition: CompositionPolicy,
    #[serde(default)]
    pub subject: SubjectPolicy,
    #[serde(default)]
    pub art_style: ArtStylePolicy,
    #[serde(default)]
    pub negatives: NegativePolicy,
}

fn default_id() -> PolicyId { DEFAULT_POLICY_ID.to_string() }
fn default_version() -> String { "1.0.0".to_string() }
fn default_true() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPolicy {
    #[serde(default = "default_focal_length")]
    pub focal_length_mm: f32,
}

fn default_focal_length() -> f32 { 35.0 }

impl Default for CameraPolicy {
    fn default() -> Self {
        Self { focal_length_mm: default_focal_length() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPolicy {
    #[serde(default = "default_true")]
    pub allow_cropping: bool,
    #[serde(default = "default_true")]
    pub center_main_subject: bool,
}

impl Default for CompositionPolicy {
    fn default() -> Self {
        Self {
            allow_cropping: true,
            center_main_subject: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPolicy {
    #[serde(default = "default_position_hint")]
    pub position_hint: String,
}

fn default_position_hint() -> String { "center".to_string() }

impl Default for SubjectPolicy {
    fn default() -> Self {
        Self { position_hint: default_position_hint() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtStylePolicy {
    #[serde(default = "default_brush_detail")]
    pub brush_detail: BrushDetail,
}

fn default_brush_detail() -> BrushDetail { BrushDetail::Normal }

impl Default for ArtStylePolicy {
    fn default() -> Self {
        Self { brush_detail: default_brush_detail() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativePolicy {
    #[serde(default = "default_visual_artifacts")]
    pub visual_artifacts: String,
    #[serde(default = "default_content_exclusions")]
    pub content_exclusions: String,
}

fn default_visual_artifacts() -> String {
    "blurry, extra limbs, distorted faces, text artifacts".to_string()
}

fn default_content_exclusions() -> String {
    "no gore, no real-world logos".to_string()
}

impl Default for NegativePolicy {
    fn default() -> Self {
        Self {
            visual_artifacts: default_visual_artifacts(),
            content_exclusions: default_content_exclusions(),
        }
    }
}

impl NegativePolicy {
    pub fn to_constraints(&self) -> NegativeConstraints {
        NegativeConstraints {
            visual_artifacts: self.visual_artifacts.clone(),
            content_exclusions: self.content_exclusions.clone(),
        }
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            id: default_id(),
            policy_version: default_version(),
            engine_min_version: default_version(),
            description: "Built-in scene plan policy".to_string(),
            camera: CameraPolicy::default(),
            composition: CompositionPolicy::default(),
            subject: SubjectPolicy::default(),
            art_style: ArtStylePolicy::default(),
            negatives: NegativePolicy::default(),
        }
    }
}

impl PlanPolicy {
    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Reject a policy written for a newer engine than this one.
    pub fn check_engine_version(&self) -> Result<(), PolicyError> {
        let invalid = |version: &str| PolicyError::InvalidVersion {
            policy: self.id.clone(),
            version: version.to_string(),
        };
        let engine = semver::Version::parse(ENGINE_VERSION).map_err(|_| invalid(ENGINE_VERSION))?;
        let required = semver::Version::parse(&self.engine_min_version)
            .map_err(|_| invalid(&self.engine_min_version))?;

        if engine < required {
            return Err(PolicyError::EngineVersionMismatch {
                policy: self.id.clone(),
                required: self.engine_min_version.clone(),
                current: ENGINE_VERSION.to_string(),
            });
        }
        Ok(())
    }
}

/// Policy registry - the built-in default plus any loaded documents.
pub struct PolicyRegistry {
    policies: BTreeMap<PolicyId, PlanPolicy>,
}

impl PolicyRegistry {
    /// Registry holding only the built-in default policy.
    pub fn new() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(DEFAULT_POLICY_ID.to_string(), PlanPolicy::default());
        Self { policies }
    }

    /// Load every `*.json` policy in `dir`. Unreadable or malformed files are
    /// skipped; a missing directory yields the default-only registry.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::new();
        if !dir.exists() {
            return Ok(registry);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                match PlanPolicy::load(&path) {
                    Ok(policy) => {
                        debug!(policy = %policy.id, path = %path.display(), "policy loaded");
                        registry.register(policy);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping policy"),
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&PlanPolicy> {
        self.policies.get(id)
    }

    /// Policies ordered by id.
    pub fn list(&self) -> Vec<&PlanPolicy> {
        self.policies.values().collect()
    }

    pub fn register(&mut self, policy: PlanPolicy) {
        self.policies.insert(policy.id.clone(), policy);
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_fixed_fields() {
        let p = PlanPolicy::default();
        assert_eq!(p.camera.focal_length_mm, 35.0);
        assert!(p.composition.allow_cropping);
        assert!(p.composition.center_main_subject);
        assert_eq!(p.subject.position_hint, "center");
        assert_eq!(p.art_style.brush_detail, BrushDetail::Normal);
        assert_eq!(
            p.negatives.visual_artifacts,
            "blurry, extra limbs, distorted faces, text artifacts"
        );
        assert_eq!(p.negatives.content_exclusions, "no gore, no real-world logos");
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let p = PlanPolicy::from_json(
            r#"{"id": "portrait-85", "camera": {"focalLengthMm": 85.0}, "artStyle": {"brushDetail": "high"}}"#,
        )
        .unwrap();
        assert_eq!(p.id, "portrait-85");
        assert_eq!(p.camera.focal_length_mm, 85.0);
        assert_eq!(p.art_style.brush_detail, BrushDetail::High);
        assert_eq!(p.subject.position_hint, "center");
        assert_eq!(p.negatives, NegativePolicy::default());
    }

    #[test]
    fn test_unknown_brush_detail_rejected() {
        let err = PlanPolicy::from_json(r#"{"artStyle": {"brushDetail": "extreme"}}"#).unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn test_engine_version_gate() {
        let mut p = PlanPolicy::default();
        assert!(p.check_engine_version().is_ok());

        p.engine_min_version = "99.0.0".to_string();
        assert!(matches!(
            p.check_engine_version(),
            Err(PolicyError::EngineVersionMismatch { .. })
        ));

        p.engine_min_version = "not-a-version".to_string();
        assert!(matches!(
            p.check_engine_version(),
            Err(PolicyError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_registry_always_has_default() {
        let registry = PolicyRegistry::new();
        assert!(registry.get(DEFAULT_POLICY_ID).is_some());
        assert_eq!(registry.list().len(), 1);
    }
}
