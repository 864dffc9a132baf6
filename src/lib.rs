//! Scene Plan Core - Prompt to Control-Spec Compiler
//!
//! # Guarantees
//! 1. Untrusted Text Never Reaches a Backend Unsanitized
//! 2. Precedence Is Data (ordered rule tables, first match wins)
//! 3. Plans Are Immutable
//! 4. Deterministic Output
//! 5. Wire Format Is Frozen (key order, escaping, enum spellings)

pub mod scene;
pub mod sanitize;
pub mod classify;
pub mod policy;
pub mod assemble;
pub mod canonical;
pub mod hashing;
pub mod pipeline;
pub mod trace;

pub use scene::{
    ArtStyle, AspectRatio, BrushDetail, CameraAngle, ColorTone, CompositionRule, GenerationMode,
    Lighting, QualityPreset, SafetyProfile, ScenePlan,
};
pub use sanitize::{sanitize, SanitizeError, SanitizedPrompt};
pub use classify::{ClassifierBank, FacetVerdict};
pub use policy::{PlanPolicy, PolicyRegistry};
pub use assemble::{assemble, assemble_with_policy};
pub use canonical::{serialize_scene_plan, to_canonical_json};
pub use hashing::{compute_control_hash, compute_job_hash};
pub use pipeline::{build_scene_spec, CompileRequest, CompiledScene, PipelineError, SceneManifest, ScenePipeline};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
