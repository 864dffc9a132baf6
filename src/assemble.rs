//! Scene Plan Assembler
//!
//! Merges classifier output with policy defaults. Total: any sanitized
//! prompt produces a plan.

use crate::classify::{Classification, ClassifierBank};
use crate::policy::PlanPolicy;
use crate::sanitize::SanitizedPrompt;
use crate::scene::{
    ArtStyleDescriptor, BackgroundDescriptor, CameraAngle, CameraDescriptor,
    ColorLightingDescriptor, CompositionDescriptor, GenerationMode, QualityPreset, SafetyProfile,
    ScenePlan, SubjectDescriptor,
};

/// Build a plan using the built-in policy.
pub fn assemble(
    prompt: &SanitizedPrompt,
    mode: GenerationMode,
    safety: SafetyProfile,
    quality: QualityPreset,
) -> ScenePlan {
    assemble_with_policy(&PlanPolicy::default(), prompt, mode, safety, quality)
}

pub fn assemble_with_policy(
    policy: &PlanPolicy,
    prompt: &SanitizedPrompt,
    mode: GenerationMode,
    safety: SafetyProfile,
    quality: QualityPreset,
) -> ScenePlan {
    let classification = ClassifierBank::new().classify(prompt);
    from_classification(policy, prompt, classification, mode, safety, quality)
}

pub(crate) fn from_classification(
    policy: &PlanPolicy,
    prompt: &SanitizedPrompt,
    c: Classification,
    mode: GenerationMode,
    safety: SafetyProfile,
    quality: QualityPreset,
) -> ScenePlan {
    ScenePlan {
        core_prompt: prompt.clone(),
        mode,
        safety_profile: safety,
        quality_preset: quality,
        aspect_ratio: c.aspect_ratio,
        primary_subject: SubjectDescriptor {
            name: c.subject_name,
            attributes: String::new(),
            position_hint: policy.subject.position_hint.clone(),
        },
        secondary_subjects: Vec::new(),
        background: BackgroundDescriptor {
            environment: c.environment.to_string(),
            time_of_day: c.time_of_day.to_string(),
            weather: c.weather.to_string(),
        },
        color_lighting: ColorLightingDescriptor {
            color_tone: c.color_tone,
            lighting: c.lighting,
            palette_hint: String::new(),
        },
        camera: CameraDescriptor {
            angle: c.camera_angle,
            focal_length_mm: policy.camera.focal_length_mm,
            depth_of_field: c.camera_angle == CameraAngle::CloseUp,
        },
        composition: CompositionDescriptor {
            rule: c.composition,
            allow_cropping: policy.composition.allow_cropping,
            center_main_subject: policy.composition.center_main_subject,
        },
        art_style: ArtStyleDescriptor {
            style: c.art_style,
            brush_detail: policy.art_style.brush_detail,
            era_hint: String::new(),
        },
        negative_constraints: policy.negatives.to_constraints(),
    }
}
