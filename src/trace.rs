//! Visual Trace - Backend Seams and Provenance Vectors
//!
//! Encoders, latent generators and decoders are black boxes injected at
//! construction. This module fixes the vector shapes they exchange and how
//! the compact trace vector is mixed from them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sanitize::SanitizedPrompt;

pub const VISUAL_EMB_DIM: usize = 1024;
pub const LATENT_IMAGE_DIM: usize = 256;
pub const LATENT_ASSET_DIM: usize = 384;
pub const LATENT_STYLE_DIM: usize = 64;
pub const TRACE_VECTOR_DIM: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("{what} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("RGB buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    ImageBufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloatVec(pub Vec<f32>);

impl FloatVec {
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn norm_l2(&self) -> f64 {
        self.0.iter().map(|&v| f64::from(v) * f64::from(v)).sum::<f64>().sqrt()
    }

    /// Scale to unit length. Zero vectors are left untouched.
    pub fn normalize_l2(&mut self) {
        let norm = self.norm_l2();
        if norm <= 0.0 {
            return;
        }
        let inv = (1.0 / norm) as f32;
        for v in &mut self.0 {
            *v *= inv;
        }
    }

    fn expect_dim(&self, what: &'static str, expected: usize) -> Result<(), TraceError> {
        if self.dim() != expected {
            return Err(TraceError::DimensionMismatch {
                what,
                expected,
                actual: self.dim(),
            });
        }
        Ok(())
    }
}

/// Borrowed 8-bit RGB image, HWC layout, no row padding.
#[derive(Debug, Clone, Copy)]
pub struct RgbImage<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl RgbImage<'_> {
    fn check(&self) -> Result<(), TraceError> {
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(TraceError::ImageBufferSize {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEmbedding {
    pub global: FloatVec,
    #[serde(default)]
    pub patches: Vec<FloatVec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentBundle {
    pub image: FloatVec,
    pub asset: FloatVec,
    pub style: FloatVec,
}

impl LatentBundle {
    pub fn zeros() -> Self {
        Self {
            image: FloatVec::zeros(LATENT_IMAGE_DIM),
            asset: FloatVec::zeros(LATENT_ASSET_DIM),
            style: FloatVec::zeros(LATENT_STYLE_DIM),
        }
    }
}

pub trait VisualEncoder: Send + Sync {
    fn encode(&self, image: &RgbImage<'_>) -> VisualEmbedding;
}

pub trait LatentGenerator: Send + Sync {
    fn generate_latents(&self, visual: &VisualEmbedding, text: &FloatVec, seed: u64) -> LatentBundle;
}

pub trait ImageDecoder: Send + Sync {
    /// RGBA bytes, `width * height * 4` long.
    fn decode_image(&self, latents: &LatentBundle, width: u32, height: u32) -> Vec<u8>;
}

pub trait AssetDecoder: Send + Sync {
    /// Serialized asset blob (GLB, USDZ, ...).
    fn decode_asset(&self, latents: &LatentBundle) -> Vec<u8>;
}

#[derive(Debug, Clone)]
pub struct TraceRequest {
    pub request_id: String,
    pub text_prompt: SanitizedPrompt,
    pub text_vec: FloatVec,
    pub seed: u64,
    pub want_image: bool,
    pub want_asset: bool,
    pub out_width: u32,
    pub out_height: u32,
}

/// Provenance record for one generated output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualTrace {
    pub request_id: String,
    pub text_prompt: SanitizedPrompt,
    pub visual_input: VisualEmbedding,
    pub latents: LatentBundle,
    pub trace_vector: FloatVec,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct TraceOutput {
    pub trace: VisualTrace,
    /// Empty unless an image was requested and a decoder is installed.
    pub image_rgba: Vec<u8>,
    /// Empty unless an asset was requested and a decoder is installed.
    pub asset_bytes: Vec<u8>,
}

pub struct TracePipeline {
    encoder: Box<dyn VisualEncoder>,
    generator: Box<dyn LatentGenerator>,
    image_decoder: Option<Box<dyn ImageDecoder>>,
    asset_decoder: Option<Box<dyn AssetDecoder>>,
}

impl TracePipeline {
    pub fn new(
        encoder: impl VisualEncoder + 'static,
        generator: impl LatentGenerator + 'static,
    ) -> Self {
        Self {
            encoder: Box::new(encoder),
            generator: Box::new(generator),
            image_decoder: None,
            asset_decoder: None,
        }
    }

    pub fn with_image_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.image_decoder = Some(Box::new(decoder));
        self
    }

    pub fn with_asset_decoder(mut self, decoder: impl AssetDecoder + 'static) -> Self {
        self.asset_decoder = Some(Box::new(decoder));
        self
    }

    /// Encode, generate latents, optionally decode, then mix the trace vector.
    pub fn run(&self, image: &RgbImage<'_>, request: &TraceRequest) -> Result<TraceOutput, TraceError> {
        image.check()?;

        let mut visual_input = self.encoder.encode(image);
        visual_input.global.expect_dim("visual embedding", VISUAL_EMB_DIM)?;
        visual_input.global.normalize_l2();

        let latents = self
            .generator
            .generate_latents(&visual_input, &request.text_vec, request.seed);
        latents.image.expect_dim("image latent", LATENT_IMAGE_DIM)?;
        latents.asset.expect_dim("asset latent", LATENT_ASSET_DIM)?;
        latents.style.expect_dim("style latent", LATENT_STYLE_DIM)?;

        let image_rgba = match (&self.image_decoder, request.want_image) {
            (Some(decoder), true) => decoder.decode_image(&latents, request.out_width, request.out_height),
            _ => Vec::new(),
        };
        let asset_bytes = match (&self.asset_decoder, request.want_asset) {
            (Some(decoder), true) => decoder.decode_asset(&latents),
            _ => Vec::new(),
        };

        let trace_vector = build_trace_vector(&visual_input.global, &latents);
        debug!(
            request_id = %request.request_id,
            image_bytes = image_rgba.len(),
            asset_bytes = asset_bytes.len(),
            "visual trace built"
        );

        Ok(TraceOutput {
            trace: VisualTrace {
                request_id: request.request_id.clone(),
                text_prompt: request.text_prompt.clone(),
                visual_input,
                latents,
                trace_vector,
                seed: request.seed,
                width: request.out_width,
                height: request.out_height,
            },
            image_rgba,
            asset_bytes,
        })
    }
}

/// visual + 0.5 * image + 0.5 * asset over the first TRACE_VECTOR_DIM slots,
/// plus 0.25 * style folded modulo TRACE_VECTOR_DIM, then L2-normalized.
pub fn build_trace_vector(visual: &FloatVec, latents: &LatentBundle) -> FloatVec {
    let mut tv = vec![0.0f32; TRACE_VECTOR_DIM];

    for (slot, v) in tv.iter_mut().zip(&visual.0) {
        *slot += v;
    }
    for (slot, v) in tv.iter_mut().zip(&latents.image.0) {
        *slot += 0.5 * v;
    }
    for (slot, v) in tv.iter_mut().zip(&latents.asset.0) {
        *slot += 0.5 * v;
    }
    for (i, v) in latents.style.0.iter().enumerate() {
        tv[i % TRACE_VECTOR_DIM] += 0.25 * v;
    }

    let mut tv = FloatVec(tv);
    tv.normalize_l2();
    tv
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderFamily {
    Vit,
    ConvNextLike,
}

/// Planning figures for an encoder at 224x224. Nominal, not measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncoderProfile {
    pub family: EncoderFamily,
    pub name: &'static str,
    pub params_millions: f32,
    pub gflops_224: f32,
    pub latency_ms_cpu: f32,
    pub latency_ms_npu: f32,
    pub peak_mem_mb_224: f32,
    pub peak_mem_mb_512: f32,
}

pub static VIT_SMALL: EncoderProfile = EncoderProfile {
    family: EncoderFamily::Vit,
    name: "ViT-Small-224",
    params_millions: 21.0,
    gflops_224: 4.5,
    latency_ms_cpu: 18.0,
    latency_ms_npu: 4.0,
    peak_mem_mb_224: 220.0,
    peak_mem_mb_512: 420.0,
};

pub static CONVNEXT_SMALL: EncoderProfile = EncoderProfile {
    family: EncoderFamily::ConvNextLike,
    name: "RepViT/ConvNeXt-Mobile-224",
    params_millions: 20.0,
    gflops_224: 4.0,
    latency_ms_cpu: 10.0,
    latency_ms_npu: 3.0,
    peak_mem_mb_224: 190.0,
    peak_mem_mb_512: 290.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceBudget {
    pub max_latency_ms: f32,
    pub max_mem_mb: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncoderDecision {
    pub profile: &'static EncoderProfile,
    pub fits_budget: bool,
    pub scaled_latency_ms: f32,
    pub scaled_mem_mb: f32,
}

fn evaluate_profile(profile: &'static EncoderProfile, budget: &DeviceBudget, input_size: u32) -> EncoderDecision {
    let scale = input_size as f32 / 224.0;
    let scaled_latency_ms = profile.latency_ms_cpu * scale * scale;
    // Inputs above 320px are costed at the 512px memory figure
    let scaled_mem_mb = if input_size > 320 {
        profile.peak_mem_mb_512
    } else {
        profile.peak_mem_mb_224
    };

    EncoderDecision {
        profile,
        fits_budget: scaled_latency_ms <= budget.max_latency_ms && scaled_mem_mb <= budget.max_mem_mb,
        scaled_latency_ms,
        scaled_mem_mb,
    }
}

/// Choose between the ViT and ConvNeXt-like profiles for a device budget.
///
/// The ConvNeXt-like encoder is preferred unless patch tokens are needed.
/// When neither fits, the lower-latency profile is returned with
/// `fits_budget == false`.
pub fn select_encoder(budget: &DeviceBudget, needs_patch_tokens: bool, input_size: u32) -> EncoderDecision {
    let vit = evaluate_profile(&VIT_SMALL, budget, input_size);
    let cnn = evaluate_profile(&CONVNEXT_SMALL, budget, input_size);

    match (needs_patch_tokens, vit.fits_budget, cnn.fits_budget) {
        (false, _, true) => cnn,
        (true, true, _) => vit,
        (_, false, true) => cnn,
        (_, true, false) => vit,
        (_, false, false) => {
            if cnn.profile.latency_ms_cpu <= vit.profile.latency_ms_cpu {
                cnn
            } else {
                vit
            }
        }
    }
}
