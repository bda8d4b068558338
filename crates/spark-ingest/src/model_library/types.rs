//! Classification types shared by the parser, the registry client and the queue.

use serde::{Deserialize, Serialize};

/// Numeric storage format of a model's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Precision {
    FP16,
    FP32,
    BF16,
    #[default]
    Unknown,
}

impl Precision {
    /// Map a dtype token (`F16`, `fp16`, `bfloat16`, ...) to a precision.
    ///
    /// Matching is case-insensitive. Unrecognized tokens map to `Unknown`.
    pub fn from_dtype(dtype: &str) -> Self {
        match dtype.trim().to_ascii_lowercase().as_str() {
            "f16" | "fp16" | "float16" | "half" => Precision::FP16,
            "f32" | "fp32" | "float32" | "float" => Precision::FP32,
            "bf16" | "bfloat16" => Precision::BF16,
            _ => Precision::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Precision::Unknown
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Precision::FP16 => "FP16",
            Precision::FP32 => "FP32",
            Precision::BF16 => "BF16",
            Precision::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// On-disk format of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    SafeTensors,
    PickleTensor,
    Onnx,
    Other,
}

/// Artifact category; decides the models sub-directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelCategory {
    Checkpoint,
    Lora,
    Embedding,
    ControlNet,
    ControlNetPreProcessor,
    #[serde(rename = "VAE")]
    Vae,
    #[default]
    Other,
}

impl ModelCategory {
    /// Map a registry model type string to a category.
    pub fn from_registry_type(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "checkpoint" | "model" => ModelCategory::Checkpoint,
            "lora" | "locon" | "lycoris" | "dora" => ModelCategory::Lora,
            "embedding" | "textualinversion" => ModelCategory::Embedding,
            "controlnet" => ModelCategory::ControlNet,
            "controlnetpreprocessor" => ModelCategory::ControlNetPreProcessor,
            "vae" => ModelCategory::Vae,
            _ => ModelCategory::Other,
        }
    }

    /// Sub-directory of the models tree for this category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ModelCategory::Checkpoint => "stable_diffusion/checkpoints",
            ModelCategory::Lora => "stable_diffusion/lora",
            ModelCategory::Embedding => "stable_diffusion/embeddings",
            ModelCategory::ControlNet => "stable_diffusion/controlnet",
            ModelCategory::ControlNetPreProcessor => "stable_diffusion/controlnet_preprocessor",
            ModelCategory::Vae => "stable_diffusion/vae",
            ModelCategory::Other => "other",
        }
    }
}

/// Pruned/full marker reported by the registry for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SizeType {
    Pruned,
    Full,
    #[default]
    Unknown,
}

impl SizeType {
    pub fn from_registry(size: Option<&str>) -> Self {
        match size.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "pruned" => SizeType::Pruned,
            Some(s) if s == "full" => SizeType::Full,
            _ => SizeType::Unknown,
        }
    }
}
