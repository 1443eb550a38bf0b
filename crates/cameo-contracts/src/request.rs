use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Upper bound on asset reference images accepted by the cloud engine.
pub const MAX_REFERENCE_IMAGES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Cloud,
    Local,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cloud" | "veo" => Ok(Self::Cloud),
            "local" | "comfyui" | "comfy" => Ok(Self::Local),
            other => Err(format!("unknown engine '{other}' (expected cloud or local)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CloudModel {
    #[default]
    Fast,
    Quality,
}

impl CloudModel {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Fast => "veo-3.1-fast-generate-preview",
            Self::Quality => "veo-3.1-generate-preview",
        }
    }
}

impl FromStr for CloudModel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "fast" => Ok(Self::Fast),
            "quality" | "standard" => Ok(Self::Quality),
            _ if normalized == Self::Fast.id() => Ok(Self::Fast),
            _ if normalized == Self::Quality.id() => Ok(Self::Quality),
            other => Err(format!("unknown cloud model '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    Landscape,
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().replace('/', ":").as_str() {
            "16:9" | "landscape" => Ok(Self::Landscape),
            "9:16" | "portrait" => Ok(Self::Portrait),
            other => Err(format!("unsupported aspect ratio '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    P720,
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P720 => "720p",
            Self::P1080 => "1080p",
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "720p" | "720" => Ok(Self::P720),
            "1080p" | "1080" => Ok(Self::P1080),
            other => Err(format!("unsupported resolution '{other}'")),
        }
    }
}

/// Which cloud payload shape to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMode {
    #[default]
    Text,
    Frames,
    References,
}

/// Caller-owned image bytes. The orchestration layer only reads them.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub engine: EngineKind,
    pub model_hint: Option<String>,
    pub template_id: Option<String>,
    pub gpu_enabled: bool,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub reference_images: Vec<ImageAsset>,
    pub mode: GenerationMode,
    pub cloud_model: CloudModel,
    pub start_frame: Option<ImageAsset>,
    pub end_frame: Option<ImageAsset>,
    pub style_image: Option<ImageAsset>,
    pub looping: bool,
    pub local_endpoint: Option<String>,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, engine: EngineKind) -> Self {
        Self {
            prompt: prompt.into(),
            engine,
            model_hint: None,
            template_id: None,
            gpu_enabled: true,
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            reference_images: Vec::new(),
            mode: GenerationMode::default(),
            cloud_model: CloudModel::default(),
            start_frame: None,
            end_frame: None,
            style_image: None,
            looping: false,
            local_endpoint: None,
            seed: None,
        }
    }

    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into()).filter(|value: &String| !value.trim().is_empty());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into()).filter(|value: &String| !value.trim().is_empty());
        self
    }

    pub fn with_local_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.local_endpoint = Some(endpoint.into()).filter(|value: &String| !value.trim().is_empty());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_gpu(mut self, enabled: bool) -> Self {
        self.gpu_enabled = enabled;
        self
    }

    pub fn with_reference_images(mut self, images: Vec<ImageAsset>) -> Self {
        self.mode = GenerationMode::References;
        self.reference_images = images;
        self
    }

    pub fn with_frames(
        mut self,
        start: Option<ImageAsset>,
        end: Option<ImageAsset>,
        looping: bool,
    ) -> Self {
        self.mode = GenerationMode::Frames;
        self.start_frame = start;
        self.end_frame = end;
        self.looping = looping;
        self
    }

    /// Short stable digest of the user-visible request parameters.
    pub fn fingerprint(&self) -> String {
        let payload = json!({
            "prompt": self.prompt,
            "engine": self.engine.as_str(),
            "model_hint": self.model_hint,
            "template_id": self.template_id,
            "aspect_ratio": self.aspect_ratio.as_str(),
            "resolution": self.resolution.as_str(),
            "mode": format!("{:?}", self.mode),
            "cloud_model": self.cloud_model.id(),
            "references": self.reference_images.len(),
            "seed": self.seed,
        });
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(&hasher.finalize()[..6])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kind_accepts_legacy_names() {
        assert_eq!("veo".parse::<EngineKind>(), Ok(EngineKind::Cloud));
        assert_eq!("ComfyUI".parse::<EngineKind>(), Ok(EngineKind::Local));
        assert!("mystery".parse::<EngineKind>().is_err());
    }

    #[test]
    fn cloud_model_parses_aliases_and_ids() {
        assert_eq!("fast".parse::<CloudModel>(), Ok(CloudModel::Fast));
        assert_eq!(
            "veo-3.1-generate-preview".parse::<CloudModel>(),
            Ok(CloudModel::Quality)
        );
    }

    #[test]
    fn blank_optional_fields_stay_unset() {
        let request = GenerationRequest::new("boat", EngineKind::Local)
            .with_model_hint("  ")
            .with_template("")
            .with_local_endpoint("");
        assert!(request.model_hint.is_none());
        assert!(request.template_id.is_none());
        assert!(request.local_endpoint.is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_prompt_sensitive() {
        let a = GenerationRequest::new("boat", EngineKind::Local);
        let b = GenerationRequest::new("boat", EngineKind::Local);
        let c = GenerationRequest::new("car", EngineKind::Local);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }

    #[test]
    fn image_asset_debug_hides_bytes() {
        let asset = ImageAsset::new(vec![1, 2, 3], "image/png");
        assert_eq!(
            format!("{asset:?}"),
            "ImageAsset { bytes: 3, mime_type: \"image/png\" }"
        );
        assert_eq!(asset.to_base64(), "AQID");
    }
}
