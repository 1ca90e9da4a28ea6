//! Resource bindings
//!
//! Read-only descriptors produced while parsing a glTF asset. Each one tells the
//! [`ResourceLoader`](crate::ResourceLoader) how to move a region of a source blob
//! into an engine resource:
//! - [`BufferBinding`]: one index-buffer upload
//! - [`TextureBinding`]: one texture bound to a material parameter

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{AssetError, AssetResult};

/// Engine-side index buffer the binding fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBufferId(pub u32);

/// Engine-side material instance a texture is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialInstanceId(pub u32);

/// Describes how one region of a source blob becomes an index buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferBinding {
    /// Source blob URI, relative to the asset
    pub uri: String,
    /// Expected size of the whole blob
    pub total_size: u32,
    /// Start of the region within the blob
    pub offset: u32,
    /// Length of the region in bytes
    pub size: u32,
    /// Destination buffer
    pub index_buffer: IndexBufferId,
    /// Widen 8-bit indices to 16 bits before upload
    #[serde(default)]
    pub convert_bytes_to_shorts: bool,
}

impl BufferBinding {
    /// Check that the region lies inside the blob
    pub fn validate(&self) -> AssetResult<()> {
        let end = self.offset as u64 + self.size as u64;
        if end > self.total_size as u64 {
            return Err(AssetError::InvalidBinding {
                uri: self.uri.clone(),
                reason: format!(
                    "region {}..{} exceeds blob size {}",
                    self.offset, end, self.total_size
                ),
            });
        }
        Ok(())
    }

    /// Byte range of the region within the blob
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }

    /// Number of bytes handed to the uploader
    pub fn upload_size(&self) -> usize {
        if self.convert_bytes_to_shorts {
            self.size as usize * 2
        } else {
            self.size as usize
        }
    }
}

/// Magnification filter (glTF sampler enums)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagFilter {
    Nearest,
    Linear,
}

impl MagFilter {
    pub fn from_gltf(value: u32) -> Option<Self> {
        match value {
            9728 => Some(Self::Nearest),
            9729 => Some(Self::Linear),
            _ => None,
        }
    }
}

/// Minification filter (glTF sampler enums)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn from_gltf(value: u32) -> Option<Self> {
        match value {
            9728 => Some(Self::Nearest),
            9729 => Some(Self::Linear),
            9984 => Some(Self::NearestMipmapNearest),
            9985 => Some(Self::LinearMipmapNearest),
            9986 => Some(Self::NearestMipmapLinear),
            9987 => Some(Self::LinearMipmapLinear),
            _ => None,
        }
    }

    pub fn uses_mipmaps(&self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }
}

/// Texture coordinate wrapping (glTF sampler enums)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

impl WrapMode {
    pub fn from_gltf(value: u32) -> Option<Self> {
        match value {
            33071 => Some(Self::ClampToEdge),
            33648 => Some(Self::MirroredRepeat),
            10497 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Sampler state applied when a texture is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: MinFilter::LinearMipmapLinear,
            mag_filter: MagFilter::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
        }
    }
}

impl SamplerDesc {
    /// Build from raw glTF sampler fields; absent fields take glTF defaults and
    /// unknown enum values are rejected.
    pub fn from_gltf(
        min_filter: Option<u32>,
        mag_filter: Option<u32>,
        wrap_s: Option<u32>,
        wrap_t: Option<u32>,
    ) -> AssetResult<Self> {
        fn field<T>(name: &str, raw: Option<u32>, default: T, parse: fn(u32) -> Option<T>) -> AssetResult<T> {
            match raw {
                None => Ok(default),
                Some(value) => parse(value).ok_or_else(|| AssetError::InvalidBinding {
                    uri: String::from("sampler"),
                    reason: format!("unknown {name} value {value}"),
                }),
            }
        }

        let defaults = Self::default();
        Ok(Self {
            min_filter: field("minFilter", min_filter, defaults.min_filter, MinFilter::from_gltf)?,
            mag_filter: field("magFilter", mag_filter, defaults.mag_filter, MagFilter::from_gltf)?,
            wrap_s: field("wrapS", wrap_s, defaults.wrap_s, WrapMode::from_gltf)?,
            wrap_t: field("wrapT", wrap_t, defaults.wrap_t, WrapMode::from_gltf)?,
        })
    }
}

/// Describes how an encoded image becomes a texture bound to a material parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureBinding {
    /// Source blob URI
    pub uri: String,
    /// Size of the blob holding the image, 0 when unknown (external image file)
    pub total_size: u32,
    /// Image MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Start of the encoded image within the blob
    pub offset: usize,
    /// Material instance receiving the texture
    pub material_instance: MaterialInstanceId,
    /// Material parameter name, e.g. `baseColorMap`
    pub material_parameter: String,
    #[serde(default)]
    pub sampler: SamplerDesc,
    /// Color data (base color, emissive) is sRGB-encoded
    #[serde(default)]
    pub srgb: bool,
}

impl TextureBinding {
    pub fn validate(&self) -> AssetResult<()> {
        let invalid = |reason: String| AssetError::InvalidBinding {
            uri: self.uri.clone(),
            reason,
        };
        if self.mime_type.is_empty() {
            return Err(invalid(String::from("missing mime type")));
        }
        if self.material_parameter.is_empty() {
            return Err(invalid(String::from("missing material parameter")));
        }
        if self.total_size != 0 && self.offset >= self.total_size as usize {
            return Err(invalid(format!(
                "offset {} outside blob of {} bytes",
                self.offset, self.total_size
            )));
        }
        Ok(())
    }
}
