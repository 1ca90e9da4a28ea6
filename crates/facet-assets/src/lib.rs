//! # Facet Assets
//!
//! Resource loading glue between glTF assets and the renderer.
//!
//! ## Features
//! - Read-only binding descriptors telling the loader how a source blob becomes
//!   an index buffer or a material texture
//! - Resource loader with per-URI blob caching and byte-to-short widening
//! - Compressed-mesh decode service with a decode cache
//! - GPU upload service, with an in-memory recorder for headless tools and tests

pub mod bindings;
pub mod draco;
pub mod loader;
pub mod upload;

pub use bindings::{BufferBinding, IndexBufferId, MaterialInstanceId, SamplerDesc, TextureBinding};
pub use draco::{AttributeSet, DecodeCache, DecodedMesh, MeshDecoder};
pub use loader::{BlobSource, FileBlobSource, MemoryBlobSource, ResourceLoader};
pub use upload::{BufferTarget, GpuHandle, GpuUploader, MeshHandles, RecordingUploader, upload_mesh};

use thiserror::Error;

/// Asset errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Invalid binding for {uri}: {reason}")]
    InvalidBinding { uri: String, reason: String },

    #[error("Size mismatch for {uri}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        uri: String,
        expected: usize,
        actual: usize,
    },

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for asset operations
pub type AssetResult<T> = Result<T, AssetError>;
