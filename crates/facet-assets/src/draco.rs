//! Compressed mesh decoding
//!
//! The codec itself is an external service behind [`MeshDecoder`]; this module
//! defines what a decoded mesh looks like and caches decodes so a compressed
//! buffer shared by several primitives is only decoded once.

use std::sync::Arc;

use ahash::AHashMap;
use bitflags::bitflags;
use parking_lot::Mutex;

use crate::{AssetError, AssetResult};

bitflags! {
    /// Vertex attribute semantics present in a decoded mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributeSet: u32 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const TANGENT = 1 << 2;
        const TEXCOORD = 1 << 3;
        const COLOR = 1 << 4;
        const JOINTS = 1 << 5;
        const WEIGHTS = 1 << 6;
        const GENERIC = 1 << 7;
    }
}

/// Semantic of one decoded attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
    TexCoord,
    Color,
    Joints,
    Weights,
    Generic,
}

impl AttributeSemantic {
    pub fn flag(&self) -> AttributeSet {
        match self {
            Self::Position => AttributeSet::POSITION,
            Self::Normal => AttributeSet::NORMAL,
            Self::Tangent => AttributeSet::TANGENT,
            Self::TexCoord => AttributeSet::TEXCOORD,
            Self::Color => AttributeSet::COLOR,
            Self::Joints => AttributeSet::JOINTS,
            Self::Weights => AttributeSet::WEIGHTS,
            Self::Generic => AttributeSet::GENERIC,
        }
    }
}

/// Uncompressed attribute data
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttribute {
    pub semantic: AttributeSemantic,
    /// Components per vertex
    pub components: u8,
    /// Tightly packed attribute data
    pub data: Vec<u8>,
}

/// Mesh produced by a [`MeshDecoder`], attributes keyed by their unique id in the
/// compressed stream
#[derive(Debug, Clone, Default)]
pub struct DecodedMesh {
    vertex_count: usize,
    attributes: AHashMap<u32, DecodedAttribute>,
    indices: Vec<u32>,
}

impl DecodedMesh {
    pub fn new(vertex_count: usize, indices: Vec<u32>) -> Self {
        Self {
            vertex_count,
            attributes: AHashMap::new(),
            indices,
        }
    }

    pub fn with_attribute(mut self, unique_id: u32, attribute: DecodedAttribute) -> Self {
        self.attributes.insert(unique_id, attribute);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Uncompressed bytes of an attribute, by unique id
    pub fn get_attribute(&self, unique_id: u32) -> Option<&[u8]> {
        self.attributes.get(&unique_id).map(|a| a.data.as_slice())
    }

    pub fn attribute(&self, unique_id: u32) -> Option<&DecodedAttribute> {
        self.attributes.get(&unique_id)
    }

    /// Semantics of every attribute present
    pub fn attribute_set(&self) -> AttributeSet {
        self.attributes
            .values()
            .fold(AttributeSet::empty(), |set, a| set | a.semantic.flag())
    }
}

/// Compressed-mesh codec
pub trait MeshDecoder: Send + Sync {
    /// Decode one compressed mesh
    fn decode(&self, data: &[u8]) -> AssetResult<DecodedMesh>;
}

/// Identifies a compressed region of a source blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecodeKey {
    pub uri: String,
    pub offset: u32,
    pub size: u32,
}

/// Thread-safe cache of decoded meshes
#[derive(Default)]
pub struct DecodeCache {
    entries: Mutex<AHashMap<DecodeKey, Arc<DecodedMesh>>>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached mesh for `key`, decoding `data` on a miss
    pub fn get_or_decode(
        &self,
        key: DecodeKey,
        data: &[u8],
        decoder: &dyn MeshDecoder,
    ) -> AssetResult<Arc<DecodedMesh>> {
        if let Some(mesh) = self.entries.lock().get(&key) {
            return Ok(Arc::clone(mesh));
        }
        if data.is_empty() {
            return Err(AssetError::DecodeFailed(format!(
                "{} at offset {} is empty",
                key.uri, key.offset
            )));
        }

        // Decode without holding the lock; a racing decode of the same key keeps
        // whichever result landed first.
        let decoded = Arc::new(decoder.decode(data)?);
        log::debug!(
            "Decoded {} ({} vertices, {} triangles)",
            key.uri,
            decoded.vertex_count(),
            decoded.triangle_count()
        );
        let mut entries = self.entries.lock();
        Ok(Arc::clone(entries.entry(key).or_insert(decoded)))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
