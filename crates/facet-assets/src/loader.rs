//! Resource loader
//!
//! Walks the bindings collected from a glTF asset, fetches each source blob once,
//! and pushes the referenced regions to the GPU through a [`GpuUploader`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use crate::bindings::{BufferBinding, TextureBinding};
use crate::draco::{DecodeCache, DecodeKey, DecodedMesh, MeshDecoder};
use crate::upload::{BufferTarget, GpuHandle, GpuUploader, TextureUpload};
use crate::{AssetError, AssetResult};

/// Provides the raw bytes behind a URI
pub trait BlobSource: Send + Sync {
    fn fetch(&self, uri: &str) -> AssetResult<Arc<[u8]>>;
}

/// Blobs registered in memory, e.g. data URIs or embedded GLB chunks
#[derive(Default)]
pub struct MemoryBlobSource {
    blobs: RwLock<AHashMap<String, Arc<[u8]>>>,
}

impl MemoryBlobSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.blobs.write().insert(uri.into(), data.into());
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobSource for MemoryBlobSource {
    fn fetch(&self, uri: &str) -> AssetResult<Arc<[u8]>> {
        self.blobs
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(uri.to_string()))
    }
}

/// Blobs read from files relative to the asset's directory
pub struct FileBlobSource {
    root: PathBuf,
}

impl FileBlobSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobSource for FileBlobSource {
    fn fetch(&self, uri: &str) -> AssetResult<Arc<[u8]>> {
        let path = self.root.join(uri);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes.into()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AssetError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Widen 8-bit indices to 16 bits, native endian
pub fn widen_bytes_to_shorts(bytes: &[u8]) -> Vec<u8> {
    let shorts: Vec<u16> = bytes.iter().map(|&b| u16::from(b)).collect();
    bytemuck::cast_slice(&shorts).to_vec()
}

/// Loads buffer and texture bindings, caching source blobs by URI
pub struct ResourceLoader<S: BlobSource, U: GpuUploader> {
    source: S,
    uploader: U,
    blobs: Mutex<AHashMap<String, Arc<[u8]>>>,
    decoder: Option<Box<dyn MeshDecoder>>,
    decode_cache: DecodeCache,
}

impl<S: BlobSource, U: GpuUploader> ResourceLoader<S, U> {
    pub fn new(source: S, uploader: U) -> Self {
        Self {
            source,
            uploader,
            blobs: Mutex::new(AHashMap::new()),
            decoder: None,
            decode_cache: DecodeCache::new(),
        }
    }

    /// Enable compressed-mesh decoding
    pub fn with_decoder(mut self, decoder: impl MeshDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    fn blob(&self, uri: &str) -> AssetResult<Arc<[u8]>> {
        if let Some(blob) = self.blobs.lock().get(uri) {
            return Ok(Arc::clone(blob));
        }
        let blob = self.source.fetch(uri)?;
        log::debug!("Fetched {} ({} bytes)", uri, blob.len());
        self.blobs.lock().insert(uri.to_string(), Arc::clone(&blob));
        Ok(blob)
    }

    /// Upload every buffer binding, returning one handle per binding
    pub fn load_buffers(&self, bindings: &[BufferBinding]) -> AssetResult<Vec<GpuHandle>> {
        let mut handles = Vec::with_capacity(bindings.len());
        for binding in bindings {
            binding.validate()?;
            let blob = self.blob(&binding.uri)?;
            if blob.len() < binding.total_size as usize {
                return Err(AssetError::SizeMismatch {
                    uri: binding.uri.clone(),
                    expected: binding.total_size as usize,
                    actual: blob.len(),
                });
            }

            let region = &blob[binding.range()];
            let target = BufferTarget::IndexBuffer(binding.index_buffer);
            let handle = if binding.convert_bytes_to_shorts {
                self.uploader.upload_buffer(target, &widen_bytes_to_shorts(region))?
            } else {
                self.uploader.upload_buffer(target, region)?
            };
            handles.push(handle);
        }
        log::info!("Loaded {} buffer bindings", handles.len());
        Ok(handles)
    }

    /// Upload every texture binding and bind it to its material parameter
    pub fn load_textures(&self, bindings: &[TextureBinding]) -> AssetResult<Vec<GpuHandle>> {
        let mut handles = Vec::with_capacity(bindings.len());
        for binding in bindings {
            binding.validate()?;
            let blob = self.blob(&binding.uri)?;
            let end = match binding.total_size as usize {
                0 => blob.len(),
                total if total > blob.len() => {
                    return Err(AssetError::SizeMismatch {
                        uri: binding.uri.clone(),
                        expected: total,
                        actual: blob.len(),
                    });
                }
                total => total,
            };
            if binding.offset >= end {
                return Err(AssetError::InvalidBinding {
                    uri: binding.uri.clone(),
                    reason: format!("offset {} outside image data of {} bytes", binding.offset, end),
                });
            }

            let upload = TextureUpload {
                material_instance: binding.material_instance,
                material_parameter: &binding.material_parameter,
                mime_type: &binding.mime_type,
                data: &blob[binding.offset..end],
                sampler: binding.sampler,
                srgb: binding.srgb,
            };
            handles.push(self.uploader.upload_texture(&upload)?);
        }
        log::info!("Loaded {} texture bindings", handles.len());
        Ok(handles)
    }

    /// Decode a compressed mesh stored at `offset..offset + size` of a blob
    pub fn decode_mesh(&self, uri: &str, offset: u32, size: u32) -> AssetResult<Arc<DecodedMesh>> {
        let decoder = self
            .decoder
            .as_deref()
            .ok_or_else(|| AssetError::DecodeFailed(format!("no mesh decoder for {uri}")))?;
        let blob = self.blob(uri)?;
        let start = offset as usize;
        let end = start + size as usize;
        if end > blob.len() {
            return Err(AssetError::SizeMismatch {
                uri: uri.to_string(),
                expected: end,
                actual: blob.len(),
            });
        }

        let key = DecodeKey {
            uri: uri.to_string(),
            offset,
            size,
        };
        self.decode_cache.get_or_decode(key, &blob[start..end], decoder)
    }

    /// Drop cached source blobs once every binding has been loaded
    pub fn release_blobs(&self) -> usize {
        let mut blobs = self.blobs.lock();
        let count = blobs.len();
        blobs.clear();
        count
    }
}
