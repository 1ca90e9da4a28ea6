//! GPU upload
//!
//! The graphics backend is an external service behind [`GpuUploader`]. The
//! [`RecordingUploader`] keeps uploads in memory, which is what headless tools
//! and tests use.

use std::sync::atomic::{AtomicU64, Ordering};

use facet_geometry::MeshBuffers;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::bindings::{IndexBufferId, MaterialInstanceId, SamplerDesc};
use crate::{AssetError, AssetResult};

/// Vertex buffer slot receiving positions
pub const POSITION_SLOT: u32 = 0;
/// Vertex buffer slot receiving packed tangent frames
pub const TANGENT_SLOT: u32 = 1;

/// Opaque handle to an uploaded GPU resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GpuHandle(pub u64);

/// Destination of a buffer upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    VertexBuffer { slot: u32 },
    IndexBuffer(IndexBufferId),
}

/// Encoded image bound to a material parameter
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub material_instance: MaterialInstanceId,
    pub material_parameter: &'a str,
    pub mime_type: &'a str,
    pub data: &'a [u8],
    pub sampler: SamplerDesc,
    pub srgb: bool,
}

/// Graphics backend upload path
pub trait GpuUploader: Send + Sync {
    /// Copy `data` into a new buffer
    fn upload_buffer(&self, target: BufferTarget, data: &[u8]) -> AssetResult<GpuHandle>;

    /// Decode and upload an image, then bind it to the material parameter
    fn upload_texture(&self, upload: &TextureUpload<'_>) -> AssetResult<GpuHandle>;
}

/// One recorded upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadRecord {
    Buffer {
        handle: GpuHandle,
        target: BufferTarget,
        data: Vec<u8>,
    },
    Texture {
        handle: GpuHandle,
        material_instance: MaterialInstanceId,
        material_parameter: String,
        mime_type: String,
        size: usize,
        sampler: SamplerDesc,
        srgb: bool,
    },
}

impl UploadRecord {
    pub fn handle(&self) -> GpuHandle {
        match self {
            Self::Buffer { handle, .. } | Self::Texture { handle, .. } => *handle,
        }
    }
}

/// In-memory uploader with an optional byte budget
pub struct RecordingUploader {
    next_handle: AtomicU64,
    records: Mutex<Vec<UploadRecord>>,
    budget: Option<usize>,
    used: Mutex<usize>,
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            records: Mutex::new(Vec::new()),
            budget: None,
            used: Mutex::new(0),
        }
    }

    /// Fail uploads once more than `bytes` have been uploaded in total
    pub fn with_budget(mut self, bytes: usize) -> Self {
        self.budget = Some(bytes);
        self
    }

    pub fn records(&self) -> Vec<UploadRecord> {
        self.records.lock().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Total bytes uploaded so far
    pub fn bytes_uploaded(&self) -> usize {
        *self.used.lock()
    }

    /// Contents of a recorded buffer upload
    pub fn buffer_data(&self, handle: GpuHandle) -> Option<Vec<u8>> {
        self.records.lock().iter().find_map(|record| match record {
            UploadRecord::Buffer { handle: h, data, .. } if *h == handle => Some(data.clone()),
            _ => None,
        })
    }

    fn reserve(&self, bytes: usize) -> AssetResult<GpuHandle> {
        let mut used = self.used.lock();
        if let Some(budget) = self.budget {
            if *used + bytes > budget {
                return Err(AssetError::UploadFailed(format!(
                    "{} bytes exceeds remaining budget of {} bytes",
                    bytes,
                    budget - *used
                )));
            }
        }
        *used += bytes;
        Ok(GpuHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }
}

impl GpuUploader for RecordingUploader {
    fn upload_buffer(&self, target: BufferTarget, data: &[u8]) -> AssetResult<GpuHandle> {
        let handle = self.reserve(data.len())?;
        self.records.lock().push(UploadRecord::Buffer {
            handle,
            target,
            data: data.to_vec(),
        });
        Ok(handle)
    }

    fn upload_texture(&self, upload: &TextureUpload<'_>) -> AssetResult<GpuHandle> {
        let handle = self.reserve(upload.data.len())?;
        self.records.lock().push(UploadRecord::Texture {
            handle,
            material_instance: upload.material_instance,
            material_parameter: upload.material_parameter.to_string(),
            mime_type: upload.mime_type.to_string(),
            size: upload.data.len(),
            sampler: upload.sampler,
            srgb: upload.srgb,
        });
        Ok(handle)
    }
}

/// GPU handles of an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshHandles {
    pub positions: GpuHandle,
    pub tangents: GpuHandle,
    pub indices: GpuHandle,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// Upload positions, tangent frames and indices of a generated mesh
pub fn upload_mesh(
    uploader: &dyn GpuUploader,
    mesh: &MeshBuffers,
    index_buffer: IndexBufferId,
) -> AssetResult<MeshHandles> {
    let positions = uploader.upload_buffer(
        BufferTarget::VertexBuffer { slot: POSITION_SLOT },
        mesh.position_bytes(),
    )?;
    let tangents = uploader.upload_buffer(
        BufferTarget::VertexBuffer { slot: TANGENT_SLOT },
        mesh.tangent_bytes(),
    )?;
    let indices = uploader.upload_buffer(BufferTarget::IndexBuffer(index_buffer), mesh.index_bytes())?;

    log::debug!(
        "Uploaded mesh: {} vertices, {} indices",
        mesh.vertex_count(),
        mesh.index_count()
    );
    Ok(MeshHandles {
        positions,
        tangents,
        indices,
        vertex_count: mesh.vertex_count(),
        index_count: mesh.index_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_geometry::{Octasphere, OctasphereConfig};

    #[test]
    fn test_upload_mesh() {
        let mesh = Octasphere::new(OctasphereConfig::sphere(1.0, 1)).generate().unwrap();
        let uploader = RecordingUploader::new();
        let handles = upload_mesh(&uploader, &mesh, IndexBufferId(9)).unwrap();

        assert_eq!(uploader.upload_count(), 3);
        assert_eq!(handles.vertex_count, mesh.vertex_count());
        assert_eq!(
            uploader.buffer_data(handles.positions).unwrap(),
            mesh.position_bytes()
        );
        assert_eq!(uploader.buffer_data(handles.indices).unwrap().len(), mesh.index_count() * 2);

        let records = uploader.records();
        assert!(matches!(
            records[2],
            UploadRecord::Buffer { target: BufferTarget::IndexBuffer(IndexBufferId(9)), .. }
        ));
        assert_eq!(
            uploader.bytes_uploaded(),
            mesh.position_bytes().len() + mesh.tangent_bytes().len() + mesh.index_bytes().len()
        );
    }

    #[test]
    fn test_handles_are_unique() {
        let uploader = RecordingUploader::new();
        let a = uploader.upload_buffer(BufferTarget::VertexBuffer { slot: 0 }, &[1]).unwrap();
        let b = uploader.upload_buffer(BufferTarget::VertexBuffer { slot: 0 }, &[2]).unwrap();
        assert_ne!(a, b);
        assert_eq!(uploader.records()[1].handle(), b);
    }

    #[test]
    fn test_budget_exceeded() {
        let uploader = RecordingUploader::new().with_budget(4);
        assert!(uploader.upload_buffer(BufferTarget::VertexBuffer { slot: 0 }, &[0; 3]).is_ok());
        let result = uploader.upload_buffer(BufferTarget::VertexBuffer { slot: 0 }, &[0; 2]);
        assert!(matches!(result, Err(AssetError::UploadFailed(_))));
        assert_eq!(uploader.upload_count(), 1);
    }

    #[test]
    fn test_texture_upload_recorded() {
        let uploader = RecordingUploader::new();
        let upload = TextureUpload {
            material_instance: MaterialInstanceId(2),
            material_parameter: "normalMap",
            mime_type: "image/png",
            data: &[0x89, b'P', b'N', b'G'],
            sampler: SamplerDesc::default(),
            srgb: false,
        };
        let handle = uploader.upload_texture(&upload).unwrap();
        match &uploader.records()[0] {
            UploadRecord::Texture { handle: h, material_parameter, size, .. } => {
                assert_eq!(*h, handle);
                assert_eq!(material_parameter, "normalMap");
                assert_eq!(*size, 4);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }
}
