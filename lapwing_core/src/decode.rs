use std::sync::Arc;

use crate::asset::Texture;
use crate::mesh::RawMesh;

/// Turns encoded image bytes (PNG, JPEG, ...) into raw pixels.
///
/// Implementations must keep the source's channel count, one byte per
/// channel, and report it as `TextureMetadata::bit_depth`.
pub trait ImageDecoder: Send + Sync {
    /// Human-readable decoder name for logs.
    fn name(&self) -> &'static str;

    fn decode_image(&self, bytes: &[u8]) -> anyhow::Result<Texture>;
}

/// Turns mesh source text (Wavefront OBJ) into attribute pools plus a
/// triangulated corner list. Deduplication and tangents happen in the writer.
pub trait MeshDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode_mesh(&self, text: &str) -> anyhow::Result<RawMesh>;
}

/// The external decoders a [`Writer`](crate::Writer) delegates to.
///
/// `.vox` files need no collaborator; they go through [`crate::vox::parse`].
#[derive(Clone)]
pub struct Decoders {
    pub image: Arc<dyn ImageDecoder>,
    pub mesh: Arc<dyn MeshDecoder>,
}

impl Decoders {
    pub fn new(image: Arc<dyn ImageDecoder>, mesh: Arc<dyn MeshDecoder>) -> Self {
        Self { image, mesh }
    }
}
