pub mod asset;
pub mod cursor;
pub mod decode;
pub mod format;
pub mod hash;
pub mod mesh;
mod pio;
pub mod reader;
pub mod vox;
pub mod writer;

pub use asset::{
    Asset, Mesh, ModelMetadata, Texture, TextureMetadata, Vertex, Voxel, VoxelModel,
    VoxelModelMetadata,
};
pub use decode::{Decoders, ImageDecoder, MeshDecoder};
pub use format::{AssetKind, Entry, Header, ENTRY_SIZE, HEADER_SIZE};
pub use hash::{hash_name, HashParams};
pub use mesh::{Corner, RawMesh};
pub use reader::{LookupError, OpenError, Reader};
pub use writer::{pack_archive, WriteError, Writer};
