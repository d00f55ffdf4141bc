mod image_decoder;
mod obj;

pub use image_decoder::StdImageDecoder;
pub use obj::{parse_obj, ObjDecoder};

use lapwing_core::Decoders;
use std::sync::Arc;

/// The decoder set the packer uses by default: `image` for pictures and the
/// built-in OBJ parser for meshes.
pub fn default_decoders() -> Decoders {
    Decoders::new(Arc::new(StdImageDecoder), Arc::new(ObjDecoder))
}
