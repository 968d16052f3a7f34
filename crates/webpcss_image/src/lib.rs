use std::sync::Arc;

pub use encode_cache::*;
pub use webp_encoder::*;

mod encode_cache;
mod webp_encoder;

pub type WebpEncoderRef = Arc<dyn WebpEncoder>;
