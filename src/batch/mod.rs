//! Build-time directory conversion

pub mod codec;
pub mod config;
pub mod converter;
pub mod markup;
pub mod responsive;

pub use codec::{fit_width, CodecOutput, EncodeRequest, ImageCodec, RasterCodec};
pub use config::BatchConfig;
pub use converter::BatchConverter;
pub use markup::{alt_text, MarkupTemplate};
pub use responsive::variant_file_name;
