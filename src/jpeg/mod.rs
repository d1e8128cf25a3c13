//! Module for decoding baseline, extended sequential and progressive JPEGs into pixels.
//!
//! The segment parser in `jpeg_read` walks the markers of the stream and builds the
//! tables and frame geometry. Each scan is handed to the scan decoder, which fills the
//! coefficient storage of the components in raster order. Once the whole stream has
//! been read, the post processor runs the IDCT and color conversion in batches of rows.

mod bit_reader;
mod byte_reader;
mod color_convert;
mod huffman_table;
mod idct;
mod jpeg_position_state;
mod quantization_tables;
mod scan_decoder;

pub mod app_markers;
pub mod block_based_image;
pub mod component_info;
pub mod frame;
pub mod jpeg_code;
pub mod jpeg_read;
pub mod post_processor;
pub mod table_store;
