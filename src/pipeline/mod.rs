pub mod batch;
pub mod def;
pub mod extractor;
pub mod fs_ops;
pub mod lod;
pub mod png_writer;
