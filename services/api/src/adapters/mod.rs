pub mod compressor;
pub mod db;
pub mod storage;

pub use compressor::ImageCrateCompressor;
pub use db::DbAdapter;
pub use storage::LocalObjectStorage;
