pub mod image_processor;
pub mod photo_store;
pub mod storage;
