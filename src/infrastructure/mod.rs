pub mod encoder;
pub mod storage;
