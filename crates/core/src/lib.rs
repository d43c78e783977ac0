pub mod annotation;
pub mod detection;
pub mod emotion;
pub mod imaging;
pub mod pipeline;
pub mod shared;
pub mod storage;
