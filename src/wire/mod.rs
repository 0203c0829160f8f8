//! Fixed-layout wire records and the codec that frames them.

pub mod codec;
pub mod types;
