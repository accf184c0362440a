pub mod storage;
pub mod tls;
