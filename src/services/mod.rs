pub mod merge;
pub mod storage;
pub mod upload_service;
