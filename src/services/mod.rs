pub mod address_resolver;
pub mod file_index;
pub mod qr_service;
pub mod storage_service;
