pub mod print_service;
pub mod storage;
pub mod upload_service;
