pub mod print;
pub mod upload;
