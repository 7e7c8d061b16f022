pub mod backup;
pub mod catalog;
pub mod restore;
pub mod storage_status;
pub mod walker;
