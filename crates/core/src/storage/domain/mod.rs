pub mod detection_record;
pub mod page;
pub mod result_store;
