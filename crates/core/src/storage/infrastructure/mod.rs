pub mod sqlite_result_store;
