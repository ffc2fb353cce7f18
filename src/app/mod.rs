pub mod lifecycle;
pub mod sql_service;
