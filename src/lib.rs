pub mod catalog;
pub mod commands;
pub mod config;
pub mod logging;
pub mod reassign;
pub mod render;
pub mod storage;
pub mod write_session;
