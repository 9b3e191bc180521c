pub mod actions;
pub mod cli;
pub mod connections;
pub mod driver;
pub mod error;
pub mod logging;
pub mod server;
pub mod sessions;
pub mod storage;
pub mod tabs;
pub mod testing;
