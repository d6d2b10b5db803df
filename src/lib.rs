#![forbid(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod formats;
pub mod libsql;
pub mod logging;
pub mod routes;
pub mod server;
