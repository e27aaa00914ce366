pub mod api;
pub mod auth;
pub mod cli;
pub mod database_ops;
pub mod error;
pub mod logging;
pub mod matching;
pub mod normalization;

pub mod util {
    pub mod config;
    pub mod env;
}

pub use error::{MapperError, MapperResult};
