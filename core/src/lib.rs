pub mod db;
pub mod error;
pub mod inventory_import;
pub mod models;
pub mod seed;
pub mod service;
pub mod units;

pub use error::{Error, Result};
