// src/models/mod.rs

pub mod catalog;
pub mod discovery;

pub use catalog::{default_model, find_model, load_catalog};
