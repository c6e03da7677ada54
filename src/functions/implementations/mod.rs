// src/functions/implementations/mod.rs

pub mod fetch_url;
pub mod google_search;
pub mod image_gen;
pub mod term_definition;
