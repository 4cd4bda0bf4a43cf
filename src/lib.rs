pub mod candidate_generation;
pub mod geocoding;
pub mod matching;
pub mod models;
pub mod normalization;
pub mod quality;
pub mod utils;
