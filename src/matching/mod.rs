// src/matching/mod.rs
pub mod aggregate;
pub mod manager;
pub mod matcher;
pub mod scorer;

pub use aggregate::{aggregate_buildings, building_key};
pub use manager::{run_resolution, ResolutionOutput, ResolverServices, RunStats};
pub use matcher::{assign, Assignment};
pub use scorer::{HeuristicScorer, PairScorer, ScoringPlan};
