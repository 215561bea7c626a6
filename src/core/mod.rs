// Core algorithm exports
pub mod assembler;
pub mod candidate;
pub mod distance;
pub mod fair_rent;
pub mod filters;
pub mod normalizer;
pub mod ranker;
pub mod recommender;
pub mod scoring;

pub use candidate::Candidate;
pub use distance::{haversine_distance, travel_distance_km};
pub use fair_rent::{classify_rent, RentAssessment, RentClassification};
pub use filters::{check_constraints, filter_candidates};
pub use normalizer::{normalize, Desirability, FactorRange};
pub use ranker::{clamp_top_n, compare_candidates, rank, round_score};
pub use recommender::{Recommendation, Recommender, DEFAULT_MAX_TOP_N};
pub use scoring::{score_candidates, weighted_score};
