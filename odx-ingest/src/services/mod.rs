//! Ingestion, reconstruction and lookup services
//!
//! Each service is one unit of work over the repositories in
//! [`crate::db`]: it owns its transaction and reports what it skipped.

pub mod experiment_ingest;
pub mod feature_builder;
pub mod file_scanner;
pub mod growth_summary;
pub mod lookups;
pub mod plate_ingest;
pub mod protocol_recovery;
pub mod reagent_seed;

pub use experiment_ingest::{ingest_experiment_file, ingest_experiment_path, ExperimentIngestReport};
pub use feature_builder::{build_features, summarize, FeatureRow, FeatureSummary};
pub use file_scanner::NamePattern;
pub use growth_summary::GrowthSummary;
pub use lookups::{cached_literature, cached_related_organisms, LiteratureSource, SimilaritySource};
pub use plate_ingest::{ingest_plate_file, ingest_plate_path, BatchReport, PlateIngestReport};
pub use protocol_recovery::{recover_protocol, ProtocolRecoveryReport};
pub use reagent_seed::{seed_reagents_file, SeedReport};
