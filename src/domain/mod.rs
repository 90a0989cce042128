//! Domain layer: canonical entities, extraction types, source registry and
//! run state. No I/O happens here.

pub mod entities;
pub mod extraction;
pub mod normalize;
pub mod run_state;
pub mod sources;

pub use entities::{
    Category, Confidence, NewRelease, ProductType, Release, ReleaseProduct, ReleaseProductChange,
    SourceTier, SourceType,
};
pub use extraction::{ExtractedPayload, ExtractedProduct, ExtractedSet, ExtractedSetCandidate};
pub use run_state::{
    BeginOutcome, PipelineRunRecord, PipelineSummary, RunStateManager, RunStateSnapshot, RunStatus,
    RunTrigger,
};
pub use sources::ReleaseIntelSource;
