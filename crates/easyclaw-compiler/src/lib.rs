//! `EasyClaw` rule compiler
//!
//! Turns free-text user rules into artifacts an agent runtime can enforce:
//!
//! - policy fragments, concatenated into the agent-facing policy view
//! - guards, JSON block rules
//! - action bundles, materialized as `SKILL.md` files the runtime discovers
//!
//! [`compile`] is the deterministic fallback that always succeeds.
//! [`ArtifactPipeline`] stores results and publishes events, and
//! [`SkillLifecycleCoordinator`] keeps the skills directory in step with the
//! stored artifacts.

#![deny(unsafe_code, unused_imports, unused_variables)]

pub mod classifier;
pub mod compiler;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod pipeline;
pub mod strategy;

pub use classifier::classify;
pub use compiler::{compile, compile_for_rule, validate_output};
pub use error::{CompileStrategyError, PipelineError};
pub use lifecycle::SkillLifecycleCoordinator;
pub use pipeline::{
    ArtifactPipeline, BatchSummary, EventSubscription, DEFAULT_CONCURRENCY,
    DEFAULT_POLICY_VIEW_LENGTH,
};
pub use strategy::{
    strategy_fn, ChatCompletionConfig, ChatCompletionStrategy, CompileStrategy, FnStrategy,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        compile, ArtifactPipeline, CompileStrategy, PipelineError, SkillLifecycleCoordinator,
    };
}
