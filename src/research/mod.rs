//! Corrective retrieval loop: retrieve, evaluate sufficiency, retry or stop,
//! then synthesize an answer with a full reasoning trace.

pub mod controller;
pub mod error;
pub mod evaluator;
pub mod rewriter;
pub mod strategy;
pub mod synthesizer;
pub mod toolbox;
pub mod types;


pub use controller::{IterationController, ResearchContext};
pub use error::ResearchError;
pub use evaluator::{Evaluator, LlmRelevanceScorer, RawScore, RelevanceScorer};
pub use rewriter::{LlmQueryRewriter, QueryRewriter, TemplateRewriter};
pub use strategy::{NextAction, StrategySelector};
pub use synthesizer::{AnswerGenerator, LlmAnswerGenerator, Synthesizer};
pub use toolbox::Toolbox;
pub use types::{
    EvaluationVerdict, IterationRecord, ResearchResult, RetrievedDocument, StopReason,
    TerminationReason, ToolId,
};
