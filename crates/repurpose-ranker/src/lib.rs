//! repurpose-ranker — Candidate scoring, score adjustment and ranking.

pub mod normalise;
pub mod weights;
pub mod features;
pub mod model;
pub mod scorer;
pub mod guardrails;
pub mod gates;
pub mod ranking;
pub mod pipeline;

pub use features::{FeatureSource, MockFeatureSource, OpenTargetsFeatureEngine};
pub use gates::{apply_gate_chain, CompositeGateChain, EvidenceGate, Gate, GateChain, GateOutcome, GateRecord};
pub use guardrails::GuardrailPolicy;
pub use model::{LinearModel, Model, ModelBundle, Scaler, StandardScaler};
pub use pipeline::{Pipeline, PredictOutcome, PredictRequest};
pub use ranking::{rank, RankedResponse};
pub use scorer::{ScoringEngine, ScoringReport};
