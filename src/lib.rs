//! # taskmesh
//!
//! Goal-driven agent engine with multi-agent collaboration.
//!
//! This library provides:
//! - A tool capability registry with capability/domain/action lookups
//! - A plan-execute-verify-replan engine driven by a text-in/text-out model
//! - A task analyzer and an agent factory gated on capability coverage
//! - A collaboration coordinator spreading one task across several agents
//! - A versioned blackboard for facts shared between agents
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────────────────┐        ┌──────────────────────┐
//!   │ CollaborationCoordinator   │──msg──▶│ Connector/Connection │
//!   │ (sequential/parallel/hier.)│◀─resp──│ (local or remote)    │
//!   └─────────────┬──────────────┘        └──────────┬───────────┘
//!                 │                                  │
//!                 ▼                                  ▼
//!        ┌─────────────────┐   plan    ┌───────────────────────┐
//!        │   Blackboard    │◀─facts────│   PlanExecuteAgent    │
//!        └─────────────────┘           │ plan→execute→verify   │
//!                                      └──────────┬────────────┘
//!                                                 │
//!                                                 ▼
//!                                        ┌─────────────────┐
//!                                        │  ToolRegistry   │
//!                                        └─────────────────┘
//! ```
//!
//! ## Task Flow
//! 1. The planner turns a goal into steps (falling back to one step on bad output)
//! 2. Steps run in dependency order, each under a deadline
//! 3. Every step is verified; failures trigger a bounded number of replans
//! 4. Results are aggregated into an `AgentResult`
//!
//! ## Modules
//! - `agents`: engine, planner, verifier, analyzer, factory
//! - `plan`: plans, steps and verification records
//! - `tools`: tool trait, registry and built-in tools
//! - `blackboard`: shared fact store and its exports
//! - `collab`: coordinator, wire messages and transports
//! - `llm`: language model boundary

pub mod agents;
pub mod blackboard;
pub mod collab;
pub mod config;
pub mod llm;
pub mod plan;
pub mod tools;

pub use agents::{AgentFactory, AgentResult, PlanExecuteAgent, TaskAnalysis};
pub use blackboard::{Blackboard, FactEntry};
pub use collab::{AgentReference, CollaborationCoordinator, CollaborationStrategy};
pub use config::{Config, EngineSettings};
pub use tools::{Tool, ToolRegistry};
