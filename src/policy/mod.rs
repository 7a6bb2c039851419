//! Policy rules and the rule-matching engine
//!
//! A [`PolicyEngine`] holds an ordered rule list plus a default decision
//! and renders exactly one of Allow / Deny / AskUser for every candidate
//! call:
//!
//! - Rules are consulted highest priority first; ties favor the rule
//!   added earlier.
//! - A rule matches on tool name (exact, `server__*` wildcard, or absent
//!   = all) and optionally on a pattern over the stable serialization of
//!   the call's arguments.
//! - `non_interactive` coerces AskUser to Deny just before returning.
//!
//! [`PolicySettings`] maps host configuration (approval mode, allowed and
//! excluded tools) into an engine with documented priority bands.

mod builder;
mod engine;
mod rule;

pub use builder::{ApprovalMode, PolicySettings};
pub use engine::PolicyEngine;
pub use rule::{ArgsPattern, PolicyDecision, PolicyRule};
