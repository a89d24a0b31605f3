//! # windlass
//!
//! An atomic-CSS engine: it compiles utility class strings (`p-4
//! hover:text-red-500 sm:flex`) into CSS rules, injects each rule exactly
//! once at its correct cascade position, and keeps observed DOM subtrees
//! compiled as they mutate.
//!
//! ## Core Systems
//!
//! - **[`parse`]** — Class-string parser: variants, groupings, `!`/`-` flags
//! - **[`variant`]** — Variant tokens to conditions: screens, pseudo-classes, `group-*`/`peer-*`
//! - **[`rules`]** — The utility rule table, `@apply`, and the built-in preset
//! - **[`theme`]** — Design tokens: sections, lazy derivation, `theme()` substitution
//! - **[`serialize`]** — Declaration trees flattened to compiled rules and CSS text
//! - **[`precedence`]** — Layering, condition weights, and the cascade comparator
//! - **[`config`]** — Presets, merge order, dark mode, hashing
//! - **[`context`]** — Resolved configuration plus per-engine memo caches
//! - **[`engine`]** — Compile, dedupe, insert; snapshot/restore lifecycle
//! - **[`sheet`]** — In-memory stylesheet with per-host replicas
//! - **[`dom`]** — Slotmap-backed element tree with mutation recording
//! - **[`observe`]** — Mutation queue and the drain loop rewriting class attributes
//! - **[`scope`]** — The top-level handle tying an engine to observed hosts

// Foundation
pub mod precedence;
pub mod theme;
pub mod value;

// Compilation pipeline
pub mod parse;
pub mod rules;
pub mod serialize;
pub mod variant;

// Configuration
pub mod config;
pub mod context;

// Runtime
pub mod dom;
pub mod engine;
pub mod observe;
pub mod scope;
pub mod sheet;

pub use config::{Config, DarkMode, HashMode, PreflightItem};
pub use dom::{Dom, NodeId};
pub use engine::{Engine, EngineError};
pub use scope::Scope;
