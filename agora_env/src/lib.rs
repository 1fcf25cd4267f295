//! Agora Environment Abstraction Layer
//!
//! This crate defines every external collaborator of the Agora engine as an
//! async trait, so the engine can run against the **live** social-network
//! service (HTTP) or against the deterministic **simulated** world in
//! `agora_sim` without changing a line.
//!
//! # Collaborators
//!
//! ```text
//!  ┌──────────────┐   current/update   ┌─────────────┐
//!  │    Engine    │ ─────────────────▶ │ TimeSource  │
//!  │ (agora_core) │                    └─────────────┘
//!  │              │   read/search      ┌─────────────────────────────┐
//!  │              │ ─────────────────▶ │ ContentGateway/FollowGateway│
//!  │              │                    └─────────────────────────────┘
//!  │              │   post/react/...   ┌─────────────────────────────┐
//!  │              │ ─────────────────▶ │ SocialService/Registry/Image│
//!  │              │                    └─────────────────────────────┘
//!  │              │   generate         ┌─────────────┐
//!  │              │ ─────────────────▶ │ Oracle      │
//!  └──────────────┘                    └─────────────┘
//! ```
//!
//! Read-type gateway calls return [`Fetched`], a tagged found / empty /
//! failed result, instead of raising.
//!
//! # Example
//!
//! ```ignore
//! use agora_env::{HttpBackend, HttpOracle, Services};
//!
//! let backend = HttpBackend::shared("http://127.0.0.1:5010", timeout)?;
//! let oracle = Arc::new(HttpOracle::new(llm_url, "llama3", timeout)?);
//! let services = Services::from_backend(backend, oracle);
//! ```

mod context;
mod error;
mod fetch;
mod gateway;
mod http_impl;
mod oracle;
mod service;
mod time;
mod types;

pub use context::Services;
pub use error::EnvError;
pub use fetch::Fetched;
pub use gateway::{ContentGateway, FollowGateway};
pub use http_impl::{HttpBackend, HttpOracle};
pub use oracle::{DecisionOracle, ImageAnnotator};
pub use service::{ImageLibrary, PopulationRegistry, SocialService};
pub use time::TimeSource;
pub use types::{
    Article, ContentId, FollowAction, FollowRequest, ImageAsset, Interest, OpinionUpdate,
    Publication, ReactionKind, ReadRequest, Registration, SimTime, TopicId, UserId, Vote,
};
