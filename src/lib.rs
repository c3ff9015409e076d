//! Registry Bootstrap
//!
//! Brings a schema registry to a known state during environment startup:
//! waits for the registry to answer, then registers every bundled schema,
//! retrying whole attempts until all succeed or the time budget runs out.
//!
//! ## Features
//!
//! - **Bundled Schemas**: Schema documents are compiled into the binary
//! - **Priority Levels**: Referenced subjects are registered before their users
//! - **All-or-Nothing Attempts**: Any failure restarts registration from the top
//! - **Bounded Wait**: A fixed budget turns an absent registry into a hard failure
//! - **Mirroring**: Pinned subjects and their references are copied from a remote registry
//!
//! ## Bundle Layout
//!
//! ```text
//! schemas/
//! ├── 1/
//! │   └── common-money/
//! │       └── schema.json
//! └── 0/
//!     ├── orders-value/
//!     │   └── schema.json
//!     └── payments-value/
//!         └── schema.json
//! ```
//!
//! Higher levels are registered first.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod mirror;
pub mod schema;
pub mod source;

pub use client::{Registry, RegistryClient};
pub use config::{BootstrapConfig, RegistryEndpoint, ENDPOINT_ENV};
pub use coordinator::{bootstrap, AttemptOutcome, BootstrapSummary, Coordinator, RetryPolicy};
pub use error::{BootstrapError, Result, SubmissionError};
pub use loader::load_bundle;
pub use mirror::{HttpFetcher, Mirror, MirrorReport, SchemaFetcher, SubjectPin};
pub use schema::{SchemaBundle, SchemaRecord};
pub use source::{DocumentSource, EmbeddedSource, FsSource};
