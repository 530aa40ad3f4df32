//! Glossary sync core: the term model, hierarchy ordering, remote matching and the
//! synchronizer that publishes a flat term list into a remote glossary tree.
//!
//! Adapters for concrete inputs and catalogs live in sibling crates and plug in through
//! [`TermSource`] and [`RemoteTermService`].

pub mod cleanup;
pub mod config_manager;
pub mod dry_run;
pub mod error;
pub mod hierarchy;
pub mod location_map;
pub mod matcher;
pub mod naming;
pub mod remote_index;
pub mod sync;
pub mod traits;
pub mod types;

pub use cleanup::{delete_published, CleanupFailure, CleanupReport};
pub use config_manager::{
    AuthConfig, CatalogConfig, ConfigError, ConfigManager, GlossaryConfig, LoggingConfig,
    SyncConfig,
};
pub use dry_run::DryRunService;
pub use error::*;
pub use hierarchy::{order, OrderedHierarchy};
pub use location_map::{LocationEntry, LocationMap};
pub use matcher::find_existing;
pub use remote_index::RemoteIndex;
pub use sync::{
    synchronize, FailurePolicy, OverwritePolicy, SyncOptions, SyncReport, SyncSummary,
    Synchronizer, TermOutcome, TermReport,
};
pub use traits::*;
pub use types::*;
