//! Experience storage and routing.
//!
//! Three [`ExperienceStore`] instances exist in a training run: a *labeled*
//! store (true rewards), an *unlabeled* store (rewards kept only for offline
//! evaluation), and a *pseudo* store (rewards inferred by label
//! propagation). The [`ExperienceRouter`] decides, per transition, which of
//! the first two receives it.

pub mod experience_store;
pub mod router;

pub use experience_store::{ExperienceStore, SnapshotError};
pub use router::{ExperienceRouter, RouteTarget};
