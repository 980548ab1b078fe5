//! Reconciliation failure taxonomy.

use strato_compute::ApiError;
use thiserror::Error;

/// A failed reconciliation call, wrapped with the operation and the instance
/// id when one is known. Nothing here is retried by the reconciler; retry
/// policy is a host-level concern.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The create call was rejected, or it reported success with a malformed
    /// response. Nothing was persisted; retrying create from scratch is
    /// safe.
    #[error("create instance failed: {source}")]
    CreateFailed {
        #[source]
        source: ApiError,
    },

    /// The instance exists remotely under `id` but readiness could not be
    /// confirmed. Blindly retrying create would make a duplicate instance;
    /// callers must treat the id as live.
    #[error("instance {id} was created but did not become ready: {source}")]
    CreatedButNotReady {
        id: String,
        #[source]
        source: ApiError,
    },

    /// A describe failure other than not-found. Tracked state is untouched.
    #[error("read instance {id} failed: {source}")]
    ReadFailed {
        id: String,
        #[source]
        source: ApiError,
    },

    /// The terminate call failed; the instance stays tracked.
    #[error("delete instance {id} failed: {source}")]
    DeleteFailed {
        id: String,
        #[source]
        source: ApiError,
    },
}
