//! Compute-service client layer for the strato reconciler.
//!
//! This crate owns everything that talks to the remote compute endpoint:
//! - [`conns`]: connection settings, the authenticated connection context,
//!   and the per-service client cache
//! - [`error`]: classification of remote error codes into a small taxonomy
//! - [`types`]: domain-level request and view types
//! - [`instance`]: the real SDK-backed compute client
//! - [`ops`]: the operations trait that reconcilers program against
//! - [`wait`]: readiness polling with backoff and cancellation

pub mod conns;
pub mod error;
pub mod instance;
pub mod ops;
pub mod types;
pub mod wait;

pub use conns::{CloudClient, ConnectError, ConnectionSettings, ServiceCache};
pub use error::{classify_error_code, ApiError, ApiErrorKind};
pub use instance::ComputeClient;
pub use ops::ComputeOps;
pub use types::{BlockDeviceRequest, InstanceView, RunInstancesRequest};
pub use wait::{cancellable, wait_until, WaitConfig};
