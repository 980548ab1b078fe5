//! The operations seam between reconcilers and the remote compute API.
//!
//! Reconciliation logic programs against [`ComputeOps`] so tests can swap in
//! an in-memory double without a live endpoint. The trait is implemented by
//! the concrete [`ComputeClient`] and by [`CloudClient`] itself, which
//! delegates through its service cache on every call.

use crate::conns::CloudClient;
use crate::error::ApiError;
use crate::instance::ComputeClient;
use crate::types::{InstanceView, RunInstancesRequest};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Remote compute operations consumed by reconciliation.
///
/// Every call takes the caller's cancellation token; an orchestrator-level
/// cancellation aborts the round trip promptly instead of letting it run to
/// completion.
pub trait ComputeOps: Send + Sync {
    /// Create `request.count` instances, returning the new instance ids.
    fn run_instances(
        &self,
        request: &RunInstancesRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    /// `Ok(None)` when the API succeeds but reports no matching instance.
    fn describe_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<InstanceView>, ApiError>> + Send;

    /// Request termination without waiting for terminal status.
    fn terminate_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Block until the instance reports a running state or `timeout` passes.
    fn wait_until_running(
        &self,
        id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<T: ComputeOps> ComputeOps for &T {
    async fn run_instances(
        &self,
        request: &RunInstancesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ApiError> {
        (**self).run_instances(request, cancel).await
    }

    async fn describe_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<InstanceView>, ApiError> {
        (**self).describe_instance(id, cancel).await
    }

    async fn terminate_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        (**self).terminate_instance(id, cancel).await
    }

    async fn wait_until_running(
        &self,
        id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        (**self).wait_until_running(id, timeout, cancel).await
    }
}

impl ComputeOps for ComputeClient {
    async fn run_instances(
        &self,
        request: &RunInstancesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ApiError> {
        ComputeClient::run_instances(self, request, cancel).await
    }

    async fn describe_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<InstanceView>, ApiError> {
        ComputeClient::describe_instance(self, id, cancel).await
    }

    async fn terminate_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        ComputeClient::terminate_instance(self, id, cancel).await
    }

    async fn wait_until_running(
        &self,
        id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        ComputeClient::wait_until_running(self, id, timeout, cancel).await
    }
}

impl ComputeOps for CloudClient {
    async fn run_instances(
        &self,
        request: &RunInstancesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ApiError> {
        self.compute().run_instances(request, cancel).await
    }

    async fn describe_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<InstanceView>, ApiError> {
        self.compute().describe_instance(id, cancel).await
    }

    async fn terminate_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.compute().terminate_instance(id, cancel).await
    }

    async fn wait_until_running(
        &self,
        id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.compute().wait_until_running(id, timeout, cancel).await
    }
}
