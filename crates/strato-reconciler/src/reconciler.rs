//! Create/Read/Update/Delete/Import lifecycle for one compute instance.
//!
//! Each call is an independent unit of work: the host serializes calls that
//! target the same instance and may run calls for different instances
//! concurrently. The only state shared between calls is the client cache
//! behind the [`ComputeOps`] handle.

use crate::error::ReconcileError;
use crate::model::{BlockDevice, DesiredSpec, TrackedState, DEFAULT_BOOT_DEVICE};
use crate::tags;
use std::time::Duration;
use strato_compute::{ApiError, BlockDeviceRequest, ComputeOps, InstanceView, RunInstancesRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tunables for the post-create readiness wait.
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Total budget for the instance to reach a running state after create.
    pub ready_timeout: Duration,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(600),
        }
    }
}

/// Reconciles one instance type's desired specs against the remote API.
///
/// Holds its compute handle (in production, the session's client cache)
/// acquired once at construction.
pub struct InstanceReconciler<C> {
    compute: C,
    options: ReconcilerOptions,
}

impl<C: ComputeOps> InstanceReconciler<C> {
    pub fn new(compute: C) -> Self {
        Self::with_options(compute, ReconcilerOptions::default())
    }

    pub fn with_options(compute: C, options: ReconcilerOptions) -> Self {
        Self { compute, options }
    }

    /// Create the instance described by `spec` and return its tracked state
    /// with every computed attribute resolved.
    ///
    /// Failure before the remote accepts the create persists nothing. After
    /// the id is known, failures come back as
    /// [`ReconcileError::CreatedButNotReady`] so the caller never retries
    /// into a duplicate instance.
    pub async fn create(
        &self,
        spec: DesiredSpec,
        cancel: &CancellationToken,
    ) -> Result<TrackedState, ReconcileError> {
        let mut spec = spec;

        // Resolve computed-when-unset inputs into the spec that gets
        // persisted, so the tracked state reflects what was actually sent.
        let replica_count = spec.replica_count.unwrap_or(1);
        spec.replica_count = Some(replica_count);
        resolve_boot_device(&mut spec.block_devices);

        let request = build_run_request(&spec, replica_count);
        let ids = self
            .compute
            .run_instances(&request, cancel)
            .await
            .map_err(|source| ReconcileError::CreateFailed { source })?;

        let Some(id) = ids.first().cloned() else {
            return Err(ReconcileError::CreateFailed {
                source: ApiError::invalid_response(
                    "RunInstances",
                    "the API reported success with an empty instance list",
                ),
            });
        };
        info!(instance_id = %id, "instance created, waiting for it to run");

        self.compute
            .wait_until_running(&id, self.options.ready_timeout, cancel)
            .await
            .map_err(|source| ReconcileError::CreatedButNotReady {
                id: id.clone(),
                source,
            })?;

        let view = self
            .compute
            .describe_instance(&id, cancel)
            .await
            .map_err(|source| ReconcileError::CreatedButNotReady {
                id: id.clone(),
                source,
            })?
            .ok_or_else(|| ReconcileError::CreatedButNotReady {
                id: id.clone(),
                source: ApiError::invalid_response(
                    "DescribeInstances",
                    "instance not visible after create",
                ),
            })?;

        let mut state = TrackedState::from_spec(&id, spec);
        apply_computed(&mut state, &view);
        info!(instance_id = %id, state = ?state.state, "instance running");
        Ok(state)
    }

    /// Refresh `state` from the remote system.
    ///
    /// `Ok(None)` means the instance no longer exists, whether the API said
    /// so with its not-found error code or with an empty describe result;
    /// the caller must drop the instance from tracking instead of treating
    /// it as a failure. Fields the API cannot report (login secret, volume
    /// sizes) are left as tracked.
    pub async fn read(
        &self,
        state: TrackedState,
        cancel: &CancellationToken,
    ) -> Result<Option<TrackedState>, ReconcileError> {
        let mut state = state;
        let view = match self.compute.describe_instance(&state.id, cancel).await {
            Ok(Some(view)) => view,
            Ok(None) => {
                debug!(instance_id = %state.id, "instance gone: no matching reservation");
                return Ok(None);
            }
            Err(e) if e.is_not_found() => {
                debug!(instance_id = %state.id, code = ?e.code, "instance gone");
                return Ok(None);
            }
            Err(source) => {
                return Err(ReconcileError::ReadFailed {
                    id: state.id.clone(),
                    source,
                })
            }
        };

        if let Some(image_id) = view.image_id {
            state.image_id = Some(image_id);
        }
        if let Some(instance_type) = view.instance_type {
            state.instance_type = Some(instance_type);
        }
        if let Some(subnet_id) = view.subnet_id {
            state.subnet_id = Some(subnet_id);
        }
        state.state = view.state;
        state.availability_zone = view.availability_zone;
        if let Some(private_ip) = view.private_ip {
            state.private_ip = Some(private_ip);
        }
        if let Some(public_ip) = view.public_ip {
            state.public_ip = Some(public_ip);
        }
        // An absent or empty key name must not erase a known value.
        if let Some(key_name) = view.key_name {
            state.key_name = Some(key_name);
        }
        state.security_group_ids = Some(view.security_group_ids);

        let (display_name, resolved_tags) = tags::absorb(&view.tags);
        if display_name.is_some() {
            state.display_name = display_name;
        }
        // Always set, even when empty: an empty remote tag set is a value.
        state.tags = Some(resolved_tags);

        Ok(Some(state))
    }

    /// Persist the new desired spec as tracked state without touching the
    /// remote system.
    ///
    /// Every field that can change remotely is replacement-triggering at the
    /// schema level, so nothing reaching this path has a remote mutation to
    /// issue yet. Until one exists, the persisted spec is not verified
    /// against reality and can drift from it.
    pub async fn update(
        &self,
        prior: &TrackedState,
        spec: DesiredSpec,
    ) -> Result<TrackedState, ReconcileError> {
        warn!(
            instance_id = %prior.id,
            "update persists the desired spec without issuing a remote call; \
             remote state is not verified"
        );

        let mut spec = spec;
        if spec.replica_count.is_none() {
            spec.replica_count = prior.replica_count;
        }
        resolve_boot_device(&mut spec.block_devices);

        let mut state = TrackedState::from_spec(&prior.id, spec);
        // Computed attributes carry over from the last refresh.
        state.private_ip = prior.private_ip.clone();
        state.public_ip = prior.public_ip.clone();
        state.state = prior.state.clone();
        state.availability_zone = prior.availability_zone.clone();
        if state.display_name.is_none() {
            state.display_name = prior.display_name.clone();
        }
        if state.security_group_ids.is_none() {
            state.security_group_ids = prior.security_group_ids.clone();
        }
        Ok(state)
    }

    /// Request termination of the instance. Returns as soon as the remote
    /// API acknowledges; terminal status is not polled. On failure the
    /// instance stays tracked.
    pub async fn delete(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.compute
            .terminate_instance(id, cancel)
            .await
            .map_err(|source| ReconcileError::DeleteFailed {
                id: id.to_string(),
                source,
            })?;
        info!(instance_id = %id, "termination requested");
        Ok(())
    }

    /// Seed tracked state from a bare remote id, for a subsequent read.
    ///
    /// Fields the remote API cannot report (login secret, volume sizes,
    /// display name when untagged) stay unresolved until the operator
    /// reconciles them on the next apply.
    pub fn import(&self, id: impl Into<String>) -> TrackedState {
        let id = id.into();
        info!(instance_id = %id, "importing instance");
        TrackedState {
            id,
            ..TrackedState::default()
        }
    }
}

/// Default the boot entry's device name when the caller left it unset.
fn resolve_boot_device(devices: &mut [BlockDevice]) {
    if let Some(boot) = devices.first_mut() {
        if boot.device_name.as_deref().is_none_or(str::is_empty) {
            boot.device_name = Some(DEFAULT_BOOT_DEVICE.to_string());
        }
    }
}

fn build_run_request(spec: &DesiredSpec, count: i32) -> RunInstancesRequest {
    RunInstancesRequest {
        image_id: spec.image_id.clone(),
        instance_type: spec.instance_type.clone(),
        subnet_id: spec.subnet_id.clone(),
        count,
        block_devices: spec
            .block_devices
            .iter()
            .map(|device| BlockDeviceRequest {
                device_name: device.device_name.clone().unwrap_or_default(),
                volume_size_gib: device.volume_size_gib,
                volume_type: device.volume_type.clone(),
            })
            .collect(),
        security_group_ids: spec.security_group_ids.clone(),
        key_name: spec.key_name.clone(),
        user_data: spec.user_data.clone(),
        tags: tags::synthesize(spec.display_name.as_deref(), spec.tags.as_ref()),
    }
}

/// Fill computed attributes from the post-create describe. Security groups
/// and display name only backfill when the user left them unset.
fn apply_computed(state: &mut TrackedState, view: &InstanceView) {
    state.state = view.state.clone();
    state.availability_zone = view.availability_zone.clone();
    if view.private_ip.is_some() {
        state.private_ip = view.private_ip.clone();
    }
    if view.public_ip.is_some() {
        state.public_ip = view.public_ip.clone();
    }
    if state.security_group_ids.is_none() {
        state.security_group_ids = Some(view.security_group_ids.clone());
    }
    if state.display_name.is_none() {
        let (display_name, _) = tags::absorb(&view.tags);
        state.display_name = display_name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_device_defaults_only_at_index_zero() {
        let mut devices = vec![
            BlockDevice {
                device_name: None,
                volume_size_gib: 20,
                volume_type: "gp2".to_string(),
            },
            BlockDevice {
                device_name: None,
                volume_size_gib: 100,
                volume_type: "gp2".to_string(),
            },
        ];
        resolve_boot_device(&mut devices);
        assert_eq!(devices[0].device_name.as_deref(), Some(DEFAULT_BOOT_DEVICE));
        assert_eq!(devices[1].device_name, None);
    }

    #[test]
    fn boot_device_empty_string_counts_as_unset() {
        let mut devices = vec![BlockDevice {
            device_name: Some(String::new()),
            volume_size_gib: 20,
            volume_type: "gp2".to_string(),
        }];
        resolve_boot_device(&mut devices);
        assert_eq!(devices[0].device_name.as_deref(), Some(DEFAULT_BOOT_DEVICE));
    }

    #[test]
    fn boot_device_supplied_name_is_preserved() {
        let mut devices = vec![BlockDevice {
            device_name: Some("/dev/sda1".to_string()),
            volume_size_gib: 20,
            volume_type: "gp2".to_string(),
        }];
        resolve_boot_device(&mut devices);
        assert_eq!(devices[0].device_name.as_deref(), Some("/dev/sda1"));
    }
}
