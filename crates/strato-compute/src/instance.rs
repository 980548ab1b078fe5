//! Instance operations against the remote compute service.

use crate::error::ApiError;
use crate::types::{InstanceView, RunInstancesRequest};
use crate::wait::{cancellable, wait_until, WaitConfig};
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, InstanceType, ResourceType, Tag, TagSpecification,
    VolumeType,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Remote status that ends the readiness wait successfully.
const STATE_RUNNING: &str = "running";
/// Remote status that keeps the readiness wait polling.
const STATE_PENDING: &str = "pending";

/// Compute-service client. Construct through
/// [`CloudClient::compute`](crate::conns::CloudClient::compute) so the
/// underlying SDK client is shared across the session.
#[derive(Clone)]
pub struct ComputeClient {
    client: aws_sdk_ec2::Client,
}

impl ComputeClient {
    pub(crate) fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }

    /// Issue the create call and return the new instance ids in the order
    /// the API reported them.
    pub async fn run_instances(
        &self,
        request: &RunInstancesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ApiError> {
        info!(
            image_id = %request.image_id,
            instance_type = %request.instance_type,
            subnet_id = %request.subnet_id,
            count = request.count,
            "creating instances"
        );

        let mut call = self
            .client
            .run_instances()
            .image_id(&request.image_id)
            .instance_type(InstanceType::from(request.instance_type.as_str()))
            .subnet_id(&request.subnet_id)
            .min_count(request.count)
            .max_count(request.count);

        for device in &request.block_devices {
            call = call.block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name(&device.device_name)
                    .ebs(
                        EbsBlockDevice::builder()
                            .volume_size(device.volume_size_gib)
                            .volume_type(VolumeType::from(device.volume_type.as_str()))
                            .delete_on_termination(true)
                            .build(),
                    )
                    .build(),
            );
        }

        if let Some(groups) = &request.security_group_ids {
            call = call.set_security_group_ids(Some(groups.clone()));
        }
        if let Some(key_name) = &request.key_name {
            call = call.key_name(key_name);
        }
        if let Some(user_data) = &request.user_data {
            call = call.user_data(user_data);
        }
        if !request.tags.is_empty() {
            let mut spec = TagSpecification::builder().resource_type(ResourceType::Instance);
            for (key, value) in &request.tags {
                spec = spec.tags(Tag::builder().key(key).value(value).build());
            }
            call = call.tag_specifications(spec.build());
        }

        let response = cancellable("RunInstances", cancel, call.send())
            .await?
            .map_err(|e| ApiError::from_sdk("RunInstances", &e))?;

        let ids: Vec<String> = response
            .instances()
            .iter()
            .filter_map(|i| i.instance_id())
            .map(str::to_owned)
            .collect();
        debug!(instance_ids = ?ids, "create call accepted");
        Ok(ids)
    }

    /// Describe one instance. `Ok(None)` means the call succeeded but no
    /// matching reservation came back, which the remote system uses
    /// interchangeably with the explicit not-found error code.
    pub async fn describe_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<InstanceView>, ApiError> {
        let response = cancellable(
            "DescribeInstances",
            cancel,
            self.client.describe_instances().instance_ids(id).send(),
        )
        .await?
        .map_err(|e| ApiError::from_sdk("DescribeInstances", &e))?;

        Ok(response
            .reservations()
            .first()
            .and_then(|r| r.instances().first())
            .map(InstanceView::from_sdk))
    }

    /// Request termination. Returns as soon as the API acknowledges; callers
    /// that care about terminal status poll separately.
    pub async fn terminate_instance(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        info!(instance_id = %id, "terminating instance");
        cancellable(
            "TerminateInstances",
            cancel,
            self.client.terminate_instances().instance_ids(id).send(),
        )
        .await?
        .map_err(|e| ApiError::from_sdk("TerminateInstances", &e))?;
        Ok(())
    }

    /// Poll until the instance reports `running`.
    ///
    /// `pending` keeps polling, as does a not-found answer: describe can
    /// briefly miss an instance the create call just returned. Any other
    /// status fails the wait, the instance is not on its way up.
    pub async fn wait_until_running(
        &self,
        id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        info!(instance_id = %id, timeout_secs = timeout.as_secs(), "waiting for instance to run");
        let config = WaitConfig {
            timeout,
            ..WaitConfig::default()
        };

        wait_until(
            config,
            cancel,
            || async {
                match self.describe_instance(id, cancel).await {
                    Ok(Some(view)) => match view.state.as_deref() {
                        Some(STATE_RUNNING) => Ok(true),
                        Some(STATE_PENDING) | None => Ok(false),
                        Some(other) => Err(ApiError::invalid_response(
                            "WaitUntilRunning",
                            format!("instance {id} entered state {other:?} while waiting for running"),
                        )),
                    },
                    Ok(None) => Ok(false),
                    Err(e) if e.is_not_found() => Ok(false),
                    Err(e) => Err(e),
                }
            },
            "WaitUntilRunning",
        )
        .await
    }
}
