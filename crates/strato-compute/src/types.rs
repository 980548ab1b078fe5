//! Domain-level request and view types for the compute service.

/// One block-device mapping entry of a create request. The first entry is
/// the boot volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDeviceRequest {
    pub device_name: String,
    pub volume_size_gib: i32,
    pub volume_type: String,
}

/// Everything a create call sends to the remote system.
#[derive(Debug, Clone)]
pub struct RunInstancesRequest {
    pub image_id: String,
    pub instance_type: String,
    pub subnet_id: String,
    /// Used as both the minimum and maximum instance count.
    pub count: i32,
    pub block_devices: Vec<BlockDeviceRequest>,
    /// `None` lets the remote system choose or inherit its defaults;
    /// `Some(vec![])` would pin an explicitly empty set.
    pub security_group_ids: Option<Vec<String>>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    /// Full tag set to attach, display-name alias included.
    pub tags: Vec<(String, String)>,
}

/// One instance as reported by a describe call.
///
/// String fields the API reported as empty come back as `None`, so "only
/// overwrite tracked state with non-empty values" falls out of the type.
#[derive(Debug, Clone, Default)]
pub struct InstanceView {
    pub id: String,
    pub image_id: Option<String>,
    pub instance_type: Option<String>,
    pub subnet_id: Option<String>,
    /// Opaque remote lifecycle status, e.g. `"pending"`, `"running"`.
    pub state: Option<String>,
    pub availability_zone: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub key_name: Option<String>,
    pub security_group_ids: Vec<String>,
    pub tags: Vec<(String, String)>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

impl InstanceView {
    pub(crate) fn from_sdk(instance: &aws_sdk_ec2::types::Instance) -> Self {
        Self {
            id: instance.instance_id().unwrap_or_default().to_string(),
            image_id: non_empty(instance.image_id()),
            instance_type: instance
                .instance_type()
                .map(|t| t.as_str().to_string()),
            subnet_id: non_empty(instance.subnet_id()),
            state: instance
                .state()
                .and_then(|s| s.name())
                .map(|n| n.as_str().to_string()),
            availability_zone: non_empty(
                instance
                    .placement()
                    .and_then(|p| p.availability_zone()),
            ),
            private_ip: non_empty(instance.private_ip_address()),
            public_ip: non_empty(instance.public_ip_address()),
            key_name: non_empty(instance.key_name()),
            security_group_ids: instance
                .security_groups()
                .iter()
                .filter_map(|g| g.group_id())
                .map(str::to_owned)
                .collect(),
            tags: instance
                .tags()
                .iter()
                .filter_map(|t| Some((t.key()?.to_string(), t.value()?.to_string())))
                .collect(),
        }
    }
}
