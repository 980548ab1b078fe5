//! Desired-state and tracked-state documents for compute instances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Device path assigned to the boot volume when the caller leaves it unset.
pub const DEFAULT_BOOT_DEVICE: &str = "/dev/vda";

/// One block-device mapping. The first entry of a spec is the boot volume,
/// the rest are data volumes.
///
/// The remote system cannot mutate an attached mapping in place; any change
/// to the mapping list forces instance replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Resolved during reconciliation when unset: the boot entry defaults to
    /// [`DEFAULT_BOOT_DEVICE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub volume_size_gib: i32,
    /// Remote volume type name, e.g. `"gp2"`.
    pub volume_type: String,
}

/// The user-declared target configuration for one instance, supplied fresh
/// on every reconciliation call.
#[derive(Clone, Serialize, Deserialize)]
pub struct DesiredSpec {
    pub image_id: String,
    pub instance_type: String,
    pub subnet_id: String,
    /// Login secret for the instance. The remote create call has no field
    /// for it today, so it is tracked but never transmitted.
    pub login_secret: String,
    pub block_devices: Vec<BlockDevice>,
    /// Number of instances the create call asks for. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// `None` lets the remote system choose or inherit defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    /// User tags. The display name travels as the remote `Name` tag and is
    /// never part of this mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

impl fmt::Debug for DesiredSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesiredSpec")
            .field("image_id", &self.image_id)
            .field("instance_type", &self.instance_type)
            .field("subnet_id", &self.subnet_id)
            .field("login_secret", &"<redacted>")
            .field("block_devices", &self.block_devices)
            .field("replica_count", &self.replica_count)
            .field("display_name", &self.display_name)
            .field("security_group_ids", &self.security_group_ids)
            .field("key_name", &self.key_name)
            .field("user_data", &self.user_data)
            .field("tags", &self.tags)
            .finish()
    }
}

/// The reconciler's record of one instance's last-known remote reality.
///
/// Created by a successful create, refreshed in place by read, partially
/// overwritten by update, and dropped from the host's tracking store after a
/// successful delete or a read that finds the instance gone.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TrackedState {
    /// Remote identifier. Assigned once at create and immutable afterwards.
    pub id: String,
    /// Always present after a successful create or read; `None` only on a
    /// freshly imported seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Not derivable from the remote API; unresolved after import until the
    /// operator reconciles it on the next apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_devices: Vec<BlockDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// Opaque remote lifecycle status, recorded verbatim for observability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

impl TrackedState {
    /// Tracked state carrying everything knowable from the spec alone;
    /// computed attributes start unset.
    pub fn from_spec(id: &str, spec: DesiredSpec) -> Self {
        Self {
            id: id.to_string(),
            image_id: Some(spec.image_id),
            instance_type: Some(spec.instance_type),
            subnet_id: Some(spec.subnet_id),
            login_secret: Some(spec.login_secret),
            block_devices: spec.block_devices,
            replica_count: spec.replica_count,
            display_name: spec.display_name,
            security_group_ids: spec.security_group_ids,
            key_name: spec.key_name,
            user_data: spec.user_data,
            tags: spec.tags,
            private_ip: None,
            public_ip: None,
            state: None,
            availability_zone: None,
        }
    }
}

impl fmt::Debug for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedState")
            .field("id", &self.id)
            .field("image_id", &self.image_id)
            .field("instance_type", &self.instance_type)
            .field("subnet_id", &self.subnet_id)
            .field(
                "login_secret",
                &self.login_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("block_devices", &self.block_devices)
            .field("replica_count", &self.replica_count)
            .field("display_name", &self.display_name)
            .field("security_group_ids", &self.security_group_ids)
            .field("key_name", &self.key_name)
            .field("user_data", &self.user_data)
            .field("tags", &self.tags)
            .field("private_ip", &self.private_ip)
            .field("public_ip", &self.public_ip)
            .field("state", &self.state)
            .field("availability_zone", &self.availability_zone)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DesiredSpec {
        DesiredSpec {
            image_id: "img-1".to_string(),
            instance_type: "m1.small".to_string(),
            subnet_id: "subnet-1".to_string(),
            login_secret: "Sup3rSecret".to_string(),
            block_devices: vec![BlockDevice {
                device_name: None,
                volume_size_gib: 20,
                volume_type: "gp2".to_string(),
            }],
            replica_count: None,
            display_name: Some("web-1".to_string()),
            security_group_ids: None,
            key_name: None,
            user_data: None,
            tags: None,
        }
    }

    #[test]
    fn debug_never_prints_the_login_secret() {
        let spec = spec();
        assert!(!format!("{spec:?}").contains("Sup3rSecret"));

        let state = TrackedState::from_spec("i-1", spec);
        assert!(!format!("{state:?}").contains("Sup3rSecret"));
    }

    #[test]
    fn from_spec_copies_declared_fields_and_leaves_computed_unset() {
        let state = TrackedState::from_spec("i-1", spec());
        assert_eq!(state.id, "i-1");
        assert_eq!(state.image_id.as_deref(), Some("img-1"));
        assert_eq!(state.display_name.as_deref(), Some("web-1"));
        assert_eq!(state.private_ip, None);
        assert_eq!(state.state, None);
    }

    #[test]
    fn spec_document_round_trips_through_json() {
        let json = r#"{
            "image_id": "img-1",
            "instance_type": "m1.small",
            "subnet_id": "subnet-1",
            "login_secret": "pw",
            "block_devices": [{"volume_size_gib": 20, "volume_type": "gp2"}],
            "tags": {"Environment": "test"}
        }"#;
        let spec: DesiredSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.replica_count, None);
        assert_eq!(spec.block_devices[0].device_name, None);
        assert_eq!(
            spec.tags.as_ref().unwrap().get("Environment").unwrap(),
            "test"
        );

        let encoded = serde_json::to_string(&spec).unwrap();
        let again: DesiredSpec = serde_json::from_str(&encoded).unwrap();
        assert_eq!(again.image_id, spec.image_id);
        assert_eq!(again.tags, spec.tags);
    }
}
