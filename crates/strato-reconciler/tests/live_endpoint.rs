//! Live-endpoint integration tests.
//!
//! These talk to a real compute deployment and are `#[ignore]`d. Run with:
//!
//! ```text
//! STRATO_TEST_ENDPOINT=https://compute.internal:8773 \
//! AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=... \
//! STRATO_TEST_IMAGE=img-... STRATO_TEST_SUBNET=subnet-... \
//! cargo test --test live_endpoint -- --ignored
//! ```

use strato_compute::CloudClient;
use strato_reconciler::config::ProviderSettings;
use strato_reconciler::model::{BlockDevice, DesiredSpec};
use strato_reconciler::reconciler::InstanceReconciler;
use tokio_util::sync::CancellationToken;

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set for live tests"))
}

async fn live_client() -> CloudClient {
    let settings = ProviderSettings {
        endpoint: Some(env("STRATO_TEST_ENDPOINT")),
        insecure_skip_tls: std::env::var("STRATO_TEST_INSECURE_TLS").is_ok(),
        ..ProviderSettings::default()
    }
    .resolve()
    .expect("credentials via AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY");
    CloudClient::connect(settings)
        .await
        .expect("connection context")
}

#[tokio::test]
#[ignore = "requires a live compute endpoint"]
async fn read_of_unknown_id_reports_absent() {
    let reconciler = InstanceReconciler::new(live_client().await);
    let cancel = CancellationToken::new();

    let seed = reconciler.import("i-00000000000000000");
    let outcome = reconciler
        .read(seed, &cancel)
        .await
        .expect("describe should classify unknown ids as absent, not fail");
    assert!(outcome.is_none());
}

#[tokio::test]
#[ignore = "requires a live compute endpoint"]
async fn create_read_delete_cycle() {
    let reconciler = InstanceReconciler::new(live_client().await);
    let cancel = CancellationToken::new();

    let spec = DesiredSpec {
        image_id: env("STRATO_TEST_IMAGE"),
        instance_type: std::env::var("STRATO_TEST_INSTANCE_TYPE")
            .unwrap_or_else(|_| "m1.small".to_string()),
        subnet_id: env("STRATO_TEST_SUBNET"),
        login_secret: "Test@123456".to_string(),
        block_devices: vec![BlockDevice {
            device_name: None,
            volume_size_gib: 20,
            volume_type: "gp2".to_string(),
        }],
        replica_count: None,
        display_name: Some("strato-live-test".to_string()),
        security_group_ids: None,
        key_name: None,
        user_data: None,
        tags: Some(
            [("Environment".to_string(), "test".to_string())]
                .into_iter()
                .collect(),
        ),
    };

    let created = reconciler.create(spec, &cancel).await.expect("create");
    assert!(!created.id.is_empty());
    assert_eq!(created.state.as_deref(), Some("running"));

    let read = reconciler
        .read(created.clone(), &cancel)
        .await
        .expect("read")
        .expect("instance should exist");
    assert_eq!(read.display_name.as_deref(), Some("strato-live-test"));

    reconciler.delete(&created.id, &cancel).await.expect("delete");
}
