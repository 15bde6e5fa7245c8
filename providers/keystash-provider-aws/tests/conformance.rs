//! Runs against real AWS (or an emulator via `KEYSTASH_ENDPOINT`) when
//! `KEYSTASH_INTEGRATION=1`. The table or bucket and the KMS key must exist.

use anyhow::Result;
use keystash_core::{EncryptionContext, GetOptions, PutOptions, SecretStore};
use keystash_provider_aws::build_from_env;
use keystash_store_tests::{Capabilities, ContractSuite, TestEnv, parse_bool_env};
use serial_test::serial;

const INTEGRATION_ENV: &str = "KEYSTASH_INTEGRATION";

fn enabled() -> bool {
    if parse_bool_env(INTEGRATION_ENV) {
        return true;
    }
    eprintln!("skipping: {INTEGRATION_ENV} is not set");
    false
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs AWS credentials and provisioned resources"]
#[serial]
async fn store_contract() -> Result<()> {
    if !enabled() {
        return Ok(());
    }
    let keystash = build_from_env().await?;
    let store = keystash.store().as_ref();
    let caps = match store.backend_name() {
        "object" => Capabilities::default().with_delete_latest(),
        _ => Capabilities::default(),
    };
    ContractSuite::new(store, caps)
        .with_env(TestEnv::from_env(store.backend_name()))
        .run()
        .await
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs AWS credentials and provisioned resources"]
#[serial]
async fn kms_round_trip() -> Result<()> {
    if !enabled() {
        return Ok(());
    }
    let keystash = build_from_env().await?;
    let env = TestEnv::from_env(keystash.store().backend_name());
    let name = env.prefix.name("kms-round-trip");
    let context = EncryptionContext::from([("purpose".to_string(), "integration".to_string())]);

    let version = keystash
        .put_secret(
            &name,
            b"hunter2",
            PutOptions {
                context: context.clone(),
                ..PutOptions::default()
            },
        )
        .await?;
    let plaintext = keystash
        .get_secret(
            &name,
            GetOptions {
                version: Some(version.clone()),
                context,
            },
        )
        .await;
    let wrong = keystash.get_secret(&name, GetOptions::default()).await;
    keystash.delete_secret(&name, &version).await?;

    assert_eq!(plaintext?, b"hunter2");
    assert!(wrong.is_err());
    Ok(())
}
