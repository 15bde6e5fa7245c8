use anyhow::Result;
use keystash_provider_object::{MemoryBucket, ObjectStore};
use keystash_store_tests::{Capabilities, ContractSuite, TestEnv, TestPrefix};

fn env() -> TestEnv {
    TestEnv {
        prefix: TestPrefix::new("object", "conformance"),
        cleanup: true,
    }
}

#[tokio::test]
async fn contract_in_folder() -> Result<()> {
    let store = ObjectStore::new(MemoryBucket::new()).with_folder("secrets");
    ContractSuite::new(&store, Capabilities::default().with_delete_latest())
        .with_env(env())
        .run()
        .await?;
    assert_eq!(store.client().version_count(), 0);
    Ok(())
}

#[tokio::test]
async fn contract_at_bucket_root_with_paging() -> Result<()> {
    let store = ObjectStore::new(MemoryBucket::with_page_size(1));
    ContractSuite::new(&store, Capabilities::default().with_delete_latest())
        .with_env(env())
        .run()
        .await
}
