use keystash_core::{
    AllSecretsOptions, Algorithm, Crypter, Digest, DynKeyWrapper, DynSecretStore,
    EncryptionContext, Error, GetOptions, KeyWrapper, Keystash, MemoryKeyWrapper, PutOptions,
    RecordId, SecretStore, Version,
};
use keystash_provider_object::{MemoryBucket, ObjectStore};
use keystash_provider_table::client::KEY_ATTR;
use keystash_provider_table::store::record_to_item;
use keystash_provider_table::{MemoryTable, TableClient, TableStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn keystash<S: SecretStore>(store: S, algorithm: Algorithm) -> Keystash<S, MemoryKeyWrapper> {
    init_tracing();
    Keystash::new(
        store,
        MemoryKeyWrapper::new("alias/test"),
        Crypter::new(algorithm),
    )
}

fn table() -> Keystash<TableStore<MemoryTable>, MemoryKeyWrapper> {
    keystash(TableStore::new(MemoryTable::new()), Algorithm::Aes256Ctr)
}

fn context(app: &str) -> EncryptionContext {
    EncryptionContext::from([("app".to_string(), app.to_string())])
}

fn at(version: &str) -> PutOptions {
    PutOptions {
        version: Some(Version::from(version)),
        ..PutOptions::default()
    }
}

async fn lifecycle<S: SecretStore>(ks: Keystash<S, MemoryKeyWrapper>) {
    let first = ks
        .put_next_version("db", b"one", PutOptions::default())
        .await
        .unwrap();
    let second = ks
        .put_next_version(
            "db",
            b"two",
            PutOptions {
                digest: Digest::Sha512,
                ..PutOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.as_str(), "0000000000000000001");
    assert_eq!(second.as_str(), "0000000000000000002");
    assert_eq!(ks.highest_version("db").await.unwrap(), second);

    let latest = ks.get_secret("db", GetOptions::default()).await.unwrap();
    assert_eq!(latest, b"two");
    let pinned = ks
        .get_secret(
            "db",
            GetOptions {
                version: Some(Version::from("1")),
                ..GetOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pinned, b"one");

    let versions = ks
        .get_all_versions("db", &EncryptionContext::new(), None)
        .await
        .unwrap();
    let listed: Vec<_> = versions
        .iter()
        .map(|v| (v.version.clone(), v.secret.clone()))
        .collect();
    assert_eq!(
        listed,
        vec![(second.clone(), b"two".to_vec()), (first.clone(), b"one".to_vec())]
    );

    ks.delete_secret("db", &Version::from("2")).await.unwrap();
    assert_eq!(ks.get_secret("db", GetOptions::default()).await.unwrap(), b"one");
    assert_eq!(ks.delete_secrets("db").await.unwrap(), vec![first]);
    let err = ks.get_secret("db", GetOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "db could not be found");
}

#[tokio::test]
async fn lifecycle_on_table() {
    lifecycle(table()).await;
}

#[tokio::test]
async fn lifecycle_on_object_store() {
    let store = ObjectStore::new(MemoryBucket::with_page_size(1)).with_folder("secrets");
    lifecycle(keystash(store, Algorithm::Aes256Gcm)).await;
}

#[tokio::test]
async fn type_erased_parts_work_together() {
    init_tracing();
    let store: DynSecretStore = Arc::new(TableStore::new(MemoryTable::new()));
    let wrapper: DynKeyWrapper = Arc::new(MemoryKeyWrapper::new("alias/dyn"));
    let ks = Keystash::new(store, wrapper, Crypter::default());
    ks.put_secret("db", b"erased", PutOptions::default())
        .await
        .unwrap();
    assert_eq!(
        ks.get_secret("db", GetOptions::default()).await.unwrap(),
        b"erased"
    );
    assert_eq!(ks.wrapper().key_id(), "alias/dyn");
}

#[tokio::test]
async fn highest_of_a_missing_secret_is_zero() {
    let ks = table();
    assert_eq!(ks.highest_version("nothing").await.unwrap(), Version::zero());
    assert_eq!(
        ks.increment_version("nothing").await.unwrap(),
        Version::initial()
    );
}

#[tokio::test]
async fn default_read_picks_the_numerically_highest_version() {
    let ks = table();
    for (version, secret) in [("1", "first"), ("2", "second"), ("6", "sixth")] {
        ks.put_secret("db", secret.as_bytes(), at(version))
            .await
            .unwrap();
    }
    let secret = ks.get_secret("db", GetOptions::default()).await.unwrap();
    assert_eq!(secret, b"sixth");

    let limited = ks
        .get_all_versions("db", &EncryptionContext::new(), Some(2))
        .await
        .unwrap();
    let versions: Vec<_> = limited.into_iter().map(|v| v.version).collect();
    assert_eq!(versions, [6, 2].map(Version::padded).to_vec());
}

#[tokio::test]
async fn duplicate_put_is_rejected() {
    let ks = table();
    ks.put_secret("db", b"a", PutOptions::default()).await.unwrap();
    let err = ks
        .put_secret("db", b"b", at("0000000000000000001"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
    assert_eq!(
        err.to_string(),
        "db version 0000000000000000001 is already in the credential store"
    );
    assert_eq!(ks.get_secret("db", GetOptions::default()).await.unwrap(), b"a");
}

#[tokio::test]
async fn non_numeric_versions_cannot_be_incremented() {
    let ks = table();
    ks.put_secret("db", b"a", at("release")).await.unwrap();
    let err = ks
        .put_next_version("db", b"b", PutOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "can not autoincrement version: the current version release is not an int"
    );

    let secret = ks
        .get_secret(
            "db",
            GetOptions {
                version: Some(Version::from("release")),
                ..GetOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(secret, b"a");
}

#[tokio::test]
async fn context_mismatch_explains_itself() {
    let ks = table();
    ks.put_secret(
        "db",
        b"a",
        PutOptions {
            context: context("billing"),
            ..PutOptions::default()
        },
    )
    .await
    .unwrap();

    let missing = ks.get_secret("db", GetOptions::default()).await.unwrap_err();
    assert!(matches!(missing, Error::ContextMismatch { .. }));
    assert!(missing.to_string().contains("may require that an encryption context"));

    let wrong = ks
        .get_secret(
            "db",
            GetOptions {
                context: context("payroll"),
                ..GetOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(wrong.to_string().contains("may not match the one used"));

    let right = ks
        .get_secret(
            "db",
            GetOptions {
                context: context("billing"),
                ..GetOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(right, b"a");
}

#[tokio::test]
async fn tampered_hmac_fails_integrity() {
    let ks = table();
    ks.put_secret("db", b"a", PutOptions::default()).await.unwrap();
    let mut record = ks.store().get_latest_version("db").await.unwrap().unwrap();
    record.name = "forged".into();
    record.hmac[0] ^= 0x01;
    ks.store().create_secret(record).await.unwrap();

    let err = ks
        .get_secret("forged", GetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));
    assert_eq!(
        err.to_string(),
        "computed HMAC on forged does not match stored HMAC"
    );
}

#[tokio::test]
async fn get_all_secrets_skips_what_it_cannot_open() {
    let ks = table();
    ks.put_secret("app.db", b"db-1", PutOptions::default())
        .await
        .unwrap();
    ks.put_next_version("app.db", b"db-2", PutOptions::default())
        .await
        .unwrap();
    ks.put_secret("app.api", b"api", PutOptions::default())
        .await
        .unwrap();
    ks.put_secret("other.token", b"token", PutOptions::default())
        .await
        .unwrap();
    ks.put_secret(
        "app.scoped",
        b"scoped",
        PutOptions {
            context: context("billing"),
            ..PutOptions::default()
        },
    )
    .await
    .unwrap();
    let mut forged = ks
        .store()
        .get_latest_version("app.api")
        .await
        .unwrap()
        .unwrap();
    forged.name = "app.forged".into();
    forged.hmac[0] ^= 0x01;
    ks.store().create_secret(forged).await.unwrap();
    let mut garbled = ks
        .store()
        .get_latest_version("app.db")
        .await
        .unwrap()
        .unwrap();
    garbled.name = "app.garbled".into();
    let last = garbled.contents.len() - 1;
    garbled.contents[last] ^= 0x01;
    ks.store().create_secret(garbled).await.unwrap();

    let secrets = ks
        .get_all_secrets(AllSecretsOptions {
            starts_with: Some("app.".into()),
            ..AllSecretsOptions::default()
        })
        .await
        .unwrap();
    let names: Vec<_> = secrets.keys().map(String::as_str).collect();
    assert_eq!(names, ["app.api", "app.db"]);
    assert_eq!(secrets["app.db"], b"db-2");

    let first_versions = ks
        .get_all_secrets(AllSecretsOptions {
            version: Some(Version::from("1")),
            ..AllSecretsOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(first_versions["app.db"], b"db-1");
    assert_eq!(first_versions.len(), 3);
}

#[tokio::test]
async fn items_without_a_wrapped_key_are_not_found() {
    let ks = table();
    ks.put_secret("good", b"fine", PutOptions::default())
        .await
        .unwrap();
    let mut keyless = ks.store().get_latest_version("good").await.unwrap().unwrap();
    keyless.name = "keyless".into();
    let mut item = record_to_item(keyless);
    item.remove(KEY_ATTR);
    ks.store().client().put_if_absent(item).await.unwrap();

    let secrets = ks
        .get_all_secrets(AllSecretsOptions::default())
        .await
        .unwrap();
    let names: Vec<_> = secrets.keys().map(String::as_str).collect();
    assert_eq!(names, ["good"]);

    let err = ks
        .get_secret("keyless", GetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn listing_is_sorted_by_name_then_newest() {
    let ks = table();
    for (name, version) in [("b", "1"), ("a", "1"), ("b", "3"), ("a", "2")] {
        ks.put_secret(name, b"x", at(version)).await.unwrap();
    }
    let ids = ks.list_secrets(None).await.unwrap();
    assert_eq!(
        ids,
        vec![
            RecordId::new("a", 2u64),
            RecordId::new("a", 1u64),
            RecordId::new("b", 3u64),
            RecordId::new("b", 1u64),
        ]
    );
    let only_b = ks.list_secrets(Some("b")).await.unwrap();
    assert_eq!(only_b, vec![RecordId::new("b", 3u64), RecordId::new("b", 1u64)]);
}

#[tokio::test]
async fn fixed_iv_gives_identical_contents() {
    let ks = keystash(TableStore::new(MemoryTable::new()), Algorithm::Aes256Ctr);
    let iv = vec![7u8; 16];
    for name in ["left", "right"] {
        ks.put_secret(
            name,
            b"same",
            PutOptions {
                iv: Some(iv.clone()),
                ..PutOptions::default()
            },
        )
        .await
        .unwrap();
    }
    let left = ks.store().get_latest_version("left").await.unwrap().unwrap();
    let right = ks.store().get_latest_version("right").await.unwrap().unwrap();
    // fresh key material per put, so only the IV carries over
    assert_ne!(left.contents, right.contents);
    assert_eq!(
        ks.get_secret("right", GetOptions::default()).await.unwrap(),
        b"same"
    );
}

#[tokio::test]
async fn blank_inputs_are_validation_errors() {
    let ks = table();
    let err = ks
        .put_secret(" ", b"x", PutOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "\"name\" is a required parameter");
    let err = ks
        .put_secret("db", b"", PutOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "\"secret\" is a required parameter");
    let err = ks
        .delete_secret("db", &Version::from(""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = ks.get_secret("", GetOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn deleting_a_missing_version_is_not_found() {
    let ks = table();
    ks.put_secret("db", b"x", PutOptions::default()).await.unwrap();
    let err = ks
        .delete_secret("db", &Version::from("9"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
