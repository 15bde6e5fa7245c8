//! AWS transports for keystash.
//!
//! [`DynamoTableClient`] and [`S3ObjectClient`] plug DynamoDB and S3 into the
//! table and object stores; [`KmsKeyWrapper`] mints data keys through KMS.

pub mod builder;
pub mod dynamo;
pub mod kms;
pub mod s3;

pub use builder::{
    AwsKeystash, StoreTarget, build_from_config, build_from_env, build_with_sdk_config,
    load_sdk_config,
};
pub use dynamo::DynamoTableClient;
pub use kms::KmsKeyWrapper;
pub use s3::S3ObjectClient;
