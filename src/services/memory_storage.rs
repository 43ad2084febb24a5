//! In-memory `ObjectStorage` for tests.
//!
//! Holds a single bucket in a `BTreeMap` so listings come back in key order,
//! like S3. Individual calls can be made to fail with a given error code, and
//! `head_object` can be told to report every key as present.

use crate::{
    models::listing::ObjectSummary,
    services::object_storage::{
        ObjectStorage, PutObject, PutReceipt, StorageError, StorageResult,
    },
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::Utc;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub content_md5: String,
    pub metadata: HashMap<String, String>,
    pub etag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    HeadBucket,
    HeadObject,
    Put,
    Delete,
    List,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failures: Mutex<HashMap<Call, String>>,
    everything_present: Mutex<bool>,
    heads: Mutex<usize>,
    puts: Mutex<usize>,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Make every subsequent `call` fail with a service error carrying `code`.
    pub fn fail(&self, call: Call, code: &str) {
        self.failures.lock().unwrap().insert(call, code.to_string());
    }

    /// Answer every `head_object` as if the key already existed.
    pub fn report_everything_present(&self) {
        *self.everything_present.lock().unwrap() = true;
    }

    pub fn insert(&self, key: &str, body: &[u8]) {
        let digest = md5::compute(body);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: Bytes::copy_from_slice(body),
                content_type: "application/octet-stream".into(),
                content_md5: general_purpose::STANDARD.encode(digest.0),
                metadata: HashMap::new(),
                etag: format!("{:x}", digest),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }

    pub fn head_object_count(&self) -> usize {
        *self.heads.lock().unwrap()
    }

    fn check(&self, call: Call, bucket: &str) -> StorageResult<()> {
        if let Some(code) = self.failures.lock().unwrap().get(&call) {
            return Err(StorageError::Service {
                code: code.clone(),
                message: format!("injected {:?} failure", call),
            });
        }
        if bucket != self.bucket {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn head_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.check(Call::HeadBucket, bucket)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        *self.heads.lock().unwrap() += 1;
        self.check(Call::HeadObject, bucket)?;
        if *self.everything_present.lock().unwrap()
            || self.objects.lock().unwrap().contains_key(key)
        {
            Ok(())
        } else {
            Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> StorageResult<PutReceipt> {
        self.check(Call::Put, bucket)?;
        let etag = format!("{:x}", md5::compute(&object.body));
        self.objects.lock().unwrap().insert(
            object.key,
            StoredObject {
                body: object.body,
                content_type: object.content_type,
                content_md5: object.content_md5,
                metadata: object.metadata.into_iter().collect(),
                etag: etag.clone(),
            },
        );
        *self.puts.lock().unwrap() += 1;
        Ok(PutReceipt {
            etag: Some(format!("\"{}\"", etag)),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.check(Call::Delete, bucket)?;
        // S3 deletes are idempotent.
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: i32,
    ) -> StorageResult<Vec<ObjectSummary>> {
        self.check(Call::List, bucket)?;
        let limit = usize::try_from(max_keys).unwrap_or(0);
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .take(limit)
            .map(|(key, obj)| ObjectSummary {
                key: key.clone(),
                size: obj.body.len() as i64,
                last_modified: Some(Utc::now()),
                checksum: Some(format!("\"{}\"", obj.etag)),
                storage_class: Some("STANDARD".into()),
            })
            .collect())
    }
}
