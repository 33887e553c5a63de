use std::io::Read;
use std::time::Duration;

use rusty_s3::actions::{ListObjectsV2, S3Action};
use rusty_s3::{Bucket, Credentials, UrlStyle};

use crate::error::{BruteError, Result};
use crate::storage::{ObjectInfo, ObjectStore};

/// Validity window for presigned request URLs.
const PRESIGN_DURATION: Duration = Duration::from_secs(3600);

/// S3-compatible backend over presigned `rusty_s3` requests and a blocking
/// `ureq` agent. Each call is a single attempt: chunk upload/download
/// retries are the pipeline's responsibility.
pub struct S3Store {
    bucket: Bucket,
    credentials: Credentials,
    agent: ureq::Agent,
}

impl S3Store {
    pub fn new(
        endpoint: &str,
        region: &str,
        bucket_name: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self> {
        let base_url = endpoint
            .parse()
            .map_err(|e| BruteError::Config(format!("invalid S3 endpoint '{endpoint}': {e}")))?;

        // Endpoint is always explicit in the config; use path-style addressing.
        let bucket = Bucket::new(
            base_url,
            UrlStyle::Path,
            bucket_name.to_string(),
            region.to_string(),
        )
        .map_err(|e| BruteError::Config(format!("failed to create S3 bucket handle: {e}")))?;

        let credentials = Credentials::new(access_key, secret_key);

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .timeout_write(Duration::from_secs(300))
            .build();

        Ok(Self {
            bucket,
            credentials,
            agent,
        })
    }
}

impl ObjectStore for S3Store {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let url = self
            .bucket
            .put_object(Some(&self.credentials), key)
            .sign(PRESIGN_DURATION);

        self.agent
            .put(url.as_str())
            .send_bytes(data)
            .map_err(|e| BruteError::Storage(format!("PUT {key}: {e}")))?;
        Ok(())
    }

    fn get(&self, key: &str, buf: &mut Vec<u8>) -> Result<bool> {
        let url = self
            .bucket
            .get_object(Some(&self.credentials), key)
            .sign(PRESIGN_DURATION);

        match self.agent.get(url.as_str()).call() {
            Ok(resp) => {
                buf.clear();
                resp.into_reader()
                    .read_to_end(buf)
                    .map_err(|e| BruteError::Storage(format!("GET {key}: body read: {e}")))?;
                Ok(true)
            }
            Err(ureq::Error::Status(404, _)) => {
                buf.clear();
                Ok(false)
            }
            Err(e) => Err(BruteError::Storage(format!("GET {key}: {e}"))),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut action = self.bucket.list_objects_v2(Some(&self.credentials));
            if !prefix.is_empty() {
                action.query_mut().insert("prefix", prefix);
            }
            if let Some(ref token) = continuation_token {
                action.query_mut().insert("continuation-token", token);
            }
            let url = action.sign(PRESIGN_DURATION);

            let resp = self
                .agent
                .get(url.as_str())
                .call()
                .map_err(|e| BruteError::Storage(format!("LIST {prefix}: {e}")))?;

            let mut body = Vec::new();
            resp.into_reader()
                .read_to_end(&mut body)
                .map_err(|e| BruteError::Storage(format!("LIST {prefix}: body read: {e}")))?;

            let body_str = std::str::from_utf8(&body).map_err(|e| {
                BruteError::Storage(format!("LIST {prefix}: invalid utf-8 response: {e}"))
            })?;
            let parsed = ListObjectsV2::parse_response(body_str).map_err(|e| {
                BruteError::Storage(format!("LIST {prefix}: failed to parse response: {e}"))
            })?;

            for obj in parsed.contents {
                // Skip directory markers.
                if obj.key.ends_with('/') {
                    continue;
                }
                objects.push(ObjectInfo {
                    key: obj.key,
                    size: obj.size,
                });
            }

            match parsed.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(objects)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let url = self
            .bucket
            .delete_object(Some(&self.credentials), key)
            .sign(PRESIGN_DURATION);

        self.agent
            .delete(url.as_str())
            .call()
            .map_err(|e| BruteError::Storage(format!("DELETE {key}: {e}")))?;
        Ok(())
    }
}
