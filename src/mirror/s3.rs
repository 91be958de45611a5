//! S3-compatible object store as a mirror source.
//!
//! The remote root has the form `bucket/prefix`. Every object under the
//! prefix is listed with its key relative to the prefix. Anonymous access and
//! an endpoint override allow reading public buckets on other providers
//! through their S3 interoperability API (e.g. Google Cloud Storage).

use std::time::SystemTime;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::io::AsyncWrite;

use crate::error::{AppError, Result};
use crate::mirror::{RemoteObject, RemoteSource};
use crate::models::RemoteConfig;

/// Objects under one bucket prefix.
#[derive(Clone)]
pub struct S3Source {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Source {
    /// Create a source for `root` using an existing client.
    pub fn new(client: Client, root: &str) -> Result<Self> {
        let (bucket, prefix) = split_root(root)?;
        Ok(Self {
            client,
            bucket,
            prefix,
        })
    }

    /// Build a client from configuration and create a source for `root`.
    pub async fn connect(config: &RemoteConfig, root: &str) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if config.anonymous {
            loader = loader.no_credentials();
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.path_style)
            .build();

        Self::new(Client::from_conf(s3_config), root)
    }
}

/// Split `bucket/some/prefix` into the bucket and a `/`-terminated prefix.
fn split_root(root: &str) -> Result<(String, String)> {
    let trimmed = root.trim_matches('/');
    let (bucket, prefix) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    if bucket.is_empty() {
        return Err(AppError::validation(format!(
            "remote root '{root}' does not name a bucket"
        )));
    }
    let prefix = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix.trim_end_matches('/'))
    };
    Ok((bucket.to_string(), prefix))
}

#[async_trait]
impl RemoteSource for S3Source {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }

    async fn list(&self) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| AppError::S3(e.into_service_error().to_string()))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let rel = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
                objects.push(RemoteObject {
                    key: rel.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    modified: object
                        .last_modified()
                        .and_then(|t| SystemTime::try_from(*t).ok()),
                });
            }
        }

        log::debug!("Listed {} objects under {}", objects.len(), self.describe());
        Ok(objects)
    }

    async fn fetch_to(&self, key: &str, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64> {
        let full_key = format!("{}{}", self.prefix, key);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| AppError::S3(e.into_service_error().to_string()))?;

        let mut body = output.body.into_async_read();
        Ok(tokio::io::copy(&mut body, dest).await?)
    }
}
