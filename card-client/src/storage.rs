//! Typed client for the template, record and asset storage services.
//!
//! Every payload is the JSON the services store: templates are
//! [`Template`]s, students are [`Record`]s, uploaded shapes are
//! [`ShapeAsset`]s. Reads are retried with exponential backoff; writes are
//! sent once and a rejection surfaces the service's own message.

use std::sync::Arc;
use std::time::Duration;

use card_core::{Record, ShapeAsset, ShapeCatalog, Template};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ClientConfig, RetryConfig};
use crate::error::{ClientError, ClientResult};

/// An uploaded image or pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Storage id, when the service returns one.
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Same-origin URL of the stored file.
    pub url: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Client for the storage services.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct StorageClient {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    base: Url,
    token: Option<String>,
    retry: RetryConfig,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("base", &self.inner.base.as_str())
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    /// Create a client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL is malformed or not
    /// http(s), and [`ClientError::Http`] if the HTTP client fails to build.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base =
            Url::parse(&config.base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{} is not an http(s) URL",
                config.base_url
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("idcard/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerClient {
                http,
                base,
                token: config.token,
                retry: config.retry,
            }),
        })
    }

    /// The service root.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// Resolve an asset URL as the service hands it out.
    ///
    /// Absolute URLs are kept; `/uploads/...` style paths resolve against the
    /// service origin.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL cannot be resolved.
    pub fn resolve(&self, url: &str) -> ClientResult<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .inner
                .base
                .join(url)
                .map_err(|e| ClientError::InvalidUrl(e.to_string())),
            Err(e) => Err(ClientError::InvalidUrl(e.to_string())),
        }
    }

    /// Whether `url` is served by the same origin as the service.
    #[must_use]
    pub fn is_same_origin(&self, url: &str) -> bool {
        self.resolve(url)
            .is_ok_and(|resolved| resolved.origin() == self.inner.base.origin())
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// List stored templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn list_templates(&self) -> ClientResult<Vec<Template>> {
        let mut templates: Vec<Template> = self.get_json(&["templates"]).await?;
        for template in &mut templates {
            template.normalize();
        }
        debug!(count = templates.len(), "Listed templates");
        Ok(templates)
    }

    /// Fetch one template.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn get_template(&self, id: &str) -> ClientResult<Template> {
        let mut template: Template = self.get_json(&["templates", id]).await?;
        template.normalize();
        Ok(template)
    }

    /// Store a new template and return it with its storage id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if the template has no name, or
    /// [`ClientError::Service`] if storage rejects it.
    #[instrument(skip(self, template), fields(name = %template.name))]
    pub async fn create_template(&self, template: &Template) -> ClientResult<Template> {
        template.validate_for_save()?;
        let url = self.endpoint(&["templates"])?;
        let mut saved: Template = self.send_json(Method::POST, url, template).await?;
        saved.normalize();
        info!(id = ?saved.id, "Created template");
        Ok(saved)
    }

    /// Replace a stored template.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if the template has no name, or
    /// [`ClientError::Service`] if storage rejects it.
    #[instrument(skip(self, template), fields(name = %template.name))]
    pub async fn update_template(&self, id: &str, template: &Template) -> ClientResult<Template> {
        template.validate_for_save()?;
        let url = self.endpoint(&["templates", id])?;
        let mut saved: Template = self.send_json(Method::PUT, url, template).await?;
        saved.normalize();
        info!("Updated template");
        Ok(saved)
    }

    /// Create or update depending on whether the template has a storage id.
    ///
    /// # Errors
    ///
    /// See [`Self::create_template`] and [`Self::update_template`].
    pub async fn save_template(&self, template: &Template) -> ClientResult<Template> {
        match template.id.as_deref() {
            Some(id) => self.update_template(id, template).await,
            None => self.create_template(template).await,
        }
    }

    /// Delete a stored template.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if storage rejects the deletion.
    #[instrument(skip(self))]
    pub async fn delete_template(&self, id: &str) -> ClientResult<()> {
        let url = self.endpoint(&["templates", id])?;
        self.execute(self.request(Method::DELETE, url)).await?;
        info!("Deleted template");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------

    /// List stored student records.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn list_students(&self) -> ClientResult<Vec<Record>> {
        self.get_json(&["students"]).await
    }

    /// Fetch one student record.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn get_student(&self, id: &str) -> ClientResult<Record> {
        self.get_json(&["students", id]).await
    }

    /// Store a new student record.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if storage rejects it.
    #[instrument(skip(self, record))]
    pub async fn create_student(&self, record: &Record) -> ClientResult<Record> {
        let url = self.endpoint(&["students"])?;
        self.send_json(Method::POST, url, record).await
    }

    /// Replace a stored student record.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if storage rejects it.
    #[instrument(skip(self, record))]
    pub async fn update_student(&self, id: &str, record: &Record) -> ClientResult<Record> {
        let url = self.endpoint(&["students", id])?;
        self.send_json(Method::PUT, url, record).await
    }

    /// Delete a stored student record.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if storage rejects the deletion.
    #[instrument(skip(self))]
    pub async fn delete_student(&self, id: &str) -> ClientResult<()> {
        let url = self.endpoint(&["students", id])?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    /// Upload an image file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if the upload is rejected.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<UploadedAsset> {
        let form = Form::new().part("file", file_part(file_name, bytes)?);
        let url = self.endpoint(&["uploads", "image"])?;
        let mut asset: UploadedAsset = self.send_form(url, form).await?;
        if asset.name.is_empty() {
            asset.name = file_name.to_string();
        }
        info!(url = %asset.url, "Uploaded image");
        Ok(asset)
    }

    /// Copy a remote image into storage.
    ///
    /// The service downloads `source` itself; the returned URL is same-origin.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if the copy is rejected.
    #[instrument(skip(self))]
    pub async fn upload_image_from_url(&self, source: &str) -> ClientResult<UploadedAsset> {
        let url = self.endpoint(&["uploads", "image"])?;
        self.send_json(Method::POST, url, &json!({ "file": source }))
            .await
    }

    /// Upload a fill pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Service`] if the upload is rejected.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_pattern(
        &self,
        name: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<UploadedAsset> {
        let form = Form::new()
            .part("file", file_part(file_name, bytes)?)
            .text("name", display_name(name, file_name));
        let url = self.endpoint(&["patterns"])?;
        self.send_form(url, form).await
    }

    /// Upload a custom shape with its outline.
    ///
    /// `points` is a flat `x0,y0,x1,y1,...` list relative to the shape's
    /// center, sent as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if `points` has an odd length, or
    /// [`ClientError::Service`] if the upload is rejected.
    #[instrument(skip(self, bytes, points), fields(size = bytes.len(), vertices = points.len() / 2))]
    pub async fn upload_shape(
        &self,
        name: &str,
        file_name: &str,
        bytes: Vec<u8>,
        points: &[f64],
    ) -> ClientResult<ShapeAsset> {
        if points.len() % 2 != 0 {
            return Err(ClientError::Validation(format!(
                "shape outline needs coordinate pairs, got {} values",
                points.len()
            )));
        }
        let form = Form::new()
            .part("file", file_part(file_name, bytes)?)
            .text("name", display_name(name, file_name))
            .text("points", serde_json::to_string(points)?);
        let url = self.endpoint(&["shapes"])?;
        self.send_form(url, form).await
    }

    /// List uploaded images.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn list_images(&self) -> ClientResult<Vec<UploadedAsset>> {
        self.get_json(&["uploads", "images"]).await
    }

    /// List uploaded fill patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn list_patterns(&self) -> ClientResult<Vec<UploadedAsset>> {
        self.get_json(&["patterns"]).await
    }

    /// List uploaded custom shapes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn list_shapes(&self) -> ClientResult<Vec<ShapeAsset>> {
        self.get_json(&["shapes"]).await
    }

    /// Uploaded shapes as a catalog for mask resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes cannot be listed.
    pub async fn shape_catalog(&self) -> ClientResult<ShapeCatalog> {
        Ok(self.list_shapes().await?.into_iter().collect())
    }

    /// Download the bytes behind an asset URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be resolved or fetched.
    #[instrument(skip(self))]
    pub async fn fetch_bytes(&self, url: &str) -> ClientResult<Vec<u8>> {
        let url = self.resolve(url)?;
        self.get_with_retry(&url).await
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.inner.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.inner.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.inner.http.request(method, url);
        match &self.inner.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Service {
            status: status.as_u16(),
            message: service_message(status, &body),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        let url = self.endpoint(segments)?;
        let bytes = self.get_with_retry(&url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_with_retry(&self, url: &Url) -> ClientResult<Vec<u8>> {
        let config = &self.inner.retry;
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = match self.execute(self.request(Method::GET, url.clone())).await {
                Ok(response) => response
                    .bytes()
                    .await
                    .map(|bytes| bytes.to_vec())
                    .map_err(ClientError::from),
                Err(error) => Err(error),
            };

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(error) if error.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        "GET {} failed (attempt {}/{}), retrying in {}ms: {}",
                        url,
                        attempt + 1,
                        max_attempts,
                        delay,
                        error
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(self.request(method, url).json(body)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_form<T: DeserializeOwned>(&self, url: Url, form: Form) -> ClientResult<T> {
        let response = self
            .execute(self.request(Method::POST, url).multipart(form))
            .await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// The service's `message` field, falling back to the raw body or status.
fn service_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

fn display_name(name: &str, file_name: &str) -> String {
    if name.trim().is_empty() {
        file_name.to_string()
    } else {
        name.to_string()
    }
}

fn file_part(file_name: &str, bytes: Vec<u8>) -> ClientResult<Part> {
    Ok(Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime_for(file_name))?)
}

/// Content type guessed from the file extension.
fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
