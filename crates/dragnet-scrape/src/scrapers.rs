use crate::fetch::{SCRAPE_SUFFIX, fetch_into_file, md5_hex, required_url, scratch_error};
use async_trait::async_trait;
use dragnet_core::{Context, ExecOutcome, Executor, StepError};
use dragnet_journal::StatusData;
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_SCRAPER_NAME: &str = "scraper";

const FILE_URL_PREFIX: &str = "file://";

/// Fetches `params.url` and stores the raw body at `<key>.scrape`.
/// GET by default; POST with a JSON body when `params.post_payload` is
/// present. Journals size, body digest, and response headers.
pub struct Scraper {
    name: String,
}

impl Scraper {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_SCRAPER_NAME.to_string(),
        }
    }

    /// Scrapers that keep their output under a different journal key.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for Scraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for Scraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: &Context,
        key: &str,
        status: &StatusData,
    ) -> Result<ExecOutcome, StepError> {
        let url = required_url(key, status)?;
        let file_path = ctx.scratch_path(key, SCRAPE_SUFFIX);
        let patch = fetch_into_file(ctx, &url, status, &file_path).await?;
        Ok(ExecOutcome::new(patch))
    }
}

/// Byte-level acceptance check applied to a scraped body; an `Err`
/// message rejects the scrape.
pub type BodyValidator = Arc<dyn Fn(&[u8]) -> Result<(), String> + Send + Sync>;

/// A `Scraper` whose output must pass a caller-supplied validation
/// callback. On rejection the scratch file is removed and the step
/// fails recoverably, so the next run fetches again.
pub struct ValidatedScraper {
    name: String,
    validator: BodyValidator,
}

impl ValidatedScraper {
    pub fn new(validator: BodyValidator) -> Self {
        Self {
            name: DEFAULT_SCRAPER_NAME.to_string(),
            validator,
        }
    }

    pub fn with_name(name: impl Into<String>, validator: BodyValidator) -> Self {
        Self {
            name: name.into(),
            validator,
        }
    }
}

#[async_trait]
impl Executor for ValidatedScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: &Context,
        key: &str,
        status: &StatusData,
    ) -> Result<ExecOutcome, StepError> {
        let url = required_url(key, status)?;
        let file_path = ctx.scratch_path(key, SCRAPE_SUFFIX);
        let patch = fetch_into_file(ctx, &url, status, &file_path).await?;

        let body = tokio::fs::read(&file_path)
            .await
            .map_err(|e| scratch_error(&file_path, e))?;
        if let Err(reason) = (self.validator)(&body) {
            if let Err(remove_error) = tokio::fs::remove_file(&file_path).await {
                tracing::warn!(path = %file_path.display(), "failed to remove rejected scrape: {remove_error}");
            }
            return Err(StepError::Runtime(reason));
        }
        Ok(ExecOutcome::new(patch))
    }
}

/// Like `Scraper`, but `file://` urls are read straight from disk: the
/// body is copied to `<key>.scrape` and journaled with its size and
/// digest, no response headers.
pub struct LocalOrHttpScraper {
    name: String,
}

impl LocalOrHttpScraper {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_SCRAPER_NAME.to_string(),
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LocalOrHttpScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalOrHttpScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: &Context,
        key: &str,
        status: &StatusData,
    ) -> Result<ExecOutcome, StepError> {
        let url = required_url(key, status)?;
        let file_path = ctx.scratch_path(key, SCRAPE_SUFFIX);

        let Some(local_path) = url.strip_prefix(FILE_URL_PREFIX) else {
            let patch = fetch_into_file(ctx, &url, status, &file_path).await?;
            return Ok(ExecOutcome::new(patch));
        };

        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| scratch_error(std::path::Path::new(local_path), e))?;
        tokio::fs::write(&file_path, &body)
            .await
            .map_err(|e| scratch_error(&file_path, e))?;
        let patch: Value = json!({
            "size": body.len(),
            "content": md5_hex(&body),
        });
        Ok(ExecOutcome::new(patch))
    }
}
