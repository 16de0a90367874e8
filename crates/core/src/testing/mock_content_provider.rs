//! Mock content provider for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::content::{ContentError, ContentProvider, ContentRecord, ContentRequest};

/// Mock implementation of the ContentProvider trait.
///
/// Returns `request.count` generated records unless records were set
/// explicitly or the next call is set to fail.
#[derive(Debug, Default)]
pub struct MockContentProvider {
    records: Arc<RwLock<Option<Vec<ContentRecord>>>>,
    next_error: Arc<RwLock<Option<ContentError>>>,
    requests: Arc<RwLock<Vec<ContentRequest>>>,
}

impl MockContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return exactly these records from now on.
    pub async fn set_records(&self, records: Vec<ContentRecord>) {
        *self.records.write().await = Some(records);
    }

    pub async fn set_next_error(&self, error: ContentError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn requests(&self) -> Vec<ContentRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl ContentProvider for MockContentProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ContentRequest) -> Result<Vec<ContentRecord>, ContentError> {
        self.requests.write().await.push(request.clone());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(records) = self.records.read().await.clone() {
            return Ok(records);
        }

        Ok((1..=request.count)
            .map(|n| super::fixtures::content_record_without_id(&format!("{} #{}", request.idea, n)))
            .collect())
    }
}
