//! Exporting a produced video together with its text sidecar.

use bytes::Bytes;

use super::types::{ItemError, WorkItem};

/// Characters that are not allowed in exported file names.
const UNSAFE_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// A finished video ready to hand out, plus its notes file.
#[derive(Debug, Clone)]
pub struct ArtifactExport {
    pub file_name: String,
    pub data: Bytes,
    pub notes_file_name: String,
    pub notes: String,
}

impl ArtifactExport {
    /// Build the export for a completed item.
    pub fn from_item(item: &WorkItem) -> Result<Self, ItemError> {
        let artifact = item
            .state
            .artifact
            .as_ref()
            .filter(|_| item.is_publishable())
            .ok_or_else(|| ItemError::NoArtifact(item.id().to_string()))?;

        let stem = file_stem(&item.content.title);
        Ok(Self {
            file_name: format!("{}.mp4", stem),
            data: artifact.data(),
            notes_file_name: format!("{}_notes.txt", stem),
            notes: notes(item),
        })
    }
}

/// File name stem derived from a title.
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if stem.is_empty() {
        "video".to_string()
    } else {
        stem
    }
}

fn notes(item: &WorkItem) -> String {
    let content = &item.content;
    format!(
        "Title: {}\n\nConcept: {}\n\nDescription: {}\n\nTags: {}\n\nPrompt: {}\n",
        content.title,
        content.concept,
        content.description,
        content.tags.join(", "),
        content.prompt()
    )
}
