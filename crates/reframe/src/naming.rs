//! Optional naming and caption collaborator.
//!
//! Suggestions are cosmetic. The engine swallows every failure here and falls
//! back to the original file stem and no caption.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CaptionBundle;

/// Longest label kept in an output file name.
const MAX_LABEL_LENGTH: usize = 48;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("Naming service unavailable: {0}")]
    Unavailable(String),

    #[error("Naming service returned an unusable suggestion: {0}")]
    InvalidSuggestion(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamingSuggestion {
    pub name: Option<String>,
    pub caption: Option<CaptionBundle>,
}

#[async_trait]
pub trait NamingService: Send + Sync {
    /// Describes the image at `path`. `want_caption` asks for a caption bundle too.
    async fn suggest(
        &self,
        path: &Path,
        want_caption: bool,
    ) -> Result<NamingSuggestion, NamingError>;
}

/// Turns a free-text suggestion into a file-name safe label.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_label(raw: &str) -> Option<String> {
    let mut label = String::with_capacity(raw.len());
    let mut last_dash = true;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            label.push('-');
            last_dash = true;
        }
        if label.len() >= MAX_LABEL_LENGTH {
            break;
        }
    }

    let label = label.trim_end_matches('-').to_string();
    (!label.is_empty()).then_some(label)
}
