//! Scanned link model
//!
//! Links arrive from an external discovery process; this crate only checks them.

use serde::{Deserialize, Serialize};

/// File extensions treated as downloadable documents.
const DOWNLOAD_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "csv", "txt",
];

// == Link Kind ==
/// What sort of target a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Internal,
    External,
    Download,
    Anchor,
}

impl LinkKind {
    /// Local kinds are checked against the route table or filesystem.
    pub fn is_local(self) -> bool {
        !matches!(self, LinkKind::External)
    }

    /// Guesses the kind of a bare URL.
    ///
    /// Absolute URLs under `site_origin` count as same-site.
    pub fn infer(url: &str, site_origin: Option<&str>) -> Self {
        if url.starts_with('#') {
            return LinkKind::Anchor;
        }

        let path = match url::Url::parse(url) {
            Ok(parsed) => {
                let same_site = site_origin
                    .and_then(|origin| url::Url::parse(origin).ok())
                    .map(|origin| origin.origin() == parsed.origin())
                    .unwrap_or(false);
                if !same_site {
                    return LinkKind::External;
                }
                parsed.path().to_string()
            }
            // Relative URL
            Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
        };

        let is_download = path
            .rsplit_once('.')
            .map(|(_, ext)| DOWNLOAD_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if is_download {
            LinkKind::Download
        } else {
            LinkKind::Internal
        }
    }
}

// == Link Priority ==
/// Audit priority of a link; declared from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl LinkPriority {
    /// Lower rank is more urgent.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Critical and high links are validated before everything else.
    pub fn is_urgent(self) -> bool {
        matches!(self, LinkPriority::Critical | LinkPriority::High)
    }
}

impl Default for LinkPriority {
    fn default() -> Self {
        LinkPriority::Medium
    }
}

// == Scanned Link ==
/// A link found somewhere on the site, waiting to be validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedLink {
    pub url: String,
    /// Page or file the link was found on
    #[serde(default)]
    pub source_location: String,
    pub link_kind: LinkKind,
    #[serde(default)]
    pub priority: LinkPriority,
    /// Free-text surrounding context (anchor text, section title)
    #[serde(default)]
    pub context: String,
}

impl ScannedLink {
    pub fn new(url: impl Into<String>, link_kind: LinkKind, priority: LinkPriority) -> Self {
        Self {
            url: url.into(),
            source_location: String::new(),
            link_kind,
            priority,
            context: String::new(),
        }
    }

    /// Builds a link from a bare URL, inferring its kind.
    pub fn from_url(url: impl Into<String>, site_origin: Option<&str>) -> Self {
        let url = url.into();
        let link_kind = LinkKind::infer(&url, site_origin);
        Self::new(url, link_kind, LinkPriority::default())
    }

    pub fn with_source(mut self, source_location: impl Into<String>) -> Self {
        self.source_location = source_location.into();
        self
    }
}
