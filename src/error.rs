use thiserror::Error;

/// Errors raised by the site controllers.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to load {path}: {reason}")]
    ContentLoad { path: String, reason: String },

    #[error("Rich-text engine is not available")]
    RendererUnavailable,

    #[error("Unknown page id: {0}")]
    UnknownPageId(String),

    #[error("No filterable section on page '{page}'")]
    FilterContextMissing { page: String },

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SiteError {
    /// Build a load error for a source path.
    pub fn load(path: impl Into<String>, reason: impl ToString) -> Self {
        SiteError::ContentLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            SiteError::ContentLoad { reason, .. } => {
                format!("The article could not be loaded ({}).", reason)
            }
            SiteError::RendererUnavailable => {
                "The article renderer is not available right now.".to_string()
            }
            SiteError::UnknownPageId(id) => format!("There is no page called '{}'", id),
            SiteError::FilterContextMissing { page } => {
                format!("Nothing to filter on the '{}' page", page)
            }
            SiteError::UnknownSection(id) => format!("There is no section called '{}'", id),
            SiteError::Config(msg) => format!("Configuration error: {}", msg),
            SiteError::Io(e) => format!("File system error: {}", e),
            SiteError::Json(e) => format!("Data format error: {}", e),
            SiteError::Toml(e) => format!("Config file error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_message() {
        let error = SiteError::load("blog/ring_buffer.md", "HTTP 404 Not Found");
        assert_eq!(
            error.to_string(),
            "Failed to load blog/ring_buffer.md: HTTP 404 Not Found"
        );
        assert!(error.user_message().contains("HTTP 404"));
    }

    #[test]
    fn test_filter_context_message() {
        let error = SiteError::FilterContextMissing {
            page: "about".to_string(),
        };
        assert!(error.user_message().contains("about"));
    }
}
