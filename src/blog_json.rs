//! Export markdown articles as JSON records for static hosting.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use wildmatch::WildMatch;

use crate::error::SiteError;
use crate::frontmatter;

pub const DEFAULT_PATTERN: &str = "*.md";

/// One exported article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogRecord {
    pub title: String,
    pub date: String,
    pub category: String,
    pub description: String,
    #[serde(rename = "readTime")]
    pub read_time: String,
    pub content: String,
    pub source_file: String,
    pub generated_at: String,
}

impl BlogRecord {
    /// Build a record from the raw text of a markdown file.
    pub fn from_markdown(text: &str, source_file: &str, generated_at: DateTime<Utc>) -> Self {
        let parsed = frontmatter::parse(text);
        let field = |key: &str, default: &str| parsed.get(key).unwrap_or(default).to_string();
        let content = if parsed.has_block {
            parsed.body.trim()
        } else {
            parsed.body
        };

        Self {
            title: field("title", "Untitled"),
            date: field("date", ""),
            category: field("category", "Uncategorized"),
            description: field("description", ""),
            read_time: field("readTime", ""),
            content: content.to_string(),
            source_file: source_file.to_string(),
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Summary of an export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub total: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl ExportReport {
    pub fn converted(&self) -> usize {
        self.written.len()
    }
}

/// Convert one markdown file, writing a sibling `.json`.
pub fn convert_file(path: &Path, generated_at: DateTime<Utc>) -> Result<PathBuf, SiteError> {
    let text = std::fs::read_to_string(path)?;
    let record = BlogRecord::from_markdown(&text, &path.display().to_string(), generated_at);
    let out = path.with_extension("json");
    let json = serde_json::to_string_pretty(&record)?;
    std::fs::write(&out, json)?;
    Ok(out)
}

/// Files directly inside `dir` whose name matches `pattern`, sorted by name.
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, SiteError> {
    let matcher = WildMatch::new(pattern);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if matcher.matches(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Convert every matching file in `dir`. A file that fails is recorded in
/// the report and the run carries on.
pub fn export_dir(dir: &Path, pattern: &str, show_progress: bool) -> Result<ExportReport, SiteError> {
    if !dir.is_dir() {
        return Err(SiteError::Config(format!(
            "blog directory not found: {}",
            dir.display()
        )));
    }
    let files = matching_files(dir, pattern)?;
    let generated_at = Utc::now();

    let pb = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| SiteError::Config(e.to_string()))?
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut report = ExportReport {
        total: files.len(),
        ..ExportReport::default()
    };
    for path in files {
        pb.set_message(path.display().to_string());
        match convert_file(&path, generated_at) {
            Ok(out) => {
                info!("Created {}", out.display());
                report.written.push(out);
            }
            Err(e) => {
                warn!("Error converting {}: {}", path.display(), e);
                report.failures.push((path, e.user_message()));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Conversion complete");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_record_from_metadata_block() {
        let text = "---\ntitle: Ring Buffers\ndate: 2025-03-01\ncategory: Systems\nreadTime: 9 min\n---\n\n# Body\n\n";
        let record = BlogRecord::from_markdown(text, "blog/ring_buffer.md", at());
        assert_eq!(record.title, "Ring Buffers");
        assert_eq!(record.date, "2025-03-01");
        assert_eq!(record.category, "Systems");
        assert_eq!(record.read_time, "9 min");
        assert_eq!(record.description, "");
        assert_eq!(record.content, "# Body");
        assert_eq!(record.generated_at, "2025-03-01T12:00:00Z");
    }

    #[test]
    fn test_record_defaults_without_block() {
        let record = BlogRecord::from_markdown("# Just text\n", "a.md", at());
        assert_eq!(record.title, "Untitled");
        assert_eq!(record.category, "Uncategorized");
        assert_eq!(record.content, "# Just text\n");
    }

    #[test]
    fn test_json_field_names() {
        let record = BlogRecord::from_markdown("x", "a.md", at());
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "title",
            "date",
            "category",
            "description",
            "readTime",
            "content",
            "source_file",
            "generated_at",
        ] {
            assert!(object.contains_key(key), "missing {}", key);
        }
        assert_eq!(object.len(), 8);
    }

    #[test]
    fn test_export_dir_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "---\ntitle: A\n---\nbody").unwrap();
        std::fs::write(dir.path().join("b.md"), "plain").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        // Not valid UTF-8, so reading it fails.
        std::fs::write(dir.path().join("c.md"), [0xff, 0xfe, 0x00]).unwrap();

        let report = export_dir(dir.path(), DEFAULT_PATTERN, false).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.converted(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].0.ends_with("c.md"));

        let json = std::fs::read_to_string(dir.path().join("a.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "A");
        assert_eq!(value["content"], "body");
        assert!(!dir.path().join("notes.json").exists());
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export_dir(&dir.path().join("blog"), DEFAULT_PATTERN, false).is_err());
    }
}
