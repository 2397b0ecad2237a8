// Document extraction module
// Maps files on disk to the text and metadata the ingestion pipeline consumes

#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{QagenError, Result};

/// Source document format. Extraction quality for formats that need an
/// external converter (PDF/OCR) is out of scope; the type still exists so
/// externally-extracted text keeps its provenance in chunk metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Text,
    Pdf,
    Json,
    Html,
}

impl DocType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Detect the document type from a file extension.
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md") {
            Some(Self::Text)
        } else if ext.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") {
            Some(Self::Html)
        } else {
            None
        }
    }
}

impl FromStr for DocType {
    type Err = QagenError;

    #[inline]
    fn from_str(value: &str) -> Result<Self> {
        match value {
            "text" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            _ => Err(QagenError::Extraction(format!(
                "unknown document type: {value}"
            ))),
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One addressable element found in an HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub tag: String,
    pub value: String,
    /// The element's `type` attribute, empty when absent.
    #[serde(default)]
    pub input_type: String,
}

/// Inventory of addressable elements in an HTML document, grouped by how a
/// browser-automation script would locate them (id, then name, then class).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelectors {
    pub ids: Vec<SelectorEntry>,
    pub names: Vec<SelectorEntry>,
    pub classes: Vec<SelectorEntry>,
}

impl PageSelectors {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty() && self.classes.is_empty()
    }
}

/// A document ready for chunking: extracted text plus source identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub filename: String,
    pub doc_type: DocType,
    pub text: String,
    /// Present only for HTML sources.
    pub selectors: Option<PageSelectors>,
}

/// Extract a single file into pipeline-ready form.
#[inline]
pub fn extract_file(path: &Path) -> Result<ExtractedDocument> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| QagenError::Extraction(format!("not a file path: {}", path.display())))?;

    let doc_type = DocType::from_path(path).ok_or_else(|| {
        QagenError::Extraction(format!("unsupported file type: {}", path.display()))
    })?;

    let document = match doc_type {
        DocType::Text => ExtractedDocument {
            filename,
            doc_type,
            text: fs::read_to_string(path)?,
            selectors: None,
        },
        DocType::Json => ExtractedDocument {
            filename,
            doc_type,
            text: extract_json(&fs::read_to_string(path)?)?,
            selectors: None,
        },
        DocType::Html => {
            let (text, selectors) = extract_html(&fs::read_to_string(path)?);
            ExtractedDocument {
                filename,
                doc_type,
                text,
                selectors: Some(selectors),
            }
        }
        DocType::Pdf => {
            return Err(QagenError::Extraction(format!(
                "PDF text extraction is delegated to an external converter; \
                 convert {} to .txt before ingesting",
                path.display()
            )));
        }
    };

    debug!(
        "Extracted {} ({}): {} chars",
        document.filename,
        document.doc_type,
        document.text.len()
    );

    Ok(document)
}

/// Extract whitespace-normalized text and the selector inventory from HTML.
#[inline]
pub fn extract_html(html: &str) -> (String, PageSelectors) {
    let document = Html::parse_document(html);

    let text = document
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .join(" ");

    let every_element = Selector::parse("*").expect("static selector is valid");
    let mut selectors = PageSelectors::default();

    for element in document.select(&every_element) {
        let value = element.value();
        let tag = value.name().to_string();
        let input_type = value.attr("type").unwrap_or_default().to_string();

        if let Some(id) = value.attr("id") {
            selectors.ids.push(SelectorEntry {
                tag: tag.clone(),
                value: id.to_string(),
                input_type: input_type.clone(),
            });
        }
        if let Some(name) = value.attr("name") {
            selectors.names.push(SelectorEntry {
                tag: tag.clone(),
                value: name.to_string(),
                input_type: input_type.clone(),
            });
        }
        if let Some(class) = value.attr("class") {
            selectors.classes.push(SelectorEntry {
                tag,
                value: class.split_whitespace().join(" "),
                input_type: String::new(),
            });
        }
    }

    (text, selectors)
}

/// Validate JSON and re-serialize it pretty-printed so nested values keep a
/// readable line structure for chunking.
#[inline]
pub fn extract_json(raw: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| QagenError::Extraction(format!("invalid JSON document: {e}")))?;

    serde_json::to_string_pretty(&value)
        .map_err(|e| QagenError::Extraction(format!("failed to render JSON document: {e}")))
}
