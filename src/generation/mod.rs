// Generation module
// Prompt construction and LLM-backed test case / script generation.
// The LLM is an opaque collaborator behind the CompletionClient trait;
// its failures degrade results, they never crash the pipeline.


pub mod client;

pub use client::ChatClient;

use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::RetrievalResult;
use crate::{QagenError, Result};

/// Characters of raw HTML forwarded into script-generation prompts.
const HTML_PROMPT_LIMIT: usize = 2000;
/// HTML shorter than this is treated as absent.
const MIN_USABLE_HTML: usize = 50;

const TEST_GENERATION_SYSTEM: &str =
    "You are a QA testing expert that generates structured test cases.";
const SCRIPT_GENERATION_SYSTEM: &str = "You are a Selenium automation expert that generates \
     executable Python scripts. If HTML is not provided, generate a generic template with \
     placeholder selectors.";

/// One-shot completion collaborator: system instruction plus user prompt in,
/// free-form text out.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// A generated QA test case grounded in retrieved documentation.
///
/// Deserialization is lenient: the model occasionally omits fields, so every
/// field falls back to a default instead of failing the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub test_id: String,
    pub feature: String,
    pub test_scenario: String,
    pub expected_result: String,
    pub grounded_in: Vec<String>,
}

impl Default for TestCase {
    #[inline]
    fn default() -> Self {
        Self {
            test_id: "TC-000".to_string(),
            feature: String::new(),
            test_scenario: String::new(),
            expected_result: String::new(),
            grounded_in: Vec::new(),
        }
    }
}

/// Builds the prompts sent to the completion collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for generating test cases grounded in retrieved chunks.
    #[inline]
    pub fn test_generation_prompt(&self, query: &str, context: &[RetrievalResult]) -> String {
        let context_text = context
            .iter()
            .map(|chunk| format!("Document: {}\n{}", chunk.metadata.filename, chunk.content))
            .join("\n\n");

        format!(
            r#"You are a QA testing expert. Based on the following documentation, generate test cases for the user's query.

DOCUMENTATION:
{context_text}

USER QUERY: {query}

Generate test cases in the following JSON format:
[
  {{
    "test_id": "TC-001",
    "feature": "Feature name",
    "test_scenario": "Detailed test scenario",
    "expected_result": "Expected outcome",
    "grounded_in": ["filename1.md", "filename2.txt"]
  }}
]

Requirements:
- Generate 3-5 relevant test cases
- Each test case must reference source documents in "grounded_in"
- Only use information from the provided documentation
- Be specific and actionable
- Include both positive and negative test scenarios where applicable

Return ONLY the JSON array, no additional text."#
        )
    }

    /// Prompt for generating a Selenium script for one test case.
    #[inline]
    pub fn script_generation_prompt(
        &self,
        test_case: &TestCase,
        html: &str,
        context: &[RetrievalResult],
    ) -> String {
        let context_text = context.iter().map(|chunk| chunk.content.as_str()).join("\n\n");
        let html_excerpt: String = html.chars().take(HTML_PROMPT_LIMIT).collect();

        format!(
            r#"You are a Selenium automation expert. Generate a Python Selenium script for the following test case.

TEST CASE:
- ID: {test_id}
- Feature: {feature}
- Scenario: {scenario}
- Expected Result: {expected}

HTML STRUCTURE:
{html_excerpt}

ADDITIONAL CONTEXT:
{context_text}

Generate a complete, executable Python Selenium script that:
1. Uses correct element selectors from the HTML (prefer By.ID, then By.NAME, then By.CSS_SELECTOR)
2. Includes all necessary imports
3. Sets up the WebDriver
4. Implements the test scenario
5. Includes assertions for the expected result
6. Has proper error handling
7. Closes the driver at the end

Return ONLY the Python code, no markdown formatting or explanations."#,
            test_id = test_case.test_id,
            feature = test_case.feature,
            scenario = test_case.test_scenario,
            expected = test_case.expected_result,
        )
    }
}

/// Generates grounded test cases for a query, degrading to an empty list on
/// any collaborator or parse failure.
pub struct TestCaseGenerator {
    client: Arc<dyn CompletionClient>,
    prompts: PromptBuilder,
}

impl TestCaseGenerator {
    #[inline]
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            prompts: PromptBuilder,
        }
    }

    /// Generate test cases grounded in `context`. Empty context or any
    /// generation failure yields an empty list, never an error.
    #[inline]
    pub fn generate(&self, query: &str, context: &[RetrievalResult]) -> Vec<TestCase> {
        if context.is_empty() {
            debug!("No context retrieved for query, skipping generation");
            return Vec::new();
        }

        match self.try_generate(query, context) {
            Ok(cases) => cases,
            Err(e) => {
                warn!("Test case generation degraded to empty result: {}", e);
                Vec::new()
            }
        }
    }

    fn try_generate(&self, query: &str, context: &[RetrievalResult]) -> Result<Vec<TestCase>> {
        let prompt = self.prompts.test_generation_prompt(query, context);
        let raw = self.client.complete(TEST_GENERATION_SYSTEM, &prompt)?;
        parse_test_cases(&raw)
    }
}

/// Generates a browser-automation script for one test case.
pub struct ScriptGenerator {
    client: Arc<dyn CompletionClient>,
    prompts: PromptBuilder,
}

impl ScriptGenerator {
    #[inline]
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            prompts: PromptBuilder,
        }
    }

    /// Generate an executable script. Unlike test case generation this
    /// surfaces failures to the caller, since there is no useful degraded
    /// form of a script.
    #[inline]
    pub fn generate(
        &self,
        test_case: &TestCase,
        html: &str,
        context: &[RetrievalResult],
    ) -> Result<String> {
        let usable_html = if html.trim().len() >= MIN_USABLE_HTML {
            html
        } else {
            ""
        };

        let prompt = self
            .prompts
            .script_generation_prompt(test_case, usable_html, context);
        let raw = self.client.complete(SCRIPT_GENERATION_SYSTEM, &prompt)?;

        Ok(strip_code_fence(&raw))
    }
}

/// Parse the collaborator's answer into test cases, tolerating a fenced
/// code block around the JSON array.
#[inline]
pub fn parse_test_cases(raw: &str) -> Result<Vec<TestCase>> {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(&cleaned)
        .map_err(|e| QagenError::Generation(format!("failed to parse test cases: {e}")))
}

/// Remove a surrounding markdown code fence, including any language tag on
/// the opening fence.
fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines
        .last()
        .is_some_and(|line| line.trim_start().starts_with("```"))
    {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}
