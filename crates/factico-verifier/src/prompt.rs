//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`
//! directory) so operators can tune extraction and verification prompts
//! without recompiling. Each call site renders a `(system, user)` pair
//! from a JSON context.

use minijinja::Environment;

use crate::error::VerifierError;

/// Template files the engine loads at startup.
const TEMPLATE_NAMES: [&str; 12] = [
    "extract_system.j2",
    "extract_user.j2",
    "subagent_system.j2",
    "subagent_source_credibility.j2",
    "subagent_historical_context.j2",
    "subagent_logical_consistency.j2",
    "subagent_evidence_analysis.j2",
    "classifier_system.j2",
    "classify_entities.j2",
    "classify_topics.j2",
    "market_system.j2",
    "market_assess.j2",
];

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with all pipeline templates
/// pre-loaded. Templates can be edited on disk and are picked up on the
/// next call to [`PromptEngine::new`].
pub struct PromptEngine {
    env: Environment<'static>,
}

/// A rendered `(system, user)` prompt pair.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the task.
    pub system: String,
    /// User message with the material to analyze.
    pub user: String,
}

impl PromptEngine {
    /// Create a new prompt engine loading all templates from `templates_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Template`] if any template file is missing
    /// or fails to parse.
    pub fn new(templates_dir: &str) -> Result<Self, VerifierError> {
        let mut env = Environment::new();

        for name in TEMPLATE_NAMES {
            let path = format!("{templates_dir}/{name}");
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| VerifierError::Template(format!("failed to read {path}: {e}")))?;
            env.add_template_owned(name.to_owned(), contents)
                .map_err(|e| {
                    VerifierError::Template(format!("failed to add template {name}: {e}"))
                })?;
        }

        Ok(Self { env })
    }

    /// Render a single template against a JSON context.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Template`] when the template is missing or
    /// rendering fails.
    pub fn render(
        &self,
        name: &str,
        context: &serde_json::Value,
    ) -> Result<String, VerifierError> {
        self.env
            .get_template(name)
            .map_err(|e| VerifierError::Template(format!("missing template {name}: {e}")))?
            .render(context)
            .map_err(|e| VerifierError::Template(format!("{name} render failed: {e}")))
    }

    /// Render a `(system, user)` pair from two templates sharing a context.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Template`] when either render fails.
    pub fn render_pair(
        &self,
        system_name: &str,
        user_name: &str,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, VerifierError> {
        Ok(RenderedPrompt {
            system: self.render(system_name, context)?,
            user: self.render(user_name, context)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_templates(dir: &std::path::Path) {
        for name in TEMPLATE_NAMES {
            std::fs::write(
                dir.join(name),
                "claim: {{ claim_text }} evidence: {{ evidence | length }}",
            )
            .ok();
        }
    }

    #[test]
    fn template_loading_and_rendering() {
        let unique = format!(
            "factico_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        write_test_templates(&dir);

        let engine = PromptEngine::new(dir.to_str().unwrap_or(""));
        assert!(engine.is_ok(), "PromptEngine::new should succeed");

        if let Ok(engine) = engine {
            let context = serde_json::json!({
                "claim_text": "La tasa subió a 11.00%",
                "evidence": [],
            });
            let rendered = engine
                .render("extract_user.j2", &context)
                .unwrap_or_default();
            assert!(rendered.contains("11.00%"));
            assert!(rendered.contains("evidence: 0"));
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_directory_fails() {
        let engine = PromptEngine::new("/nonexistent/factico/templates");
        assert!(engine.is_err());
    }
}
