//! Module and synthesis prompts.

use std::collections::BTreeMap;
use std::path::Path;

use verdict_core::enums::ModuleKind;

use crate::error::PipelineError;

/// File holding the synthesis prompt inside a prompt directory.
pub const SYNTHESIS_FILE: &str = "synthesis.md";

/// The four module prompts plus the synthesis prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    modules: BTreeMap<ModuleKind, String>,
    synthesis: String,
}

impl PromptSet {
    /// # Errors
    ///
    /// Returns `PipelineError::MissingPrompt` if a module prompt or the
    /// synthesis prompt is missing or blank.
    pub fn new(
        modules: BTreeMap<ModuleKind, String>,
        synthesis: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        for module in ModuleKind::ALL {
            if modules.get(&module).is_none_or(|p| p.trim().is_empty()) {
                return Err(PipelineError::MissingPrompt {
                    name: module.to_string(),
                });
            }
        }
        let synthesis = synthesis.into();
        if synthesis.trim().is_empty() {
            return Err(PipelineError::MissingPrompt {
                name: "synthesis".to_string(),
            });
        }
        Ok(Self { modules, synthesis })
    }

    /// Load `10-1.md` .. `10-4.md` and `synthesis.md` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Prompt` if a file cannot be read and
    /// `PipelineError::MissingPrompt` if one is blank.
    pub fn load_dir(dir: &Path) -> Result<Self, PipelineError> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| PipelineError::Prompt { path, source })
        };
        let mut modules = BTreeMap::new();
        for module in ModuleKind::ALL {
            modules.insert(module, read(&format!("{module}.md"))?);
        }
        Self::new(modules, read(SYNTHESIS_FILE)?)
    }

    #[must_use]
    pub fn module(&self, module: ModuleKind) -> &str {
        self.modules.get(&module).map_or("", String::as_str)
    }

    #[must_use]
    pub fn synthesis(&self) -> &str {
        &self.synthesis
    }
}
