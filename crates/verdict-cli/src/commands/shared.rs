use std::path::Path;

use anyhow::Context;
use verdict_core::enums::ModuleKind;
use verdict_report::{Partials, SubjectMeta};

use crate::cli::root_commands::SubjectArgs;

pub fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read `<dir>/10-1.md` .. `<dir>/10-4.md`. Missing files are skipped.
pub fn load_partials(dir: &Path) -> anyhow::Result<Partials> {
    if !dir.is_dir() {
        anyhow::bail!("partials directory '{}' does not exist", dir.display());
    }
    let mut partials = Partials::new();
    for module in ModuleKind::ALL {
        let path = dir.join(format!("{module}.md"));
        if path.exists() {
            partials.insert(module, read_text(&path)?);
        } else {
            tracing::warn!(module = %module, path = %path.display(), "module output missing");
        }
    }
    Ok(partials)
}

impl SubjectArgs {
    pub fn meta(&self) -> SubjectMeta {
        let mut meta = SubjectMeta {
            subject_id: self.subject.clone(),
            comment_count: None,
        };
        if let Some(count) = self.comments {
            meta = meta.with_comment_count(count);
        }
        meta
    }

    pub fn partials(&self) -> anyhow::Result<Option<Partials>> {
        self.partials.as_deref().map(load_partials).transpose()
    }
}
