use anyhow::{Result, anyhow};
use std::fs;
use std::path::Path;

/// Background text the persona is grounded in. Loaded once at startup and
/// shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingCorpus {
    pub persona_name: String,
    pub summary_text: String,
    pub profile_text: String,
}

impl GroundingCorpus {
    pub fn load(persona_name: &str, summary_path: &Path, profile_path: &Path) -> Result<Self> {
        let summary_text = fs::read_to_string(summary_path).map_err(|err| {
            anyhow!(
                "Failed to load summary {}: unable to read file: {err}",
                summary_path.display()
            )
        })?;
        let profile_text = load_profile(profile_path)?;

        tracing::info!(
            summary = %summary_path.display(),
            profile = %profile_path.display(),
            summary_chars = summary_text.chars().count(),
            profile_chars = profile_text.chars().count(),
            "grounding corpus loaded"
        );

        Ok(Self {
            persona_name: persona_name.to_string(),
            summary_text,
            profile_text,
        })
    }
}

fn load_profile(path: &Path) -> Result<String> {
    if !is_pdf(path) {
        return fs::read_to_string(path).map_err(|err| {
            anyhow!(
                "Failed to load profile {}: unable to read file: {err}",
                path.display()
            )
        });
    }

    let bytes = fs::read(path).map_err(|err| {
        anyhow!(
            "Failed to load profile {}: unable to read file: {err}",
            path.display()
        )
    })?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|err| {
        anyhow!(
            "Failed to load profile {}: unable to extract PDF text: {err}",
            path.display()
        )
    })
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
