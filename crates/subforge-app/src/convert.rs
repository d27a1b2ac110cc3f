//! Offline conversion of subscription files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use subforge_core::{convert_batch, extract, synthesize, Configuration, Outbound, Template};
use subforge_server::DEFAULT_TEMPLATE;

/// Reads the template at `path`, or the bundled one.
pub fn load_template(path: Option<&Path>) -> anyhow::Result<Template> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };
    Template::from_json(&text).context("invalid template")
}

/// Converts one subscription body; unreadable sources give an empty batch.
fn convert_file(path: &Path) -> Vec<Outbound> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "cannot read source");
            return Vec::new();
        }
    };
    match extract(&body) {
        Ok(extracted) => {
            let outbounds = convert_batch(extracted.records);
            info!(file = %path.display(), nodes = outbounds.len(), "source converted");
            outbounds
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "source not recognised");
            Vec::new()
        }
    }
}

/// Builds a configuration from local subscription files, one source per file.
pub fn convert_files(
    template: Template,
    files: &[PathBuf],
    split: bool,
) -> Configuration {
    let batches = files.iter().map(|f| convert_file(f)).collect();
    synthesize(template, batches, split)
}
