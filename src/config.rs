// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use crate::merge::{MergeOptions, Metadata};
use anyhow::{Context, Result};
use indexmap::IndexSet;
use serde::Deserialize;
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

// Represents the whole file, every setting lives under `[config]`.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    pub config: Config,
}

/// Settings for one merge. Read from a TOML file and/or the command line,
/// command line values win.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// PDF files or glob patterns, merged in the order given.
    pub inputs: Vec<String>,
    /// The merged PDF file
    pub output_pdf: PathBuf,
    /// The URL each input was published at, in input order.
    pub urls: Vec<String>,
    /// Prefix of the links to rewrite, e.g. `http://localhost:5173`.
    pub base_url: String,
    /// Fail when a link to the site could not be remapped.
    pub strict: bool,
    pub metadata: Metadata,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            inputs: vec![],
            output_pdf: PathBuf::from("merged-pdf.pdf"),
            urls: vec![],
            base_url: String::new(),
            strict: false,
            metadata: Metadata::default(),
        }
    }
}

fn in_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

impl Config {
    /// Loads the TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let file = toml::from_str::<ConfigFile>(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(file.config)
    }

    /// Expands `inputs` into the PDF files to merge. Patterns are expanded in
    /// order, anything under `node_modules` or without a `.pdf` extension is
    /// skipped and files matched twice are kept at their first position.
    pub fn input_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = IndexSet::new();
        for pattern in &self.inputs {
            let entries =
                glob::glob(pattern).with_context(|| format!("Invalid input pattern {pattern}"))?;
            for entry in entries {
                let path = entry.with_context(|| format!("Unable to read a match of {pattern}"))?;
                if in_node_modules(&path) || !is_pdf(&path) || !path.is_file() {
                    log::debug!("Skipping {}", path.display());
                    continue;
                }
                paths.insert(path);
            }
        }
        Ok(paths.into_iter().collect())
    }

    /// `output_pdf` with a `.pdf` extension.
    pub fn output_path(&self) -> PathBuf {
        if is_pdf(&self.output_pdf) {
            self.output_pdf.clone()
        } else {
            let mut path = self.output_pdf.clone().into_os_string();
            path.push(".pdf");
            PathBuf::from(path)
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            urls: self.urls.clone(),
            base_url: self.base_url.clone(),
            metadata: self.metadata.clone(),
            timestamp: None,
        }
    }
}
