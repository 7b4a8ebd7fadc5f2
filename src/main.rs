// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_link_merge::{merge_pdfs, validate, Config, Diagnostic};
use std::{fs, path::PathBuf, process::ExitCode};

/// A program to merge PDFs of a web site into a single PDF, remapping links
/// between the pages to links inside the PDF
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF files or glob patterns, merged in the order given
    entries: Vec<String>,
    /// The merged PDF file, `.pdf` is appended when missing
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// The URL each PDF was rendered from, in the same order as the PDFs
    #[arg(short, long, num_args = 1..)]
    urls: Vec<String>,
    /// Only links starting with this URL are remapped
    #[arg(short, long)]
    base_url: Option<String>,
    /// Configuration File
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Fail when a link could not be remapped
    #[arg(long)]
    strict: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if !self.entries.is_empty() {
            config.inputs = self.entries;
        }
        if let Some(output) = self.output {
            config.output_pdf = output;
        }
        if !self.urls.is_empty() {
            config.urls = self.urls;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        config.strict |= self.strict;
        Ok(config)
    }
}

fn print_problems<'a>(title: &str, problems: impl Iterator<Item = &'a Diagnostic>) -> bool {
    let lines: Vec<String> = problems.map(|p| format!("  * {p}")).collect();
    if lines.is_empty() {
        return false;
    }
    println!("{title}\n{}", lines.join("\n"));
    true
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    let paths = config.input_paths()?;
    validate(paths.len(), &config.urls)?;

    let pb = ProgressBar::new(paths.len() as u64);
    let mut inputs = Vec::with_capacity(paths.len());
    for path in &paths {
        pb.set_style(ProgressStyle::with_template(&format!(
            "{{bar:.cyan}} {{pos}}/{{len}} reading {}",
            path.display()
        ))?);
        inputs.push(fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let output = merge_pdfs(&inputs, &config.merge_options())?;

    let output_path = config.output_path();
    fs::write(&output_path, &output.pdf)
        .with_context(|| format!("Unable to write {}", output_path.display()))?;
    println!(
        "Merged PDF ({} pages) is available here {}",
        output.page_count,
        output_path.display()
    );

    let mut problems = print_problems("Unable to remap these URLS.", output.unresolved_links());
    problems |= print_problems("Unable to remap these Anchors.", output.unresolved_anchors());

    if problems && config.strict {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
