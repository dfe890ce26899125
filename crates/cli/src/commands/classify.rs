// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;
use trickle_core::{EnglishCatalog, ErrorClassifier, ErrorKind, MessageCatalog};

use super::{render, yes_no};
use crate::cli::OutputFormat;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct ClassifyReport {
    pub status: u16,
    pub code: String,
    pub category: &'static str,
    pub retryable: bool,
    pub message: String,
}

/// Execute the classify command.
pub fn run(status: u16, body: Option<&str>, output: OutputFormat) -> Result<()> {
    let report = classify(status, body.unwrap_or_default(), &EnglishCatalog);
    println!("{}", render(&report, output, format_text)?);
    Ok(())
}

pub fn classify(status: u16, body: &str, catalog: &dyn MessageCatalog) -> ClassifyReport {
    let kind: ErrorKind = ErrorClassifier::new().classify_status(status, body.as_bytes());
    ClassifyReport {
        status,
        code: kind.code(),
        category: kind.category(),
        retryable: kind.is_retryable(),
        message: catalog.message(kind),
    }
}

pub fn format_text(report: &ClassifyReport) -> String {
    format!(
        "status:    {}\nkind:      {}\ncategory:  {}\nretryable: {}\nmessage:   {}",
        report.status,
        report.code,
        report.category,
        yes_no(report.retryable),
        report.message
    )
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
