//! Batch conversion over a single browser session

use crate::driver::{with_page, BrowserDriver};
use crate::printer::{print_diagram, PrintReport};
use crate::viewer::{StagedAssets, ViewerAssets};
use crate::{ConversionJob, ConverterConfig, DisplayOptions, Result};
use log::info;
use std::path::PathBuf;

/// Reports of every job in a batch, in job order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub jobs: Vec<PrintReport>,
}

impl BatchReport {
    /// Number of files written across all jobs
    pub fn written_count(&self) -> usize {
        self.jobs.iter().map(|j| j.written.len()).sum()
    }

    /// Outputs skipped for an unknown extension, across all jobs
    pub fn unsupported(&self) -> impl Iterator<Item = &PathBuf> {
        self.jobs.iter().flat_map(|j| j.unsupported.iter())
    }
}

/// Convert every job using one browser session.
///
/// The viewer bundle is located and staged before the browser is launched.
pub fn convert_all<D: BrowserDriver>(
    driver: &D,
    config: &ConverterConfig,
    jobs: &[ConversionJob],
    options: &DisplayOptions,
) -> Result<BatchReport> {
    let bundle = ViewerAssets::locate(config)?;
    let assets = StagedAssets::stage(&bundle)?;
    convert_all_staged(driver, config, &assets, jobs, options)
}

/// Like [`convert_all`], with assets that are already staged.
///
/// Jobs run strictly in order on the same page. The first failing job aborts
/// the batch; the browser session is closed either way.
pub fn convert_all_staged<D: BrowserDriver>(
    driver: &D,
    config: &ConverterConfig,
    assets: &StagedAssets,
    jobs: &[ConversionJob],
    options: &DisplayOptions,
) -> Result<BatchReport> {
    info!("Converting {} diagram(s)", jobs.len());
    with_page(driver, config, |page| {
        let mut report = BatchReport::default();
        for job in jobs {
            report.jobs.push(print_diagram(page, assets, job, options)?);
        }
        Ok(report)
    })
}

/// Convert one input into one output with default display options.
pub fn convert<D: BrowserDriver>(
    driver: &D,
    config: &ConverterConfig,
    input: impl Into<PathBuf>,
    output: impl Into<PathBuf>,
) -> Result<PrintReport> {
    let job = ConversionJob::new(input, [output.into()]);
    let mut report = convert_all(driver, config, &[job], &DisplayOptions::default())?;
    report
        .jobs
        .pop()
        .ok_or_else(|| crate::Error::Other("conversion produced no report".into()))
}
