use bpmn_to_image::cdp::CdpDriver;
use bpmn_to_image::{ConversionJob, Converter, ConverterConfig, DisplayOptions, MinDimensions, TitleOption};
use clap::{ArgAction, Parser};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Convert BPMN diagrams to PNG, SVG or PDF files
#[derive(Parser, Debug)]
#[command(name = "bpmn-to-image", version, about)]
struct Cli {
    /// Conversions, e.g. diagram.bpmn:diagram.png,diagram.pdf
    #[arg(value_name = "INPUT:OUTPUT[,OUTPUT...]", required = true)]
    conversions: Vec<ConversionJob>,

    /// Minimum size of the rendered page
    #[arg(long, value_name = "WxH", default_value_t = MinDimensions::default())]
    min_dimensions: MinDimensions,

    /// Title shown above the diagram (defaults to the input file name)
    #[arg(long, conflicts_with = "no_title")]
    title: Option<String>,

    /// Do not show a title
    #[arg(long)]
    no_title: bool,

    /// Do not show the footer
    #[arg(long)]
    no_footer: bool,

    /// Device scale factor for raster output
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    scale: f64,

    /// JavaScript run against the opened viewer (bound as `viewer`)
    #[arg(long, value_name = "FILE")]
    overlay: Option<PathBuf>,

    /// Browser executable [env: BPMN_TO_IMAGE_BROWSER]
    #[arg(long, value_name = "PATH")]
    browser: Option<PathBuf>,

    /// Viewer bundle script [env: BPMN_TO_IMAGE_VIEWER]
    #[arg(long, value_name = "PATH")]
    viewer: Option<PathBuf>,

    /// Timeout for each browser operation
    #[arg(long, value_name = "MS", default_value_t = 30000)]
    timeout_ms: u64,

    /// Disable Chrome's sandbox (needed when running as root in containers)
    #[arg(long)]
    no_sandbox: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn display_options(&self) -> Result<DisplayOptions, String> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(format!("--scale must be a positive number, got {}", self.scale));
        }
        let title = if self.no_title {
            TitleOption::Hidden
        } else {
            match &self.title {
                Some(text) => TitleOption::Custom(text.clone()),
                None => TitleOption::FromInput,
            }
        };
        let overlay = match &self.overlay {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read overlay script {}: {}", path.display(), e))?,
            ),
            None => None,
        };
        Ok(DisplayOptions {
            min_dimensions: self.min_dimensions,
            footer: !self.no_footer,
            title,
            device_scale_factor: self.scale,
            overlay,
        })
    }

    fn converter_config(&self) -> ConverterConfig {
        let mut config = ConverterConfig::from_env();
        if let Some(browser) = &self.browser {
            config.browser_path = Some(browser.clone());
        }
        if let Some(viewer) = &self.viewer {
            config.viewer_bundle = Some(viewer.clone());
        }
        config.timeout_ms = self.timeout_ms;
        config.sandbox = !self.no_sandbox;
        config
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = match cli.display_options() {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("bpmn-to-image: {}", msg);
            return ExitCode::FAILURE;
        }
    };

    let converter = match Converter::new(CdpDriver::new(), cli.converter_config()).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("bpmn-to-image: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = converter.convert_all(cli.conversions, options).await;
    if let Err(e) = converter.shutdown().await {
        error!("Failed to stop converter: {}", e);
    }

    match result {
        Ok(report) => {
            info!(
                "Done: {} file(s) written, {} skipped",
                report.written_count(),
                report.unsupported().count()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("bpmn-to-image: {}", e);
            ExitCode::FAILURE
        }
    }
}
