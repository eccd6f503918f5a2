use crate::batch::{self, BatchReport};
use crate::driver::BrowserDriver;
use crate::printer::PrintReport;
use crate::viewer::{StagedAssets, ViewerAssets};
use crate::{ConversionJob, ConverterConfig, DisplayOptions, Error, Result};
use log::debug;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Convert(Vec<ConversionJob>, DisplayOptions, oneshot::Sender<Result<BatchReport>>),
    Shutdown(oneshot::Sender<Result<()>>),
}

/// An async-friendly converter backed by a dedicated worker thread.
///
/// The worker thread owns the driver and the staged viewer assets and runs
/// one batch at a time, in the order requests were sent. Browser drivers are
/// usually blocking, so async callers never run them on the runtime's threads.
#[derive(Clone)]
pub struct Converter {
    cmd_tx: Sender<Command>,
}

impl Converter {
    /// Create a converter (spawns a background thread that owns `driver`).
    ///
    /// Fails if the viewer bundle cannot be located or staged.
    pub async fn new<D>(driver: D, config: ConverterConfig) -> Result<Self>
    where
        D: BrowserDriver + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("bpmn-to-image-worker".into())
            .spawn(move || {
                let assets = match ViewerAssets::locate(&config).and_then(|b| StagedAssets::stage(&b)) {
                    Ok(a) => a,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                let _ = init_tx.send(Ok(()));

                let mut shutdown = None;
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Convert(jobs, options, resp) => {
                            let res = batch::convert_all_staged(&driver, &config, &assets, &jobs, &options);
                            let _ = resp.send(res);
                        }
                        Command::Shutdown(resp) => {
                            shutdown = Some(resp);
                            break;
                        }
                    }
                }

                // Remove the staging directory before acknowledging shutdown
                drop(assets);
                debug!("Converter worker stopped");
                if let Some(resp) = shutdown {
                    let _ = resp.send(Ok(()));
                }
            })
            .map_err(|e| Error::Other(format!("Failed to spawn converter worker: {}", e)))?;

        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Convert a batch of jobs in one browser session
    pub async fn convert_all(&self, jobs: Vec<ConversionJob>, options: DisplayOptions) -> Result<BatchReport> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Convert(jobs, options, tx));
        rx.await
            .map_err(|e| Error::Other(format!("Conversion canceled: {}", e)))?
    }

    /// Convert one input into one output with default display options
    pub async fn convert(&self, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Result<PrintReport> {
        let job = ConversionJob::new(input, [output.into()]);
        let mut report = self.convert_all(vec![job], DisplayOptions::default()).await?;
        report
            .jobs
            .pop()
            .ok_or_else(|| Error::Other("conversion produced no report".into()))
    }

    /// Stop the worker thread and remove the staged assets.
    ///
    /// Requests already queued by clones of this converter finish first.
    pub async fn shutdown(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Shutdown(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Shutdown canceled: {}", e)))?
    }
}
