//! Converts the sample diagram beside this file into `output.png`
//!
//! Needs Chrome and the viewer bundle (`BPMN_TO_IMAGE_VIEWER` or `--viewer`
//! locations, see `ViewerAssets::locate`).

use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let here = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let input = here.join("input.bpmn");
    let output = here.join("output.png");

    let report = bpmn_to_image::convert(&input, &output).await?;

    for written in &report.written {
        println!("{} -> {} ({} bytes)", input.display(), written.path.display(), written.bytes);
    }
    Ok(())
}
