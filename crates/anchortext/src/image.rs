use std::path::PathBuf;

use pdf_anchor::images::{image_anchor_text, load_image, resize_if_needed};

use crate::prelude::{print, println, *};

#[derive(Debug, clap::Args)]
pub struct ImageArgs {
    /// Path to a PNG image
    pub path: PathBuf,
}

pub fn run(args: ImageArgs, global: &crate::Global) -> Result<()> {
    let bytes = std::fs::read(&args.path)
        .wrap_err_with(|| format!("Failed to read {}", args.path.display()))?;
    let image = load_image(&bytes).map_err(|e| eyre!(e))?;
    let (width, height) = (image.width(), image.height());

    let resized = resize_if_needed(image, global.image_options().max_size);
    log::info!(
        "{}: {}x{} resized to {}x{}",
        args.path.display(),
        width,
        height,
        resized.width(),
        resized.height()
    );

    println!("{}x{} -> {}x{}", width, height, resized.width(), resized.height());
    print!("{}", image_anchor_text(resized.width(), resized.height()));
    Ok(())
}
