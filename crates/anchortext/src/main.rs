use crate::prelude::*;
use clap::Parser;
use pdf_anchor::{AnchorOptions, ImageOptions};

mod error;
mod image;
mod page;
mod prelude;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Anchor text, page reports and OCR prompts for PDF pages"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Character budget for the anchor text
    #[clap(
        long,
        env = "ANCHOR_TARGET_LENGTH",
        global = true,
        default_value_t = pdf_anchor::linearize::DEFAULT_TARGET_LENGTH
    )]
    target_length: usize,

    /// Distance in points under which image placements are merged
    #[clap(
        long,
        env = "ANCHOR_TOLERANCE",
        global = true,
        default_value_t = pdf_anchor::merge::DEFAULT_TOLERANCE
    )]
    tolerance: f64,

    /// Seed for the over-budget fill (random when omitted)
    #[clap(long, env = "ANCHOR_SEED", global = true)]
    seed: Option<u64>,

    /// Longest side, in pixels, of images sent with prompts
    #[clap(
        long,
        env = "ANCHOR_MAX_SIZE",
        global = true,
        default_value_t = pdf_anchor::images::DEFAULT_MAX_SIZE
    )]
    max_size: u32,
}

impl Global {
    pub fn anchor_options(&self) -> AnchorOptions {
        AnchorOptions {
            target_length: self.target_length,
            tolerance: self.tolerance,
            seed: self.seed,
        }
    }

    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            max_size: self.max_size,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Print the anchor text of a page
    Anchor(crate::page::PageArgs),

    /// Print the merged page report as JSON
    Report(crate::page::PageArgs),

    /// Print the OCR prompt for a page, or the full chat payload with --image
    Prompt(crate::page::PromptArgs),

    /// Print the anchor text of a PNG image and its resized dimensions
    Image(crate::image::ImageArgs),

    /// Print page count and page dimensions
    Info(crate::page::InfoArgs),
}

fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Anchor(args) => crate::page::anchor(args, &app.global),
        SubCommands::Report(args) => crate::page::report(args, &app.global),
        SubCommands::Prompt(args) => crate::page::prompt(args, &app.global),
        SubCommands::Image(args) => crate::image::run(args, &app.global),
        SubCommands::Info(args) => crate::page::info(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        App::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let app = App::try_parse_from([
            "anchortext",
            "anchor",
            "doc.pdf",
            "--page",
            "2",
            "--seed",
            "7",
            "--target-length",
            "500",
        ])
        .unwrap();

        let options = app.global.anchor_options();
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.target_length, 500);
        match app.command {
            SubCommands::Anchor(args) => assert_eq!(args.page, 2),
            other => panic!("unexpected subcommand: {:?}", other),
        }
    }

    #[test]
    fn prompt_defaults() {
        let app = App::try_parse_from(["anchortext", "prompt", "doc.pdf"]).unwrap();
        match app.command {
            SubCommands::Prompt(args) => {
                assert_eq!(args.target.page, 1);
                assert_eq!(args.template, "default");
                assert!(args.image.is_none());
            }
            other => panic!("unexpected subcommand: {:?}", other),
        }
    }
}
