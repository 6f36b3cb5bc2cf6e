use std::path::{Path, PathBuf};

use pdf_anchor::images::{image_to_base64png, load_image, resize_if_needed};
use pdf_anchor::prompt::{build_page_messages, get_prompt, PromptTemplate};
use pdf_anchor::AnchorDocument;

use crate::prelude::{print, println, *};

#[derive(Debug, clap::Args)]
pub struct PageArgs {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,
}

#[derive(Debug, clap::Args)]
pub struct PromptArgs {
    #[command(flatten)]
    pub target: PageArgs,

    /// Prompt template name
    #[arg(short, long, default_value = "default")]
    pub template: String,

    /// Rendered PNG of the page; switches the output to a chat payload
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct InfoArgs {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, serde::Serialize)]
struct PageInfo {
    page: u32,
    width: f64,
    height: f64,
}

#[derive(Debug, serde::Serialize)]
struct DocumentInfo {
    page_count: usize,
    pages: Vec<PageInfo>,
}

fn open(path: &Path) -> Result<AnchorDocument> {
    let bytes = std::fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    AnchorDocument::from_bytes(&bytes).map_err(|e| eyre!(e))
}

fn open_page(args: &PageArgs) -> Result<AnchorDocument> {
    if args.page == 0 {
        return Err(Error::ZeroPage.into());
    }
    open(&args.path)
}

fn lookup_template(name: &str) -> Result<PromptTemplate> {
    get_prompt(name).ok_or_else(|| {
        let known: Vec<&str> = PromptTemplate::ALL.iter().map(|t| t.name()).collect();
        Error::UnknownTemplate(name.to_string(), known.join(", ")).into()
    })
}

pub fn anchor(args: PageArgs, global: &crate::Global) -> Result<()> {
    let doc = open_page(&args)?;
    let text = doc
        .anchor_text(args.page, &global.anchor_options())
        .map_err(|e| eyre!(e))?;
    print!("{}", text);
    Ok(())
}

pub fn report(args: PageArgs, global: &crate::Global) -> Result<()> {
    let doc = open_page(&args)?;
    let report = doc
        .page_report(args.page)
        .map_err(|e| eyre!(e))?
        .merged(global.tolerance);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn prompt(args: PromptArgs, global: &crate::Global) -> Result<()> {
    let template = lookup_template(&args.template)?;
    let doc = open_page(&args.target)?;
    let anchor = doc
        .anchor_text(args.target.page, &global.anchor_options())
        .map_err(|e| eyre!(e))?;
    let prompt = template.render(&anchor);

    let Some(image_path) = args.image else {
        println!("{}", prompt);
        return Ok(());
    };

    let bytes = std::fs::read(&image_path)
        .wrap_err_with(|| format!("Failed to read {}", image_path.display()))?;
    let image = load_image(&bytes).map_err(|e| eyre!(e))?;
    let image = resize_if_needed(image, global.image_options().max_size);
    let encoded = image_to_base64png(&image).map_err(|e| eyre!(e))?;

    let messages = build_page_messages(&prompt, &encoded);
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

pub fn info(args: InfoArgs) -> Result<()> {
    let doc = open(&args.path)?;

    let mut pages = Vec::with_capacity(doc.page_count());
    for page in 1..=doc.page_count() as u32 {
        let (width, height) = doc.page_dimensions(page).map_err(|e| eyre!(e))?;
        pages.push(PageInfo {
            page,
            width,
            height,
        });
    }
    let info = DocumentInfo {
        page_count: doc.page_count(),
        pages,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Pages: {}", info.page_count);
    let mut table = new_table();
    table.add_row(prettytable::row!["Page", "Width", "Height"]);
    for p in &info.pages {
        table.add_row(prettytable::row![
            p.page,
            format!("{:.1}", p.width),
            format!("{:.1}", p.height)
        ]);
    }
    table.printstd();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_template_lists_known_names() {
        let err = lookup_template("fancy").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown prompt template: fancy (expected one of: default, structure)"
        );
        assert_eq!(lookup_template("structure").unwrap(), PromptTemplate::Structure);
    }

    #[test]
    fn page_zero_is_rejected_before_reading() {
        let args = PageArgs {
            path: PathBuf::from("does-not-exist.pdf"),
            page: 0,
        };
        let err = open_page(&args).err().unwrap();
        assert!(err.to_string().contains("1-indexed"));
    }
}
