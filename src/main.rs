use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use serde::Serialize;
use simplelog::{Config, LevelFilter, WriteLogger};

use folio::converter::{SourceFormat, converter_for};
use folio::document::{DocumentRequest, DocumentSource};
use folio::model::{ExportFormat, MetaEntry};
use folio::notification::NotificationLevel;
use folio::outline::split_label;
use folio::panic_handler::initialize_panic_handler;
use folio::settings::{self, Settings};
use folio::synopsis::DocumentSynopsis;
use folio::{Document, GeneratorSettings, OutlineTree, Session, TextDocumentGenerator, Viewport};

const OUTLINE_WIDTH: usize = 72;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Paginate a text document and navigate its outline", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio notes.md                       Show metadata and outline
    folio notes.md --goto 3 --filter api Highlight the entry for page 3
    folio notes.md --render 1 --out p1.png
    folio notes.md --json")]
struct Cli {
    /// Source document
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[arg(long, value_enum, default_value_t = SourceFormat::Auto)]
    format: SourceFormat,

    /// XML outline used instead of the one derived from headings
    #[arg(long, value_name = "XML")]
    synopsis: Option<PathBuf>,

    /// Move to a 1-based page before printing the outline
    #[arg(long, value_name = "PAGE", value_parser = clap::value_parser!(u32).range(1..))]
    goto: Option<u32>,

    /// Only show outline entries matching this text
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,

    /// Rasterize a 1-based page to --out
    #[arg(
        long,
        value_name = "PAGE",
        requires = "out",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    render: Option<u32>,

    #[arg(long, value_name = "PNG")]
    out: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Export the document as plain text
    #[arg(long, value_name = "TXT")]
    export: Option<PathBuf>,

    /// Print a machine readable report
    #[arg(long)]
    json: bool,

    #[arg(long)]
    no_page_column: bool,

    #[arg(long, default_value = "folio.log")]
    log_file: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Serialize)]
struct OutlineEntry {
    depth: usize,
    title: String,
    page: Option<usize>,
    viewport: String,
    highlighted: bool,
    external_file: Option<String>,
}

#[derive(Serialize)]
struct Diagnostic {
    level: NotificationLevel,
    message: String,
    duration_ms: u128,
}

#[derive(Serialize)]
struct Report {
    file: PathBuf,
    converter: String,
    pages: usize,
    viewport: String,
    has_outline: bool,
    info: Vec<MetaEntry>,
    outline: Vec<OutlineEntry>,
    diagnostics: Vec<Diagnostic>,
    requests: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_panic_handler();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("cannot create log file {:?}", cli.log_file))?,
    )?;
    info!("Starting folio on {:?}", cli.file);

    settings::load_settings();
    let mut config = settings::get_settings();
    if cli.no_page_column {
        config.toc_page_column = false;
    }

    let result = run(&cli, &config);
    if let Err(e) = &result {
        error!("{e:?}");
    }
    info!("Shutting down folio");
    result
}

fn run(cli: &Cli, config: &Settings) -> Result<()> {
    let generator = TextDocumentGenerator::new(
        converter_for(&cli.file, cli.format),
        GeneratorSettings::from_settings(config),
    );
    let mut session = Session::new(Document::new(generator), OutlineTree::new());

    match &cli.synopsis {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("cannot read synopsis {path:?}"))?;
            let synopsis = DocumentSynopsis::from_xml(&xml)?;
            session
                .document_mut()
                .open_with_synopsis(&cli.file, synopsis)
                .with_context(|| format!("cannot open {:?}", cli.file))?;
        }
        None => session
            .document_mut()
            .open(&cli.file)
            .with_context(|| format!("cannot open {:?}", cli.file))?,
    }
    session.pump();

    if let Some(page) = cli.goto {
        let target = i32::try_from(page - 1).unwrap_or(i32::MAX);
        if !session
            .document_mut()
            .set_viewport(Viewport::page(target), false)
        {
            bail!(
                "page {page} is outside the document ({} pages)",
                session.document().page_count()
            );
        }
        session.pump();
    }

    if let Some(filter) = &cli.filter {
        session.outline_mut().set_filter(filter);
    }

    if let (Some(page), Some(out)) = (cli.render, &cli.out) {
        render_page(&mut session, page, out, cli, config)?;
    }

    if let Some(path) = &cli.export {
        session
            .document()
            .generator()
            .export_to(path, ExportFormat::PlainText)
            .with_context(|| format!("cannot export to {path:?}"))?;
    }

    if cli.json {
        let report = build_report(&session, cli);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&session, cli, config);
    }
    Ok(())
}

fn render_page(
    session: &mut Session,
    page: u32,
    out: &Path,
    cli: &Cli,
    config: &Settings,
) -> Result<()> {
    let width = cli.width.unwrap_or(config.page_width_px);
    let height = cli.height.unwrap_or(config.page_height_px);
    let generator = session.document_mut().generator_mut();
    let request = generator.request_pixmap(page as usize - 1, width, height);
    let Some(pixmap) = generator.generate_pixmap(&request) else {
        bail!("page {page} cannot be rendered");
    };
    pixmap
        .image
        .save(out)
        .with_context(|| format!("cannot write {out:?}"))?;
    info!("Rendered page {page} to {out:?}");
    Ok(())
}

fn describe_request(request: &DocumentRequest) -> String {
    match request {
        DocumentRequest::OpenExternal { file, viewport } => format!("open {file} at {viewport}"),
        DocumentRequest::OpenUrl(url) => format!("browse {url}"),
    }
}

fn build_report(session: &Session, cli: &Cli) -> Report {
    let document = session.document();
    let outline = session.outline();
    let generator = document.generator();

    Report {
        file: cli.file.clone(),
        converter: generator.converter_name().to_string(),
        pages: document.page_count(),
        viewport: document.viewport().to_string(),
        has_outline: session.has_outline(),
        info: document.document_info().entries().to_vec(),
        outline: outline
            .visible_rows()
            .into_iter()
            .filter_map(|row| {
                let node = outline.node(row.id)?;
                Some(OutlineEntry {
                    depth: row.depth,
                    title: split_label(&node.label).1.to_string(),
                    page: node.viewport.page_index().map(|p| p + 1),
                    viewport: node.viewport.to_string(),
                    highlighted: row.highlighted,
                    external_file: node.external_file.clone(),
                })
            })
            .collect(),
        diagnostics: generator
            .notifications()
            .all()
            .iter()
            .map(|n| Diagnostic {
                level: n.level,
                message: n.message.clone(),
                duration_ms: n.duration.as_millis(),
            })
            .collect(),
        requests: document
            .pending_requests()
            .iter()
            .map(describe_request)
            .collect(),
    }
}

fn print_summary(session: &Session, cli: &Cli, config: &Settings) {
    let document = session.document();
    println!("{}", cli.file.display());
    println!(
        "{} pages, at page {}",
        document.page_count(),
        document.viewport().page_number + 1
    );
    for entry in document.document_info().entries() {
        println!("{}: {}", entry.title, entry.value);
    }

    if session.has_outline() {
        println!();
        for line in session
            .outline()
            .render_lines(OUTLINE_WIDTH, config.toc_page_column)
        {
            println!("{line}");
        }
    } else {
        println!("(no outline)");
    }

    for n in document.generator().notifications().all() {
        eprintln!("{:?}: {}", n.level, n.message);
    }
}
