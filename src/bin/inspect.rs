//! Binary entry point for the leafmat page inspector.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use leafmat::storage::{FileOverflowStore, MemOverflowStore, OverflowStore};
use leafmat::{
    CodecKind, Page, PageLayout, Position, ResolveStatsSnapshot, ResolverOptions, Session,
    TreeContext,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "leafmat-inspect",
    version,
    about = "Resolve and print every record on a leaf page image"
)]
struct Cli {
    #[arg(value_name = "PAGE", help = "File holding one page image")]
    page: PathBuf,

    #[arg(long, value_name = "FILE", help = "Overflow file referenced by overflow cells")]
    overflow: Option<PathBuf>,

    #[arg(
        long,
        env = "LEAFMAT_OVERFLOW_PAGE_SIZE",
        default_value_t = 4096,
        help = "Page size of the overflow file in bytes"
    )]
    overflow_page_size: u32,

    #[arg(long, value_enum, default_value_t = CodecArg::None, help = "Value compression")]
    value_codec: CodecArg,

    #[arg(long, value_enum, default_value_t = CodecArg::None, help = "Key compression")]
    key_codec: CodecArg,

    #[arg(long, help = "Also resolve keys (row-leaf pages only)")]
    keys: bool,

    #[arg(long, help = "Skip checksum verification of overflow payloads")]
    no_verify: bool,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CodecArg {
    None,
    Snappy,
}

impl From<CodecArg> for CodecKind {
    fn from(value: CodecArg) -> Self {
        match value {
            CodecArg::None => CodecKind::None,
            CodecArg::Snappy => CodecKind::Snappy,
        }
    }
}

#[derive(Serialize)]
struct PageReport {
    layout_tag: u8,
    flags: u8,
    slot_count: usize,
    records: Vec<SlotReport>,
    stats: ResolveStatsSnapshot,
}

#[derive(Serialize)]
struct SlotReport {
    slot: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LEAFMAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let image = std::fs::read(&cli.page)?;
    let page = Arc::new(Page::from_image(image)?);
    debug!(
        path = %cli.page.display(),
        tag = page.layout_tag(),
        slots = page.slot_count(),
        "inspect.page_loaded"
    );

    let overflow: Arc<dyn OverflowStore> = match &cli.overflow {
        Some(path) => Arc::new(FileOverflowStore::open(path, cli.overflow_page_size)?),
        None => Arc::new(MemOverflowStore::new()),
    };
    let options = ResolverOptions::new()
        .value_codec(cli.value_codec.into())
        .key_codec(cli.key_codec.into())
        .verify_overflow_checksums(!cli.no_verify);
    let ctx = TreeContext::new(overflow, options);
    let want_key = cli.keys && page.layout().ok() == Some(PageLayout::RowLeaf);

    let mut session = Session::new();
    let records: Vec<SlotReport> = (0..page.slot_count())
        .map(|slot| {
            let pos = Position::new(page.clone(), slot);
            match session.resolve_record(&ctx, &pos, want_key) {
                Ok(record) => SlotReport {
                    slot,
                    key: record.key().map(hex::encode),
                    value: Some(hex::encode(record.value())),
                    error: None,
                },
                Err(err) => SlotReport {
                    slot,
                    key: None,
                    value: None,
                    error: Some(err.to_string()),
                },
            }
        })
        .collect();
    ctx.stats().emit_tracing();
    info!(slots = page.slot_count(), "inspect.done");

    let report = PageReport {
        layout_tag: page.layout_tag(),
        flags: page.flags(),
        slot_count: page.slot_count(),
        records,
        stats: ctx.stats().snapshot(),
    };
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &PageReport) {
    println!(
        "page: layout_tag={} flags={:#04x} slots={}",
        report.layout_tag, report.flags, report.slot_count
    );
    for record in &report.records {
        match (&record.error, &record.value) {
            (Some(err), _) => println!("  [{}] error: {err}", record.slot),
            (None, Some(value)) => match &record.key {
                Some(key) => println!("  [{}] key={key} value={value}", record.slot),
                None => println!("  [{}] value={value}", record.slot),
            },
            (None, None) => println!("  [{}] <no value>", record.slot),
        }
    }
    let stats = &report.stats;
    println!(
        "stats: resolves={} value_cell_decodes={} overflow_fetches={} decompressions={} key_instantiations={}",
        stats.resolves,
        stats.value_cell_decodes,
        stats.overflow_fetches,
        stats.decompressions,
        stats.key_instantiations
    );
}
