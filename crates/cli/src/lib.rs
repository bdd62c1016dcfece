//! Thin front-end: parse arguments, build a [`rolodex_core::config::RolodexConfig`],
//! run [`rolodex_core::index_document`], and print the result. No indexing
//! logic lives here — only argument wiring and output formatting.

use clap::Parser;
use rolodex_core::{
    config::RolodexConfig,
    file_source::{FileSource, LocalFs, RemoteFs},
};
use std::{path::PathBuf, process::ExitCode, time::Duration};

#[derive(Parser)]
#[command(
    name = "rolodex",
    about = "Index an OpenAPI/Swagger document and report its reference graph"
)]
struct Args {
    /// Path or URL of the root document.
    spec: String,

    /// Directory relative file refs are resolved against.
    #[arg(long)]
    base_path: Option<PathBuf>,

    /// URL relative remote refs are resolved against.
    #[arg(long)]
    base_url: Option<String>,

    /// Allow following `https://`/`http://` refs.
    #[arg(long)]
    allow_remote: bool,

    /// Print the full error list as JSON instead of a one-line summary.
    #[arg(long)]
    json: bool,
}

pub fn run() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    tracing::info!(spec = %args.spec, "indexing document");

    let spec_text = match read_spec(&args.spec, args.base_path.as_deref()) {
        Ok(text) => text,
        Err(error) => {
            eprintln!("failed to read {}: {error}", args.spec);
            return ExitCode::FAILURE;
        }
    };

    let base_url = args.base_url.as_deref().and_then(|url| url::Url::parse(url).ok());
    let config = RolodexConfig {
        base_path: args.base_path.clone(),
        base_url: base_url.clone(),
        spec_absolute_path: Some(args.spec.clone()),
        allow_remote_lookup: args.allow_remote,
        ..RolodexConfig::default()
    };

    let sources: Vec<Box<dyn FileSource>> = vec![
        Box::new(LocalFs::new(args.base_path.clone())),
        Box::new(RemoteFs::new(base_url, Duration::from_secs(60))),
    ];

    match rolodex_core::index_document(&spec_text, config, sources) {
        Ok(rolodex) => {
            report(&rolodex, args.json);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn read_spec(spec: &str, base_path: Option<&std::path::Path>) -> std::io::Result<String> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        return reqwest::blocking::get(spec)
            .and_then(|response| response.text())
            .map_err(std::io::Error::other);
    }
    let path = match base_path {
        Some(base) if !std::path::Path::new(spec).is_absolute() => base.join(spec),
        _ => PathBuf::from(spec),
    };
    std::fs::read_to_string(path)
}

fn report(rolodex: &rolodex_core::rolodex::Rolodex, as_json: bool) {
    let root = rolodex.root();
    let error_count = root.ref_errors.lock().unwrap().len();

    if as_json {
        let summary = serde_json::json!({
            "totalRefs": root.total_ref_count(),
            "totalMappedRefs": root.total_mapped_ref_count(),
            "totalInlineSchemas": root.total_inline_schema_count(),
            "totalTags": root.total_tag_count(),
            "indexCount": rolodex.index_count(),
            "errorCount": error_count,
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    } else {
        println!(
            "{} refs, {} mapped, {} inline schemas, {} indexes, {} errors",
            root.total_ref_count(),
            root.total_mapped_ref_count(),
            root.total_inline_schema_count(),
            rolodex.index_count(),
            error_count,
        );
    }
}
