use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use compliance_pdf::{Assets, Engine, Error, FontBytes, Stamp, load_layout, load_tables};

#[derive(Parser, Debug)]
#[command(name = "compliance-pdf")]
#[command(version, about = "Lay out a compliance document from a template and payload into a PDF", long_about = None)]
struct Args {
    /// Layout configuration JSON
    #[arg(short, long)]
    layout: PathBuf,

    /// Table set JSON
    #[arg(short, long)]
    tables: PathBuf,

    /// Document payload JSON
    #[arg(short, long)]
    payload: PathBuf,

    /// Output PDF file
    #[arg(short, long, default_value = "document.pdf")]
    output: PathBuf,

    /// Directory font references are resolved against (default: the layout file's directory)
    #[arg(long)]
    font_dir: Option<PathBuf>,

    /// Image asset as KEY=PATH; repeatable
    #[arg(long = "asset", value_name = "KEY=PATH", value_parser = parse_asset)]
    assets: Vec<(String, PathBuf)>,

    /// Document hash printed in footers
    #[arg(long)]
    hash: Option<String>,

    /// Trusted timestamp printed in footers
    #[arg(long)]
    timestamp: Option<String>,

    /// Timestamp serial number printed in footers
    #[arg(long)]
    serial: Option<String>,
}

fn parse_asset(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((key, path)) if !key.trim().is_empty() && !path.is_empty() => {
            Ok((key.trim().to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected KEY=PATH, got `{arg}`")),
    }
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

fn read_string(path: &Path) -> Result<String, Error> {
    String::from_utf8(read(path)?).map_err(|e| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        ))
    })
}

fn run(args: Args) -> Result<(), Error> {
    let layout = load_layout(&read_string(&args.layout)?)?;
    let tables = load_tables(&read_string(&args.tables)?)?;
    let payload: serde_json::Value = serde_json::from_str(&read_string(&args.payload)?)?;

    let font_dir = args
        .font_dir
        .clone()
        .or_else(|| args.layout.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mut fonts = FontBytes::new();
    for reference in layout.fonts.references() {
        let path = font_dir.join(reference);
        log::debug!("Loading font `{reference}` from {}", path.display());
        fonts.insert(reference.to_string(), read(&path)?);
    }

    let mut assets = Assets::new();
    for (key, path) in &args.assets {
        assets.insert(key.clone(), read(path)?);
    }

    let stamp = (args.hash.is_some() || args.timestamp.is_some() || args.serial.is_some()).then(|| Stamp {
        hash: args.hash.clone().unwrap_or_default(),
        timestamp: args.timestamp.clone().unwrap_or_default(),
        serial: args.serial.clone().unwrap_or_default(),
    });

    let engine = Engine::new(layout, tables, &fonts)?;
    let bytes = engine.render(&payload, &assets, stamp.as_ref())?;
    std::fs::write(&args.output, &bytes)?;
    log::info!("Wrote {} ({} bytes)", args.output.display(), bytes.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
