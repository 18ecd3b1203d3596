mod echo;
mod fetch;
mod save;
mod settings;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use clipmark_core::{ConversionSettings, Document, convert};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::echo::{
    format_size, print_banner, print_detail, print_error, print_info, print_step, print_success, print_timing,
    print_warning,
};
use crate::fetch::{FetchConfig, build_client, fetch_file, fetch_stdin, fetch_url, is_remote};
use crate::save::{ImageSource, save_clipping};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const TOTAL_STEPS: usize = 4;

/// Output format for the converted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: markdown, json", s)),
        }
    }
}

/// Save a web page as Markdown with its images
#[derive(Parser, Debug)]
#[command(name = "clipmark")]
#[command(author = "Clipmark Contributors")]
#[command(version = VERSION)]
#[command(about = "Save web pages as Markdown with an images folder", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Directory to write <title>.md and images/ into (default: Markdown to stdout)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output format for stdout (markdown, json)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    format: OutputFormat,

    /// Page URL used to resolve relative links and images
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Treat INPUT as a JSON document snapshot instead of HTML
    #[arg(long)]
    snapshot: bool,

    /// Start with a "# Title" heading instead of frontmatter
    #[arg(long)]
    no_frontmatter: bool,

    /// Frontmatter tag (repeatable, replaces configured tags)
    #[arg(short, long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Settings file (default: <config dir>/clipmark/settings.json)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,

    /// Write the Markdown only, without saving images
    #[arg(long)]
    no_download: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn effective_settings(args: &Args) -> anyhow::Result<ConversionSettings> {
    let mut settings = match args.settings.as_deref() {
        Some(path) if args.save_settings && !path.exists() => ConversionSettings::default(),
        explicit => settings::load(explicit)?,
    };
    if args.no_frontmatter {
        settings.add_frontmatter = false;
    }
    if !args.tags.is_empty() {
        settings.tags = args.tags.clone();
    }

    if args.save_settings {
        let path = match &args.settings {
            Some(path) => path.clone(),
            None => settings::default_settings_path().context("No config directory on this platform")?,
        };
        settings::save(&path, &settings)?;
        print_info(&format!("Settings saved to {}", path.display()));
    }

    Ok(settings)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.verbose {
        print_banner();
    }

    let settings = effective_settings(&args)?;
    let config = FetchConfig {
        timeout: args.timeout,
        user_agent: args.user_agent.clone().unwrap_or_else(|| FetchConfig::default().user_agent),
    };
    let client = build_client(&config)?;

    let (input, local_root) = if args.input == "-" {
        if args.verbose {
            print_step(1, TOTAL_STEPS, "Reading from stdin");
        }
        (fetch_stdin()?, None)
    } else if is_remote(&args.input) {
        if args.verbose {
            print_step(1, TOTAL_STEPS, &format!("Fetching from {}", args.input.bright_white().underline()));
        }
        (fetch_url(&client, &args.input).await.context("Failed to fetch URL")?, None)
    } else {
        if args.verbose {
            print_step(1, TOTAL_STEPS, &format!("Reading from file {}", args.input.bright_white()));
        }
        let path = Path::new(&args.input);
        let root = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new(".")).to_path_buf();
        (fetch_file(path)?, Some(root))
    };

    if args.verbose {
        print_detail("Size", &format_size(input.len()));
        print_step(2, TOTAL_STEPS, "Parsing document");
    }

    let page_url = args.url.clone().or_else(|| is_remote(&args.input).then(|| args.input.clone()));
    let started = Instant::now();
    let doc = if args.snapshot {
        Document::from_snapshot(&input).context("Failed to read document snapshot")?
    } else {
        match &page_url {
            Some(url) => Document::parse_with_url(&input, url)?,
            None => Document::parse(&input)?,
        }
    };
    let page = doc.extract_page_metadata();

    if args.verbose {
        print_detail("Title", &page.title);
        print_timing("Parse", started.elapsed());
        print_step(3, TOTAL_STEPS, "Converting to Markdown");
    }

    let started = Instant::now();
    let result = convert(&doc, &page, &settings);

    if args.verbose {
        print_detail("Images", &result.images.len().to_string());
        print_detail("Frontmatter", if settings.add_frontmatter { "Yes" } else { "No" });
        print_timing("Convert", started.elapsed());
        print_step(4, TOTAL_STEPS, "Writing output");
    }

    let Some(dir) = &args.output else {
        match args.format {
            OutputFormat::Markdown => print!("{}", result.markdown),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.to_json()?)?),
        }
        return Ok(());
    };

    let source = ImageSource::new(client, local_root);
    let images = (!args.no_download).then_some(&source);
    let saved = save_clipping(dir, &page.title, &result, images).await?;

    for failure in &saved.failures {
        print_warning(&format!("Could not save image {}: {:#}", failure.filename, failure.error));
    }
    print_success(&format!("Markdown written to {}", saved.markdown_path.display().bright_white()));
    if images.is_some() && !result.images.is_empty() {
        print_info(&format!("{} of {} images saved", saved.images_saved, result.images.len()));
    }

    Ok(())
}
