use std::path::PathBuf;

use clap::{Parser as _, Subcommand};
use remanga::{slug_from_url, LogPortals, Parser, Settings, StubDetector};

#[derive(Debug, clap::Parser)]
#[command(
    name = "remanga",
    version,
    author,
    about = "CLI tool to collect and parse titles from remanga"
)]
struct Arguments {
    #[arg(short, long, help = "settings file (JSON)")]
    settings: Option<PathBuf>,
    #[arg(short, long, default_value = "Filters", help = "stub filters folder")]
    filters: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print slugs from the catalog or from recent updates
    Collect {
        #[arg(long, help = "only titles updated within this many hours")]
        period: Option<u64>,
        #[arg(short, long, help = "extra catalog query, e.g. 'genres=2&types=1'")]
        query: Option<String>,
        #[arg(short, long, help = "maximum number of pages")]
        pages: Option<u32>,
    },
    /// Print a title as JSON
    Parse {
        #[arg(help = "title slug or url")]
        title: String,
        #[arg(long, help = "also fetch the slides of every chapter")]
        slides: bool,
    },
    /// Check whether an image is a known cover stub
    CheckStub {
        #[arg(help = "image to check")]
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Arguments::parse();
    let settings = match &args.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    match args.command {
        Command::Collect {
            period,
            query,
            pages,
        } => {
            let service = remanga::service(&settings)?;
            let mut parser = Parser::new(service, settings, LogPortals, &args.filters)?;
            for slug in parser.collect(period, query.as_deref(), pages).await? {
                println!("{slug}");
            }
        }
        Command::Parse { title, slides } => {
            let slug = if title.contains("://") {
                slug_from_url(&title, &settings.site)?
            } else {
                title
            };
            let service = remanga::service(&settings)?;
            let mut parser = Parser::new(service, settings, LogPortals, &args.filters)?;
            match parser.parse(&slug).await? {
                Some(mut title) => {
                    if slides {
                        parser.amend_title(&mut title).await?;
                    }
                    println!("{}", serde_json::to_string_pretty(&title)?);
                }
                None => anyhow::bail!("title '{slug}' not found"),
            }
        }
        Command::CheckStub { image } => {
            let detector = StubDetector::new(settings.custom.stub_threshold);
            let stub = detector.is_stub(&image, &args.filters, &LogPortals)?;
            println!("{}", if stub { "stub" } else { "genuine" });
        }
    }

    Ok(())
}
