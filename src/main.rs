use clap::{Parser, Subcommand};
use hawk::config;
use hawk::dispatcher::{Hawk, HawkError, Strategy};
use hawk::logging::{self, LogLevel};
use hawk::output;
use std::path::{Path, PathBuf};

/// Pattern flags shared by commands that discover pages.
#[derive(clap::Args, Clone, Default)]
struct PatternArgs {
    /// Extra lookup pattern (repeatable), added to `lookup_patterns`
    #[arg(short = 'i', long = "include", value_name = "PATTERN")]
    include: Vec<String>,

    /// Extra ignore pattern (repeatable), added to `ignore_patterns`
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Indent the generated sitemap
    #[arg(short = 'p', long)]
    prettify: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("HAWK_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("HAWK_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "hawk")]
#[command(about = "Sitemaps and search-engine update notifications for static sites")]
#[command(long_about = "\
Sitemaps and search-engine update notifications for static sites

Hawk finds the pages of a static site, keeps sitemap.xml and robots.txt up to
date, and tells search engines what changed since the last run.

Strategies:

  index-now      changed pages → IndexNow (Bing, Yandex, Seznam, ...)
  g-index        changed pages → Google Indexing API
  g-webmaster    whole sitemap → Google Search Console
  g-webmaster2   same, then print the sitemap's Search Console status

Run state (last run time, IndexNow key) is kept in .hawk.lrs in the site root.
FTP credentials can come from HAWK_FTP_HOST, HAWK_FTP_USER and
HAWK_FTP_PASSWORD, or a .env file in the site root.

Run 'hawk gen-config' to generate a documented hawk.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: hawk.toml in the site root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Log level (overrides HAWK_LOG)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Notify search engines about updated pages
    Notify {
        #[arg(short, long, value_enum, default_value_t = Strategy::IndexNow)]
        strategy: Strategy,

        #[command(flatten)]
        patterns: PatternArgs,
    },
    /// Generate the sitemap, optionally submitting it to Search Console
    Genmap {
        #[command(flatten)]
        patterns: PatternArgs,

        /// Upload and submit to Google Search Console, then print its status
        #[arg(short, long)]
        commit: bool,
    },
    /// Add or refresh the sitemap link in robots.txt
    Robots,
    /// Print a stock hawk.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    load_env(&cli.root);
    logging::init_logging(cli.log_level);

    if let Err(err) = run(cli).await {
        eprintln!("Program stopping.. reason: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), HawkError> {
    match &cli.command {
        Command::Notify { strategy, patterns } => {
            let outcome = open(&cli)?
                .hawk(*strategy, &patterns.include, &patterns.exclude, patterns.prettify)
                .await?;
            output::print_outcome(&outcome);
        }
        Command::Genmap { patterns, commit: true } => {
            let outcome = open(&cli)?
                .hawk(
                    Strategy::GWebmaster2,
                    &patterns.include,
                    &patterns.exclude,
                    patterns.prettify,
                )
                .await?;
            output::print_outcome(&outcome);
        }
        Command::Genmap { patterns, commit: false } => {
            let status = open(&cli)?.make_sitemap(
                &patterns.include,
                &patterns.exclude,
                patterns.prettify,
                false,
            )?;
            println!("{status}");
        }
        Command::Robots => {
            let update = open(&cli)?.make_robots()?;
            println!("{update}");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `.env` from the site root, then from the working directory.
/// Variables already set are never overridden.
fn load_env(root: &Path) {
    dotenvy::from_path(root.join(".env")).ok();
    dotenvy::dotenv().ok();
}

/// Load the config and build the dispatcher for the site root.
fn open(cli: &Cli) -> Result<Hawk, HawkError> {
    let config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.root)?,
    };
    Ok(Hawk::new(config.with_env_credentials(), &cli.root))
}
