use anyhow::Result;
use clap::{Parser, Subcommand};
use roomcraft::cli::{self, FollowUps, GlobalOptions};
use roomcraft::gateway::Rgb;
use roomcraft::Style;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "roomcraft")]
#[command(author, version, about = "Roomcraft - AI room design from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend origin, overrides config and environment
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available design styles
    Styles,

    /// Generate a new room from a style prompt
    Generate {
        /// Design style (random if omitted)
        #[arg(short, long)]
        style: Option<Style>,

        /// Split the result into recolorable objects
        #[arg(long)]
        segment: bool,

        /// Recolor the segment at this index (implies --segment)
        #[arg(long, requires = "color")]
        recolor: Option<usize>,

        /// Target colour as R,G,B or #rrggbb
        #[arg(long, requires = "recolor")]
        color: Option<Rgb>,

        /// Build a 3D model of the result
        #[arg(long)]
        reconstruct: bool,

        /// Attach an audio description
        #[arg(long)]
        narrate: bool,
    },

    /// Restyle a photo of a room
    Redesign {
        /// Photo to redesign
        #[arg(short, long)]
        photo: PathBuf,

        /// Design style (random if omitted)
        #[arg(short, long)]
        style: Option<Style>,

        /// Attach an audio description
        #[arg(long)]
        narrate: bool,

        /// Build a 3D model of the result
        #[arg(long)]
        reconstruct: bool,
    },

    /// Print a designer quote
    Quote,

    /// Talk to the designer avatar
    Chat {
        /// Message to send
        message: String,

        /// Avatar character name
        #[arg(long)]
        character: Option<String>,

        /// Style the conversation is about
        #[arg(short, long)]
        style: Option<Style>,
    },

    /// Check backend health and 3D model availability
    Health,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "roomcraft=debug,gateway=debug,session=debug,capture=debug"
    } else {
        "roomcraft=info,gateway=warn,session=warn,capture=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let opts = GlobalOptions {
        config: cli.config.clone(),
        base_url: cli.base_url.clone(),
        json: cli.json,
    };
    let config = cli::load_config(&opts)?;

    let ok = match cli.command {
        Commands::Styles => {
            cli::run_styles(opts.json)?;
            true
        }
        Commands::Generate {
            style,
            segment,
            recolor,
            color,
            reconstruct,
            narrate,
        } => {
            let follow_ups = FollowUps {
                segment,
                recolor: recolor.zip(color),
                narrate,
                reconstruct,
            };
            cli::run_generate(&config, opts.json, style, follow_ups).await?
        }
        Commands::Redesign {
            photo,
            style,
            narrate,
            reconstruct,
        } => {
            let follow_ups = FollowUps {
                narrate,
                reconstruct,
                ..Default::default()
            };
            cli::run_redesign(&config, opts.json, &photo, style, follow_ups).await?
        }
        Commands::Quote => {
            cli::run_quote(&config, opts.json).await?;
            true
        }
        Commands::Chat {
            message,
            character,
            style,
        } => {
            cli::run_chat(&config, opts.json, &message, character, style).await?;
            true
        }
        Commands::Health => cli::run_health(&config, opts.json).await?,
        Commands::Config => {
            cli::run_config(&config, opts.config.as_deref(), opts.json)?;
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
