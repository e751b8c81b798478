use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster_admin::cli;
use roster_admin::config::AdminConfig;
use roster_admin::handlers::users::DEFAULT_EXPORT_NAME;
use roster_admin::projector::{SortOrder, ViewQuery};

#[derive(Parser, Debug)]
#[command(author, version, about = "Roster user and coupon reports", long_about = None)]
struct Cli {
    /// Backend API URL (e.g. http://localhost:8000)
    #[arg(long, env = "ROSTER_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP dashboard
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Export the user table to <out-dir>/<name>.xlsx
    Export {
        #[command(flatten)]
        view: ViewArgs,

        /// Sheet and file name
        #[arg(long, default_value = DEFAULT_EXPORT_NAME)]
        name: String,

        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the user table
    List {
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Keep users whose name contains this text (any case)
    #[arg(short, long, default_value = "")]
    filter: String,

    /// Sort names Z to A
    #[arg(long)]
    desc: bool,
}

impl ViewArgs {
    fn query(&self) -> ViewQuery {
        let sort = if self.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        ViewQuery::new(self.filter.clone(), sort)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_admin=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();

    let mut config = AdminConfig::load()?;
    if let Some(url) = args.api_url {
        config = config.with_api_url(url);
    }
    tracing::info!("API URL: {}", config.api_url);

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.listen_port = port;
            }
            cli::run_serve(config).await?;
        }
        Command::Export { view, name, out_dir } => {
            let path = cli::run_export(&config, &view.query(), &name, out_dir.as_deref()).await?;
            println!("{}", path.display());
        }
        Command::List { view } => {
            print!("{}", cli::run_list(&config, &view.query()).await?);
        }
    }

    Ok(())
}
