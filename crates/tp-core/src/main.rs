use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tp_backend::{new_session_id, ChatClient};
use tp_core::batch::{run_blocking, run_streaming, RunOptions};
use tp_core::config::Config;
use tp_core::itinerary::{build_itinerary_prompt, load_plan};
use tp_core::logging::init_logging;
use tp_protocol::{ItineraryPlan, Preferences, SessionId, TravelMode, TripDuration};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "travelplan",
    version,
    about = "Stream AI-generated travel itineraries from the planning service"
)]
struct Cli {
    /// Chat service URL (overrides config and TRAVELPLAN_CHAT_URL).
    #[arg(long, global = true)]
    url: Option<String>,
    /// Reuse an existing session id.
    #[arg(long, global = true)]
    session: Option<String>,
    /// Give up on a streamed answer after this many seconds (0 for never).
    #[arg(long, global = true, value_name = "SECS")]
    deadline: Option<u64>,
    /// Debug logging on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send a free-form prompt.
    Ask {
        prompt: String,
        /// Wait for the whole answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },
    /// Request an itinerary for a trip.
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
struct PlanArgs {
    /// Itinerary form saved as JSON.
    #[arg(long, conflicts_with_all = ["from", "to", "date"])]
    file: Option<PathBuf>,
    #[arg(long, required_unless_present = "file")]
    from: Option<String>,
    #[arg(long, required_unless_present = "file")]
    to: Option<String>,
    #[arg(long, required_unless_present = "file")]
    date: Option<String>,
    /// driving, walking, transit or cycling.
    #[arg(long)]
    mode: Option<TravelMode>,
    /// half-day, one-day, two-days, three-days, week or custom.
    #[arg(long)]
    duration: Option<TripDuration>,
    /// Places to pass through.
    #[arg(long)]
    via: Option<String>,
    #[arg(long, value_enum, value_delimiter = ',')]
    prefer: Vec<Preference>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preference {
    Historical,
    Natural,
    Food,
    Shopping,
}

impl PlanArgs {
    fn into_plan(self) -> Result<ItineraryPlan, String> {
        if let Some(path) = self.file {
            return load_plan(&path).map_err(|e| format!("{}: {e}", path.display()));
        }

        let mut preferences = Preferences::default();
        for preference in self.prefer {
            match preference {
                Preference::Historical => preferences.historical = true,
                Preference::Natural => preferences.natural = true,
                Preference::Food => preferences.food = true,
                Preference::Shopping => preferences.shopping = true,
            }
        }

        Ok(ItineraryPlan {
            start_point: self.from.unwrap_or_default(),
            end_point: self.to.unwrap_or_default(),
            travel_date: self.date.unwrap_or_default(),
            travel_mode: self.mode,
            waypoints: self.via,
            duration: self.duration,
            preferences,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default();
    let base_url = cli.url.unwrap_or_else(|| config.chat.base_url.clone());
    let options = RunOptions {
        deadline: config.chat.stream_deadline(cli.deadline),
        show_progress: config.output.show_progress,
    };

    let client = match ChatClient::with_timeouts(
        base_url,
        config.chat.connect_timeout(),
        config.chat.request_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("[tp] error: failed to create HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let session = cli.session.map(SessionId::new).unwrap_or_else(new_session_id);
    debug!(session = %session, url = client.base_url(), "starting request");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("[tp] error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ask { prompt, no_stream } => {
            if no_stream {
                runtime.block_on(run_blocking(&client, &session, &prompt, &options))
            } else {
                runtime.block_on(run_streaming(&client, &session, &prompt, &options))
            }
        }
        Commands::Plan(args) => match args.into_plan() {
            Ok(plan) => {
                let prompt = build_itinerary_prompt(&plan);
                runtime.block_on(run_streaming(&client, &session, &prompt, &options))
            }
            Err(e) => {
                eprintln!("[tp] error: {e}");
                1
            }
        },
    };
    std::process::exit(code);
}
