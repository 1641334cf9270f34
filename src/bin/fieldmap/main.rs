use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser as CliParser;
use fieldmap::{
  Category, MapSession,
  config::Config,
  filter::SearchColumn,
  geolocation::{FixedPosition, NoPositioning, PositionProvider},
  map::coordinates::WGS84Coordinate,
  remote::remote_runner,
  source::http::HttpProjectBackend,
};
use log::warn;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Base url of the project service. Overrides config and FIELDMAP_API_URL.
  #[arg(long)]
  api_url: Option<String>,

  /// Bearer token for the project service.
  #[arg(long)]
  token: Option<String>,

  /// Maximum number of projects per request.
  #[arg(long)]
  limit: Option<usize>,

  /// Text search to run before printing the view.
  #[arg(short, long)]
  query: Option<String>,

  /// Column to search in. Values: all, name, location, category, description, coordinates.
  #[arg(short, long, default_value = "all")]
  column: String,

  /// Hides a category. Can be given several times.
  #[arg(long)]
  hide: Vec<String>,

  /// The user's position as "lat,lon". Needed for --near-me.
  #[arg(short, long)]
  location: Option<String>,

  /// Only shows projects around --location.
  #[arg(short, long)]
  near_me: bool,

  /// Near-me radius in km.
  #[arg(short, long)]
  radius: Option<f64>,

  /// Serves the map state over http instead of printing it once.
  #[arg(short, long)]
  serve: bool,

  /// Port for --serve.
  #[arg(short, long)]
  port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  if args.serve {
    tracing_subscriber::fmt()
      .with_target(false)
      .with_env_filter(EnvFilter::from_default_env())
      .compact()
      .init();
  } else {
    env_logger::init();
  }

  let config = Config {
    config_path: None,
    api_base_url: args.api_url.clone(),
    api_token: args.token.clone(),
    page_limit: args.limit,
    search_debounce_ms: None,
    default_radius_km: None,
    default_view: None,
    remote_port: args.port,
  }
  .merge(&Config::new());

  let positions: Arc<dyn PositionProvider> = match &args.location {
    Some(location) => Arc::new(FixedPosition::new(
      location
        .parse::<WGS84Coordinate>()
        .map_err(|e| anyhow!("Invalid location {location}: {e}"))?,
    )),
    None => Arc::new(NoPositioning),
  };

  let backend = Arc::new(HttpProjectBackend::new(
    config.api_base_url(),
    config.api_token.clone(),
  ));
  let mut session = MapSession::new(&config, backend, positions);
  session.load().await;

  for hidden in &args.hide {
    match hidden.parse::<Category>() {
      Ok(category) if session.filter().is_category_visible(category) => {
        session.toggle_category(category);
      }
      Ok(_) => {}
      Err(e) => warn!("{e}"),
    }
  }

  if let Some(radius) = args.radius {
    session.set_near_me_radius(radius);
  }
  if args.near_me {
    session.set_near_me_mode(true);
    session.settle_location().await;
  }

  let column = args.column.parse::<SearchColumn>().unwrap_or_else(|e| {
    warn!("{e}");
    SearchColumn::All
  });
  session.set_search_column(column);
  if let Some(query) = &args.query {
    session.set_search_query(query.as_str());
    session.settle_search().await;
  }

  if args.serve {
    let port = config.remote_port();
    return remote_runner(Arc::new(Mutex::new(session)), port).await;
  }

  println!("{}", serde_json::to_string_pretty(&session.view())?);
  Ok(())
}
