use anyhow::Context;
use chrono::Local;
use clap::{ArgGroup, Args, Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Text};
use temperature_core::{Config, Coordinate, TemperatureError, TemperatureReport, TemperatureService};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "avgtemp", version, about = "Current temperature averaged across weather sources")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure source URL, concurrency and geocoding credentials.
    Configure,

    /// Show the average current temperature for a location.
    Show(ShowArgs),

    /// List the temperature sources that can be used as filters.
    Sources,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("location").required(true).args(["lat", "zip"])))]
pub struct ShowArgs {
    /// Latitude in decimal degrees.
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Longitude in decimal degrees.
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Postal code, resolved to coordinates through the geocoding service.
    #[arg(long, conflicts_with_all = ["lat", "lon", "validate"])]
    pub zip: Option<String>,

    /// Only query this source; repeat for several. Defaults to all sources.
    #[arg(long = "source", value_name = "NAME")]
    pub sources: Vec<String>,

    /// Check the coordinates against the geocoding service first.
    #[arg(long)]
    pub validate: bool,

    /// Print `{"celsius": <value>}` instead of a human-readable summary.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show(args) => show(args).await,
            Command::Sources => {
                let config = Config::load()?;
                let service = TemperatureService::from_config(&config)?;
                for name in service.valid_sources() {
                    println!("{name}");
                }
                Ok(())
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    config.sources_base_url = Text::new("Temperature sources base URL:")
        .with_default(&config.sources_base_url)
        .prompt()
        .context("Failed to read sources base URL")?;

    config.max_concurrency = CustomType::<usize>::new("Maximum concurrent source requests (1-3):")
        .with_default(config.max_concurrency)
        .with_error_message("Please enter a positive whole number")
        .prompt()
        .context("Failed to read concurrency limit")?;

    let api_key = Password::new("Geocoding API key (leave empty to keep the current one):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read geocoding API key")?;

    if !api_key.trim().is_empty() {
        config.set_geocoding_api_key(api_key.trim().to_string());
    }

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

async fn show(args: ShowArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let service = TemperatureService::from_config(&config)?;

    // The core ignores unknown names; at this boundary they are a usage error.
    let unknown = service.aggregator().registry().unknown_names(&args.sources);
    if !unknown.is_empty() {
        return Err(TemperatureError::InvalidInput(format!(
            "The following sources are invalid: {}. Valid sources: {}.",
            unknown.join(", "),
            service.valid_sources().join(", "),
        ))
        .into());
    }

    let (coordinate, report) = match (args.zip.as_deref(), args.lat, args.lon) {
        (Some(zip), _, _) => service.by_postal_code(zip, &args.sources).await?,
        (None, Some(lat), Some(lon)) => {
            let coordinate = Coordinate::new(lat, lon);
            let report = service.by_coordinates(coordinate, &args.sources, args.validate).await?;
            (coordinate, report)
        }
        _ => {
            return Err(TemperatureError::InvalidInput(
                "latitude and/or longitude are missing".to_string(),
            )
            .into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string(&report.envelope())?);
    } else {
        print_report(coordinate, &report);
    }

    Ok(())
}

fn print_report(coordinate: Coordinate, report: &TemperatureReport) {
    println!("Average temperature at {coordinate}: {:.2} °C", report.celsius);
    for reading in &report.readings {
        println!("  {:<12} {:>7.2} °C", reading.source, reading.celsius);
    }
    println!(
        "Fetched at {}",
        report.fetched_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
}
