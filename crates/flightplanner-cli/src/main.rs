// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use anyhow::Result;
use clap::{Parser, Subcommand};
use flightplanner_core::config::API_URL_ENV;
use flightplanner_core::controller::Notifier;
use flightplanner_core::plan::{format_utc_minute, SpeedUnit};
use flightplanner_core::{
    CancelOrigin, ConfigManager, FlightPlan, LocalPlanRequest, Message, PlanDriver, PlanRequest, PlanState,
    PlannerClient, RoutePlanRequest,
};
use flightplanner_core::validation::validate_request;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

const MAX_NEARBY_LISTED: usize = 20;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Planner backend, e.g. http://localhost:8000
    #[arg(long, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a route between two airports, streaming progress
    Route {
        origin: String,
        destination: String,
        /// Cruise speed
        #[arg(long, default_value_t = 110.0)]
        speed: f64,
        #[arg(long, default_value = "knots")]
        speed_unit: SpeedUnit,
        /// Cruise altitude in feet MSL
        #[arg(long, default_value_t = 5500)]
        altitude: i32,
        #[arg(long)]
        avoid_airspaces: bool,
        #[arg(long)]
        avoid_terrain: bool,
        /// Skip wind correction
        #[arg(long)]
        no_wind: bool,
        /// Wait for the finished plan instead of streaming progress
        #[arg(long)]
        no_stream: bool,
        /// Retry this many times after a failure
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// List airports around a field
    Local {
        airport: String,
        /// Search radius in nautical miles
        #[arg(long, default_value_t = 25.0)]
        radius: f64,
    },
    /// Show the effective configuration and where it is stored
    Config,
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&mut self, message: &str) {
        println!("{}", message);
    }

    fn failure(&mut self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

/// Builds the driver and routes Ctrl-C to a user cancel.
fn start_driver(client: PlannerClient) -> PlanDriver {
    let driver = PlanDriver::new(client, Box::new(ConsoleNotifier));
    let tx = driver.sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Message::Cancel);
        }
    });
    driver
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let manager = ConfigManager::new();
    let config = manager.load()?.with_api_url(cli.api_url.clone());

    let (state, driver) = match cli.command {
        Commands::Config => {
            println!("Config file: {}", manager.path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Route {
            origin,
            destination,
            speed,
            speed_unit,
            altitude,
            avoid_airspaces,
            avoid_terrain,
            no_wind,
            no_stream,
            retries,
        } => {
            let mut req = RoutePlanRequest::new(&origin, &destination, speed, altitude);
            req.speed_unit = speed_unit;
            req.avoid_airspaces = Some(avoid_airspaces);
            req.avoid_terrain = Some(avoid_terrain);
            req.apply_wind = Some(!no_wind);

            if no_stream {
                return plan_route_blocking(PlannerClient::new(config)?, req).await;
            }

            let mut driver = start_driver(PlannerClient::new(config)?);
            let state = run_route(&mut driver, req, retries).await;
            (state, driver)
        }
        Commands::Local { airport, radius } => {
            let mut driver = start_driver(PlannerClient::new(config)?);
            driver.dispatch(Message::Submit(PlanRequest::Local(LocalPlanRequest {
                airport,
                radius_nm: Some(radius),
            })));
            let state = driver.run_until_settled().await;
            print_local(&driver);
            (state, driver)
        }
    };

    match state {
        PlanState::Succeeded => Ok(()),
        PlanState::Cancelled => {
            match driver.controller().cancel_origin() {
                Some(CancelOrigin::Server) => eprintln!("Cancelled by server."),
                _ => eprintln!("Cancelled."),
            }
            std::process::exit(130);
        }
        // Validation failures never leave Idle; the notifier has already reported them.
        _ => std::process::exit(1),
    }
}

async fn run_route(driver: &mut PlanDriver, req: RoutePlanRequest, retries: u32) -> PlanState {
    driver.dispatch(Message::Submit(PlanRequest::Route(req)));
    let mut attempts_left = retries;

    loop {
        let mut shown = 0usize;
        while driver.controller().is_loading() {
            if driver.pump().await.is_none() {
                break;
            }
            shown = print_new_progress(driver, shown);
        }

        let state = driver.controller().state();
        if state == PlanState::Failed && attempts_left > 0 {
            attempts_left -= 1;
            eprintln!("Retrying ({} left)...", attempts_left);
            driver.dispatch(Message::Retry);
            continue;
        }
        if state == PlanState::Succeeded {
            if let Some(plan) = driver.controller().displayed_route_plan() {
                print_route(plan);
            }
        }
        return state;
    }
}

fn print_new_progress(driver: &PlanDriver, shown: usize) -> usize {
    let c = driver.controller();
    if c.progress_total() == shown {
        return shown;
    }
    let line = c.latest_message().unwrap_or("");
    match c.latest_percent() {
        Some(p) => println!("[{:>3.0}%] {}", p * 100.0, line),
        None => println!("[ .. ] {}", line),
    }
    c.progress_total()
}

/// Single request/response round trip; Ctrl-C simply ends the process.
async fn plan_route_blocking(client: PlannerClient, req: RoutePlanRequest) -> Result<()> {
    let req = match validate_request(&PlanRequest::Route(req))? {
        PlanRequest::Route(req) => req,
        PlanRequest::Local(_) => unreachable!("validation keeps the request mode"),
    };
    println!("Planning {} → {} ...", req.origin, req.destination);
    match client.plan_route(&req).await {
        Ok(plan) => {
            println!("Route planned successfully!");
            print_route(&plan);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn print_route(plan: &FlightPlan) {
    println!();
    println!("Route:     {}", plan.route_label());
    println!("Distance:  {:.1} nm", plan.distance_nm);
    println!("Time:      {:.2} h", plan.time_hr);
    if let Some(gs) = plan.groundspeed_kt {
        println!("GS:        {:.0} kt", gs);
    }
    if let Some(fuel) = plan.fuel_required_with_reserve_gal {
        println!("Fuel:      {:.1} gal incl. reserve", fuel);
    }
    if let Some(stops) = plan.fuel_stops.as_ref().filter(|s| !s.is_empty()) {
        println!("Fuel stops: {}", stops.join(", "));
    }
    println!(
        "Departure: {}",
        format_utc_minute(plan.departure_time_utc.as_ref())
    );
    println!(
        "Arrival:   {}",
        format_utc_minute(plan.arrival_time_utc.as_ref())
    );
    if let Some(alternates) = plan.alternates.as_ref().filter(|a| !a.is_empty()) {
        let codes: Vec<&str> = alternates.iter().map(|a| a.icao.as_str()).collect();
        println!("Alternates: {}", codes.join(", "));
    }
}

fn print_local(driver: &PlanDriver) {
    let Some(plan) = driver.controller().local_plan() else {
        return;
    };
    println!(
        "{} ({}) within {:.0} nm, planned {}",
        plan.center.code(),
        plan.center.name.as_deref().unwrap_or("unnamed"),
        plan.radius_nm,
        format_utc_minute(Some(&plan.planned_at_utc))
    );
    for nearby in plan.nearby_airports.iter().take(MAX_NEARBY_LISTED) {
        println!(
            "  {:<6} {:>6.1} nm  {}",
            nearby.airport.code(),
            nearby.distance_nm,
            nearby.airport.name.as_deref().unwrap_or("")
        );
    }
    if plan.nearby_airports.len() > MAX_NEARBY_LISTED {
        println!(
            "  ... and {} more",
            plan.nearby_airports.len() - MAX_NEARBY_LISTED
        );
    }
}
