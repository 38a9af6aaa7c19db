use anyhow::{Context, Result};
use clap::Parser;
use epidemic_common::{RunConfig, RunSnapshot, SeriesKind};
use epidemic_engine::{Player, Progress, Session};
use log::{debug, error, info, trace, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

/// Seconds between periodic status lines.
const PRINT_INTERVAL_SECS: f64 = 5.0;

/// Headless epidemic runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the run configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Timesteps to simulate (overrides simulation.total_steps)
    #[arg(short, long)]
    steps: Option<u32>,

    /// Output format: json, bincode or messagepack (overrides output.format)
    #[arg(short, long)]
    format: Option<String>,

    /// Advance through the threaded player at playback.interval_ms instead of stepping directly
    #[arg(long)]
    play: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting Epidemic Engine...");

    let mut config = RunConfig::load(&args.config)?;
    if let Some(steps) = args.steps {
        config.simulation.total_steps = steps;
    }
    if let Some(format) = args.format {
        config.output.format = Some(format);
    }
    info!("Using {} Rayon threads.", rayon::current_num_threads());
    debug!("Run configuration: {:#?}", config);

    let session = Session::from_config(&config)?;
    if !session.is_runnable() {
        anyhow::bail!("Nothing to run: every lane needs both a location and a disease.");
    }

    let total_steps = config.simulation.total_steps as usize;
    info!(
        "Starting simulation loop for {} steps across {} lane(s)...",
        total_steps,
        session.lanes().len()
    );
    let start_time = Instant::now();
    let session = if args.play {
        run_threaded(session, total_steps, config.playback.interval_ms)?
    } else {
        run_direct(session, total_steps)
    };
    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({} timesteps viewed).",
        total_duration.as_secs_f64(),
        session.viewed()
    );

    log_summary(&session, &config);

    info!("Saving recorded data...");
    if config.output.save_stats {
        save_snapshot(&session.snapshot(), &config)?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }
    if config.output.save_csv {
        save_series_csv(&session, &config.output.base_filename)?;
    } else {
        info!("Skipping saving CSV series as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn run_direct(mut session: Session, total_steps: usize) -> Session {
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        session.step_forward();
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let should_print_status =
            current_time.duration_since(previous_print_time).as_secs_f64() >= PRINT_INTERVAL_SECS;
        if should_print_status || step + 1 == total_steps {
            log_status(&session, total_steps, start_time);
            previous_print_time = current_time;
        } else {
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                step + 1,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }
    session
}

fn run_threaded(session: Session, total_steps: usize, interval_ms: u64) -> Result<Session> {
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut player = Player::new(session);

    if !player.play(Duration::from_millis(interval_ms))? {
        anyhow::bail!("Playback could not be started.");
    }

    let mut progress = Progress { viewed: 0, loaded: 1 };
    while progress.viewed < total_steps {
        progress = match player.progress().recv_timeout(Duration::from_secs(1)) {
            Ok(progress) => progress,
            // Messages may have been dropped; the session itself is authoritative.
            Err(RecvTimeoutError::Timeout) => player.snapshot()?,
            Err(RecvTimeoutError::Disconnected) => anyhow::bail!("Playback worker disconnected."),
        };
        if !player.is_playing() && progress.viewed < total_steps {
            anyhow::bail!("Playback stopped early at timestep {}.", progress.viewed);
        }

        let current_time = Instant::now();
        if current_time.duration_since(previous_print_time).as_secs_f64() >= PRINT_INTERVAL_SECS {
            player.with_session(|session| log_status(session, total_steps, start_time))?;
            previous_print_time = current_time;
        }
    }

    player.pause()?;
    let session = player.into_session()?;
    if session.viewed() > total_steps {
        debug!(
            "Player ran {} step(s) past the requested {} before pausing.",
            session.viewed() - total_steps,
            total_steps
        );
    }
    log_status(&session, total_steps, start_time);
    Ok(session)
}

fn log_status(session: &Session, total_steps: usize, start_time: Instant) {
    let infected: Vec<String> = session
        .lanes()
        .iter()
        .map(|lane| {
            let infected = lane
                .summary_at(session.viewed())
                .map_or(0, |summary| summary.current_infected);
            format!("{}={}", lane.name(), infected)
        })
        .collect();
    info!(
        "Step [{}/{}] | Infected: {} | Elapsed: {:.2} s",
        session.viewed(),
        total_steps,
        infected.join(", "),
        start_time.elapsed().as_secs_f64()
    );
}

fn log_summary(session: &Session, config: &RunConfig) {
    let visible = config.playback.visible;
    let limits = session.axis_limits(visible, config.playback.shared_scale);
    let labels: Vec<&str> = visible.visible().map(SeriesKind::label).collect();
    for (lane, limit) in session.lanes().iter().zip(limits) {
        let Some(summary) = lane.summary_at(session.viewed()) else {
            warn!("Lane '{}' has no data at timestep {}.", lane.name(), session.viewed());
            continue;
        };
        let series = lane.read_series_up_to(session.viewed());
        let peak_new_cases = series.get(SeriesKind::NewCases).iter().copied().max().unwrap_or(0);
        info!(
            "Lane '{}': peak new cases {} | total ever infected {} | total deaths {} | recovered {} | still infected {}",
            lane.name(),
            peak_new_cases,
            summary.all_time_cases,
            summary.deaths,
            summary.recovered,
            summary.current_infected
        );
        debug!(
            "Lane '{}' y-axis limit for [{}]: {}",
            lane.name(),
            labels.join(", "),
            limit
        );
        if lane.engine().lockdown_active() {
            info!("Lane '{}' ended in lockdown.", lane.name());
        }
    }
}

fn save_snapshot(snapshot: &RunSnapshot, config: &RunConfig) -> Result<()> {
    let base = &config.output.base_filename;
    let output_format = config.output.format.as_deref().unwrap_or("json");
    match output_format {
        "json" => write_json(snapshot, base),
        "bincode" => {
            let filename = format!("{}_run.bin", base);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), snapshot)
                .with_context(|| format!("Error serializing run to bincode '{}'", filename))?;
            info!("Run saved to {} (binary format)", filename);
            Ok(())
        }
        "messagepack" => {
            let filename = format!("{}_run.msgpack", base);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            let mut writer = BufWriter::new(file);
            rmp_serde::encode::write(&mut writer, snapshot)
                .with_context(|| format!("Error serializing run to MessagePack '{}'", filename))?;
            writer.flush()?;
            info!("Run saved to {} (MessagePack format)", filename);
            Ok(())
        }
        _ => {
            error!("Unknown output format: {}. Using JSON instead.", output_format);
            write_json(snapshot, base)
        }
    }
}

fn write_json(snapshot: &RunSnapshot, base: &str) -> Result<()> {
    let filename = format!("{}_run.json", base);
    let json_string =
        serde_json::to_string(snapshot).context("Error serializing run to JSON")?;
    let mut file = File::create(&filename)
        .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
    file.write_all(json_string.as_bytes())
        .with_context(|| format!("Error writing run JSON to file '{}'", filename))?;
    info!("Run saved to {} ({} KB)", filename, json_string.len() / 1024);
    Ok(())
}

fn save_series_csv(session: &Session, base: &str) -> Result<()> {
    for (idx, lane) in session.lanes().iter().enumerate() {
        let filename = format!("{}_lane{}_{}.csv", base, idx, file_stem(lane.name()));
        let mut writer = csv::Writer::from_path(&filename)
            .with_context(|| format!("Error creating CSV file '{}'", filename))?;
        writer.write_record(["timestep", "susceptible", "infected", "recovered", "dead", "new_cases"])?;
        for (timestep, counts) in lane.read_series_up_to(session.viewed()).iter().enumerate() {
            let mut record = vec![timestep.to_string()];
            record.extend(SeriesKind::ALL.iter().map(|&kind| counts.get(kind).to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        info!("Series for lane '{}' saved to {}", lane.name(), filename);
    }
    Ok(())
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
