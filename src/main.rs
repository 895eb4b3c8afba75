// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{crate_version, Args, Parser, Subcommand};
use keystrike::actuator;
use keystrike::config::{self, Overrides, Player};
use keystrike::pitch::Policy;
use keystrike::playsync::CancelHandle;
use keystrike::scheduler::{
    AccurateTimer, EventRecord, EventType, PlaybackSummary, Scheduler, VirtualTimer,
};
use keystrike::smf::{self, TrackEnd};
use keystrike::timeline::Timeline;
use keystrike::verify;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays MIDI files on banks of on/off actuators."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PlayerArgs {
    /// The path to the player config.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// What to do with pitches outside the range.
    #[arg(long, value_enum)]
    policy: Option<Policy>,
    /// The pitch driving the first actuator.
    #[arg(long)]
    lowest: Option<u8>,
    /// The pitch driving the last actuator.
    #[arg(long)]
    highest: Option<u8>,
    /// Added to the 1-based channel index to form the channel id.
    #[arg(long)]
    base: Option<u32>,
}

impl PlayerArgs {
    fn load(&self) -> Result<Player, Box<dyn Error>> {
        Ok(
            config::load_player(self.config.as_deref())?.with_overrides(Overrides {
                lowest_pitch: self.lowest,
                highest_pitch: self.highest,
                channel_index_base: self.base,
                policy: self.policy,
            }),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Plays a MIDI file through the configured actuators.
    Play {
        /// The MIDI file to play.
        file: PathBuf,
        #[clap(flatten)]
        player: PlayerArgs,
    },
    /// Prints the actuation schedule without waiting or switching anything.
    Timeline {
        /// The MIDI file to schedule.
        file: PathBuf,
        #[clap(flatten)]
        player: PlayerArgs,
        /// Print every event as a JSON record.
        #[arg(long)]
        json: bool,
        /// Write the schedule to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Describes the structure of a MIDI file.
    Inspect {
        /// The MIDI file to inspect.
        file: PathBuf,
        #[clap(flatten)]
        player: PlayerArgs,
    },
    /// Checks a MIDI file against the player configuration.
    Verify {
        /// The MIDI file to verify.
        file: PathBuf,
        #[clap(flatten)]
        player: PlayerArgs,
    },
    /// Lists the actuators the configured backend can find.
    Devices {
        /// The path to the player config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { file, player } => {
            let player = player.load()?;
            let summary = play(&file, &player).await?;
            println!(
                "Actuated {} note event(s), skipped {}, {} tempo change(s) in {:.3}s{}.",
                summary.actuated,
                summary.skipped,
                summary.tempo_changes,
                summary.elapsed.as_secs_f64(),
                if summary.cancelled { " (cancelled)" } else { "" }
            );
        }
        Commands::Timeline {
            file,
            player,
            json,
            output,
        } => {
            let player = player.load()?;
            let records = dry_run(&file, &player)?;
            let mut out: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(io::stdout().lock()),
            };
            for record in records {
                if json {
                    writeln!(out, "{}", serde_json::to_string(&record)?)?;
                    continue;
                }
                let action = match record.event_type {
                    EventType::NoteOn => "on",
                    EventType::NoteOff => "off",
                    EventType::Tempo => continue,
                };
                if let Some(channel_id) = record.channel_id {
                    writeln!(
                        out,
                        "{}|{}|{:.5}",
                        action, channel_id, record.wall_clock_seconds
                    )?;
                }
            }
            out.flush()?;
        }
        Commands::Inspect { file, player } => {
            let player = player.load()?;
            let mapper = player.mapper()?;
            let parsed = smf::parse_file(&file, &mapper)?;
            let timeline = Timeline::merge(&parsed, &mapper);

            println!("{}:", file.display());
            println!("  Format: {:?}", parsed.header.format);
            println!("  Division: {}", parsed.header.division);
            println!("  Range: {} ({})", mapper.range(), mapper.policy());
            println!("  Tracks (declared: {}):", parsed.header.track_count);
            for track in &parsed.tracks {
                let end = match &track.end {
                    TrackEnd::EndOfTrack => "end of track".to_string(),
                    TrackEnd::ChunkEnd => "end of chunk".to_string(),
                    TrackEnd::Failed(e) => format!("failed: {}", e),
                };
                println!(
                    "  - {}: {} event(s), {} dropped, {}",
                    track.index,
                    track.events.len(),
                    track.dropped_notes,
                    end
                );
            }
            if let Some(e) = &parsed.stopped {
                println!("  Remaining tracks skipped: {}", e);
            }

            let mut scheduler = Scheduler::new(
                VirtualTimer::new(),
                actuator::dry_run_sink(),
                player.channel_index_base(),
                CancelHandle::new(),
            );
            scheduler.play(&timeline)?;
            println!(
                "  Notes: {} over {} tick(s), {:.3}s",
                timeline.note_count(),
                timeline.last_tick(),
                scheduler.timer().now().as_secs_f64()
            );
        }
        Commands::Verify { file, player } => {
            let player = player.load()?;
            let mapper = player.mapper()?;
            let bytes = std::fs::read(&file)?;
            let parsed = smf::parse_bytes(&bytes, &mapper)?;
            let timeline = Timeline::merge(&parsed, &mapper);
            let sink = actuator::get_sink(&player.actuators())?;

            let report = verify::verify(
                &bytes,
                &parsed,
                &timeline,
                sink.as_ref(),
                player.channel_index_base(),
            );
            verify::print_report(&report, &file.display().to_string());
            if report.has_errors() {
                return Err("verification failed".into());
            }
        }
        Commands::Devices { config: path } => {
            let player = config::load_player(path.as_deref())?;
            let sink = actuator::get_sink(&player.actuators())?;

            match sink.list()? {
                None => println!("{} resolves channels on demand.", sink),
                Some(ids) if ids.is_empty() => println!("No actuators found in {}.", sink),
                Some(ids) => {
                    println!("Actuators in {}:", sink);
                    for id in ids {
                        println!("- {}", id);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Plays the file in real time. Ctrl-C cancels playback, including the initial delay.
async fn play(file: &Path, player: &Player) -> Result<PlaybackSummary, Box<dyn Error>> {
    let mapper = player.mapper()?;
    let parsed = smf::parse_file(file, &mapper)?;
    let timeline = Timeline::merge(&parsed, &mapper);
    let sink = actuator::get_sink(&player.actuators())?;
    let playback_delay = player.playback_delay()?;
    let channel_index_base = player.channel_index_base();

    let cancel_handle = CancelHandle::new();
    let signal_handle = cancel_handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping playback.");
            signal_handle.cancel();
        }
    });

    let summary = tokio::task::spawn_blocking(move || {
        if !playback_delay.is_zero() {
            info!(delay = ?playback_delay, "Waiting before playback.");
            if cancel_handle.wait_timeout(playback_delay) {
                return Ok(PlaybackSummary {
                    cancelled: true,
                    ..Default::default()
                });
            }
        }
        Scheduler::new(AccurateTimer::new(), sink, channel_index_base, cancel_handle)
            .play(&timeline)
    })
    .await??;
    Ok(summary)
}

/// Schedules the file against a virtual clock and collects every record.
fn dry_run(file: &Path, player: &Player) -> Result<Vec<EventRecord>, Box<dyn Error>> {
    let mapper = player.mapper()?;
    let parsed = smf::parse_file(file, &mapper)?;
    let timeline = Timeline::merge(&parsed, &mapper);

    let mut records = Vec::with_capacity(timeline.len());
    Scheduler::new(
        VirtualTimer::new(),
        actuator::dry_run_sink(),
        player.channel_index_base(),
        CancelHandle::new(),
    )
    .play_observed(&timeline, |record| records.push(record.clone()))?;
    Ok(records)
}
