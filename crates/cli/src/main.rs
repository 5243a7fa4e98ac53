#![deny(warnings)]

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use hebrew_tones_core::config::{
    resolve_controls, resolve_optional_string, AudioSettings, Env, PlaybackControls,
    RetriggerPolicy, StdEnv, ENV_AMPLITUDE, ENV_OUTPUT_DEVICE, ENV_SPEED, ENV_VOLUME,
};
use hebrew_tones_core::pipeline::{analyze_text, Analysis, Session};
use hebrew_tones_core::playback::{
    build_schedule, duration_from_secs, AudioToneOutput, PlaybackScheduler,
};
use hebrew_tones_core::render::{render_schedule, write_wav};
use hebrew_tones_core::sequence::ToneDescriptor;
use hebrew_tones_core::stats;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_TEXT: &str = "בְּרֵאשִׁית בָּרָא אֱלֹהִים אֵת הַשָּׁמַיִם וְאֵת הָאָרֶץ";

/// Extra wait after the last tone so its tail is not cut off on exit.
const DRAIN_MARGIN: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "hebrew-tones")]
#[command(about = "Map Hebrew text to a frequency-ranked tone sequence and play it")]
struct Args {
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output device name (case-insensitive); falls back to the default device.
    /// Also read from HEBREW_TONES_OUTPUT_DEVICE
    #[arg(long)]
    output_device: Option<String>,

    /// Let a new sequence overlap one that is still playing
    #[arg(long, default_value_t = false)]
    overlap: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct ControlArgs {
    /// Playback speed [0.5, 2.0]
    #[arg(long)]
    speed: Option<f64>,

    /// Amplitude multiplier [0.1, 2.0]
    #[arg(long)]
    amplitude: Option<f64>,

    /// Output volume [0, 2.0]
    #[arg(long)]
    volume: Option<f64>,
}

impl ControlArgs {
    fn resolve(&self, env: &impl Env) -> anyhow::Result<PlaybackControls> {
        resolve_controls(self.speed, self.amplitude, self.volume, env).with_context(|| {
            format!("invalid playback controls (env: {ENV_SPEED}, {ENV_AMPLITUDE}, {ENV_VOLUME})")
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tone sequence and its statistics
    Analyze {
        text: Option<String>,

        /// Print the full analysis as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Play the whole sequence back to back
    Play {
        text: Option<String>,

        #[command(flatten)]
        controls: ControlArgs,
    },
    /// Play a single letter of the sequence
    Letter {
        text: Option<String>,

        /// Position in the recognized-letter sequence (0-based)
        #[arg(long)]
        index: usize,

        #[command(flatten)]
        controls: ControlArgs,
    },
    /// Render the sequence to a WAV file
    Render {
        text: Option<String>,

        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        controls: ControlArgs,
    },
    /// Read lines from stdin; each line replaces the text
    Interactive {
        #[command(flatten)]
        controls: ControlArgs,
    },
    /// List audio output devices
    #[cfg(feature = "playback-device-enum")]
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let settings = AudioSettings {
        output_device: resolve_optional_string(args.output_device, ENV_OUTPUT_DEVICE, &env),
        retrigger: if args.overlap {
            RetriggerPolicy::Overlap
        } else {
            RetriggerPolicy::CancelPending
        },
        ..AudioSettings::default()
    };

    match args.command {
        Command::Analyze { text, json } => {
            let analysis = analyze(text.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis)?;
            }
        }
        Command::Play { text, controls } => {
            let controls = controls.resolve(&env)?;
            let analysis = analyze(text.as_deref())?;
            let scheduler = scheduler(settings)?;
            play_and_wait(&scheduler, &analysis.descriptors, &controls).await;
        }
        Command::Letter {
            text,
            index,
            controls,
        } => {
            let controls = controls.resolve(&env)?;
            let analysis = analyze(text.as_deref())?;
            let descriptor = analysis.descriptors.get(index).with_context(|| {
                format!(
                    "index {index} out of range; the text has {} recognized letters",
                    analysis.descriptors.len()
                )
            })?;
            let scheduler = scheduler(settings)?;
            play_letter_and_wait(&scheduler, descriptor, &controls).await;
        }
        Command::Render {
            text,
            out,
            controls,
        } => {
            let controls = controls.resolve(&env)?;
            let analysis = analyze(text.as_deref())?;
            let schedule = build_schedule(&analysis.descriptors, &controls);
            let samples = render_schedule(&schedule, &settings)?;
            write_wav(&out, &samples, settings.sample_rate_hz)
                .with_context(|| format!("failed to write {}", out.display()))?;
            tracing::info!(
                path = %out.display(),
                tones = schedule.len(),
                seconds = schedule.total_secs(),
                "rendered"
            );
        }
        Command::Interactive { controls } => {
            let controls = controls.resolve(&env)?;
            let scheduler = scheduler(settings)?;
            run_interactive(&scheduler, &controls).await?;
        }
        #[cfg(feature = "playback-device-enum")]
        Command::Devices => {
            for name in hebrew_tones_core::playback::enumerate_output_device_names()? {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn analyze(text: Option<&str>) -> anyhow::Result<Analysis> {
    analyze_text(text.unwrap_or(DEFAULT_TEXT)).context("processing failed")
}

fn scheduler(settings: AudioSettings) -> anyhow::Result<PlaybackScheduler<AudioToneOutput>> {
    let retrigger = settings.retrigger;
    let output = AudioToneOutput::new(settings)?;
    Ok(PlaybackScheduler::new(output, retrigger))
}

async fn play_and_wait(
    scheduler: &PlaybackScheduler<AudioToneOutput>,
    descriptors: &[ToneDescriptor],
    controls: &PlaybackControls,
) {
    let handle = scheduler.play_sequence(descriptors, controls);
    tracing::info!(
        tones = handle.tones(),
        seconds = handle.total().as_secs_f64(),
        "playing"
    );
    let total = handle.total();
    let started = tokio::time::Instant::now();
    if handle.finished().await.is_some() {
        // the last tone was only started; let it ring out
        tokio::time::sleep_until(started + total + DRAIN_MARGIN).await;
    }
}

async fn play_letter_and_wait(
    scheduler: &PlaybackScheduler<AudioToneOutput>,
    descriptor: &ToneDescriptor,
    controls: &PlaybackControls,
) {
    scheduler.play_letter(descriptor, controls);
    let length = controls.tone_params(descriptor).duration_secs;
    tokio::time::sleep(duration_from_secs(length) + DRAIN_MARGIN).await;
}

async fn run_interactive(
    scheduler: &PlaybackScheduler<AudioToneOutput>,
    controls: &PlaybackControls,
) -> anyhow::Result<()> {
    let mut session = Session::new(DEFAULT_TEXT);
    print_session(&session)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            (":quit", _) => break,
            (":stop", _) => {
                let cancelled = scheduler.cancel_all();
                println!("stopped {cancelled} sequence(s)");
            }
            (":play", _) => {
                let handle = scheduler.play_sequence(&session.analysis().descriptors, controls);
                println!(
                    "playing {} tones ({:.2}s)",
                    handle.tones(),
                    handle.total().as_secs_f64()
                );
            }
            (":letter", arg) => {
                let picked = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| session.analysis().descriptors.get(i));
                let count = session.analysis().descriptors.len();
                match picked {
                    Some(d) => scheduler.play_letter(d, controls),
                    None => println!("usage: :letter <index below {count}>"),
                }
            }
            _ => {
                session.set_text(line);
                print_session(&session)?;
            }
        }
    }

    scheduler.cancel_all();
    Ok(())
}

fn print_session(session: &Session) -> anyhow::Result<()> {
    if let Some(message) = session.error() {
        println!("{message}");
    }
    print_analysis(session.analysis())
}

fn print_analysis(analysis: &Analysis) -> anyhow::Result<()> {
    println!(
        "{:<4} {:<4} {:<8} {:>5} {:<20} {:>8} {:>8} {:>9}",
        "#", "sym", "name", "value", "meaning", "freq Hz", "dur s", "amp"
    );
    for (i, d) in analysis.descriptors.iter().enumerate() {
        println!(
            "{:<4} {:<4} {:<8} {:>5} {:<20} {:>8.1} {:>8.3} {:>9.5}",
            i,
            d.symbol,
            d.display_name,
            d.numeric_value,
            d.meaning,
            d.frequency,
            d.duration,
            d.amplitude
        );
    }
    println!("{}", stats::to_json(&analysis.statistics)?);
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
