//! Motif - musical idea capture
//!
//! Command-line front end for the click engine. Runs the metronome with the
//! requested grid, prints each beat as it fires, and stops after the given
//! number of seconds.
//!
//! Usage: motif [BPM] [BEATS] [CLICKS] [options]
//!   --ramp TARGET SECS   ramp linearly from BPM to TARGET over SECS
//!   --pre-count          play one count-in measure before the main grid
//!   --visual-only        print beats without audible clicks
//!   --seconds N          run length in seconds (default 10)

use std::process;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use motif_metronome::{ClickOutput, Metronome, MetronomeConfig};

struct Options {
    config: MetronomeConfig,
    ramp: Option<(f64, Duration)>,
    pre_count: bool,
    seconds: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("motif: {err}");
            eprintln!("usage: motif [BPM] [BEATS] [CLICKS] [--ramp TARGET SECS] [--pre-count] [--visual-only] [--seconds N]");
            process::exit(2);
        }
    };

    if let Err(err) = run(options) {
        eprintln!("motif: {err:#}");
        process::exit(1);
    }
}

fn parse_args() -> Result<Options> {
    let mut config = MetronomeConfig::default();
    let mut ramp = None;
    let mut pre_count = false;
    let mut seconds = 10u64;

    let mut args = std::env::args().skip(1);
    let mut positional = 0;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ramp" => {
                let target: f64 = args
                    .next()
                    .context("--ramp needs a target BPM")?
                    .parse()
                    .context("invalid ramp target")?;
                let secs: u64 = args
                    .next()
                    .context("--ramp needs a duration in seconds")?
                    .parse()
                    .context("invalid ramp duration")?;
                ramp = Some((target, Duration::from_secs(secs)));
            }
            "--pre-count" => pre_count = true,
            "--visual-only" => config.visual_only = true,
            "--seconds" => {
                seconds = args
                    .next()
                    .context("--seconds needs a value")?
                    .parse()
                    .context("invalid run length")?;
            }
            value => {
                match positional {
                    0 => config.bpm = value.parse().context("invalid BPM")?,
                    1 => {
                        config.beats_per_measure =
                            value.parse().context("invalid beats per measure")?
                    }
                    2 => {
                        config.clicks_per_beat =
                            value.parse().context("invalid clicks per beat")?
                    }
                    _ => bail!("unexpected argument: {value}"),
                }
                positional += 1;
            }
        }
    }

    Ok(Options {
        config,
        ramp,
        pre_count,
        seconds,
    })
}

fn run(options: Options) -> Result<()> {
    let mut metronome = Metronome::new(options.config);
    let beats = metronome.subscribe();

    // An audio device is optional: without one the run is visual-only
    match ClickOutput::new() {
        Ok(output) => {
            metronome.attach_click_output(&output);
            run_clicks(&mut metronome, &beats, &options, Some(output))
        }
        Err(err) => {
            warn!("no click audio: {err}");
            run_clicks(&mut metronome, &beats, &options, None)
        }
    }
}

fn run_clicks(
    metronome: &mut Metronome,
    beats: &crossbeam_channel::Receiver<motif_metronome::BeatEvent>,
    options: &Options,
    _output: Option<ClickOutput>,
) -> Result<()> {
    if let Some((target, duration)) = options.ramp {
        let start = options.config.bpm;
        metronome.set_tempo_ramp(start, target, duration)?;
        info!(start, target, "tempo ramp armed");
    }

    if options.pre_count {
        metronome.start_with_pre_count(|| info!("pre-count complete, recording grid live"))?;
    } else {
        metronome.start()?;
    }

    let status = metronome.status();
    info!(
        bpm = status.bpm,
        beats = options.config.beats_per_measure,
        clicks = options.config.clicks_per_beat,
        "metronome running"
    );

    let deadline = Instant::now() + Duration::from_secs(options.seconds);
    while Instant::now() < deadline {
        let Ok(event) = beats.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        let marker = if event.is_accent() {
            "|"
        } else if event.is_subdivision() {
            "."
        } else {
            "+"
        };
        let phase = if event.is_pre_count { " (pre-count)" } else { "" };
        println!(
            "{marker} beat {}.{}{phase}",
            event.beat_index + 1,
            event.subdivision_index + 1
        );
    }

    metronome.stop();
    info!("done");
    Ok(())
}
