// src/main.rs
//
// Drives a performance document at a fixed frame rate and logs what the
// renderer would receive. Without a document, plays a short built-in duet.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, error, info};

use reenact::{Performance, PerformanceFrame};

const DEMO_DOCUMENT: &str = r#"{
    "config": {
        "pulses_per_quarter_note": 96,
        "particle_seed": 7,
        "instruments": [
            {
                "name": "recorder",
                "kind": "handed",
                "channel": 0,
                "pool_size": 2,
                "left_hands": 3,
                "right_hands": 3,
                "linger_seconds": 0.25,
                "motion": {"rotation_axis": "x", "rotation_factor": 0.1, "stretch_amount": 0.2},
                "puffer": {"texture": "whistle"}
            },
            {"name": "piano", "kind": "plain", "channel": 1, "pool_size": 1}
        ]
    },
    "events": [
        {"type": "tempo", "tick": 0, "micros_per_quarter": 500000},
        {"type": "note", "tick": 0, "pitch": 72, "channel": 0, "on": true},
        {"type": "note", "tick": 96, "pitch": 76, "channel": 0, "on": true},
        {"type": "note", "tick": 192, "pitch": 72, "channel": 0, "on": false},
        {"type": "note", "tick": 288, "pitch": 76, "channel": 0, "on": false},
        {"type": "tempo", "tick": 192, "micros_per_quarter": 250000},
        {"type": "note", "tick": 0, "pitch": 48, "channel": 1, "on": true},
        {"type": "note", "tick": 384, "pitch": 48, "channel": 1, "on": false}
    ],
    "fingerings": {
        "instruments": [{
            "name": "recorder",
            "mapping_type": "hands",
            "maps": [
                {"note": 72, "lh": 0, "rh": 1},
                {"low": 73, "high": 77, "lh": 2, "rh": 2}
            ]
        }]
    }
}"#;

#[derive(Parser)]
#[command(name = "reenact-engine", about = "Play a performance document headless")]
struct Args {
    /// Performance document (JSON); plays the built-in duet if omitted
    document: Option<PathBuf>,

    /// Frames per second
    #[arg(short, long, default_value_t = 60.0)]
    fps: f64,

    /// Seconds to play; defaults to the end of the last note
    #[arg(short, long)]
    duration: Option<f64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// Print every frame as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .init();

    let json = match &args.document {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                error!("Cannot read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => DEMO_DOCUMENT.to_string(),
    };

    let mut performance = match Performance::from_json(&json) {
        Ok(performance) => performance,
        Err(e) => {
            error!("Cannot load performance: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !(args.fps.is_finite() && args.fps > 0.0) {
        error!("Frame rate must be positive, got {}", args.fps);
        return ExitCode::FAILURE;
    }

    let delta = 1.0 / args.fps;
    let duration = args
        .duration
        .unwrap_or_else(|| performance.length_seconds() + 1.0);
    let frames = (duration * args.fps).ceil() as u64;

    info!(
        "Playing {} instruments for {:.2}s at {} fps",
        performance.instruments().len(),
        duration,
        args.fps
    );

    let mut peak_clones = 0;
    let mut peak_particles = 0;

    for frame_index in 0..=frames {
        let frame = performance.tick(frame_index as f64 * delta, delta);

        peak_clones = peak_clones.max(frame.visible_clone_count());
        peak_particles = peak_particles.max(frame.particle_count());

        if args.json {
            match serde_json::to_string(&frame) {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    error!("Cannot serialize frame {}: {}", frame_index, e);
                    return ExitCode::FAILURE;
                }
            }
        }

        // About one summary line per second
        if frame_index % (args.fps.round() as u64).max(1) == 0 {
            log_summary(&frame);
        }
    }

    info!(
        "Done: peak {} visible clones, {} particles, {} forced reassignments",
        peak_clones,
        peak_particles,
        performance.forced_reassignments()
    );

    ExitCode::SUCCESS
}

fn log_summary(frame: &PerformanceFrame) {
    for instrument in &frame.instruments {
        let sounding: Vec<u8> = instrument.clones.iter().filter_map(|c| c.pitch).collect();
        info!(
            "{:>7.3}s {:<10} sounding {:?}, {} visible, {} clouds",
            frame.time,
            instrument.name,
            sounding,
            instrument.clones.iter().filter(|c| c.visible).count(),
            instrument.particles.len()
        );
    }
}
