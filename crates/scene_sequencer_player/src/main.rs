// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene player - headless driver for `scene_sequencer` animations
//!
//! Loads a RON scene document, registers its nodes with an animation
//! manager and ticks the manager from a fixed-step loop, printing node
//! state as the sequences play.
//!
//! ## Usage
//!
//! ```text
//! scene_player assets/intro.ron --sequence intro --fps 30
//! ```

mod document;

use clap::Parser;
use document::{LoadedScene, SceneDocument};
use indexmap::IndexMap;
use scene_sequencer::{ManagerConfig, NodeId, SceneGraph};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "scene_player")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Play scene_sequencer animations headlessly", long_about = None)]
struct Cli {
    /// Scene document (RON)
    scene: PathBuf,

    /// Manager configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sequence to start; defaults to the configured auto-play sequence,
    /// then to the first sequence of the document
    #[arg(short, long)]
    sequence: Option<String>,

    /// Crossfade into the first frame, in seconds
    #[arg(short, long)]
    tween: Option<f32>,

    /// Scheduler ticks per second
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Stop after this many seconds even if sequences keep chaining
    #[arg(long, default_value_t = 10.0)]
    max_seconds: f32,

    /// Print node state every N ticks
    #[arg(long, default_value_t = 15)]
    print_every: u32,
}

fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scene_sequencer_player=info,scene_sequencer=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scene player v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli) {
        tracing::error!("Player failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::default(),
    };
    let document = SceneDocument::load(&cli.scene)?;
    let owner = cli
        .scene
        .file_stem()
        .map_or_else(|| "scene".to_string(), |s| s.to_string_lossy().into_owned());
    let LoadedScene { mut graph, mut manager, nodes } = document.build(owner, &config)?;

    let completions = Rc::new(Cell::new(0_u32));
    let counter = completions.clone();
    manager.set_completed_callback(move |event, _| {
        counter.set(counter.get() + 1);
        tracing::info!("[{}] sequence \"{}\" completed", event.owner, event.sequence_name);
    });

    let callback_ids: BTreeSet<String> = manager
        .sequences()
        .flat_map(|s| s.callbacks().iter().map(|c| c.callback_id.clone()))
        .collect();
    for callback_id in callback_ids {
        manager.register_keyframe_callback(callback_id, |event, _| {
            tracing::info!(
                "[{}] callback \"{}\" at {:.3}s",
                event.owner,
                event.callback_id,
                event.time
            );
        });
    }
    manager.set_sound_handler(|sound| {
        tracing::info!(
            "sound \"{}\" (pitch {}, pan {}, gain {})",
            sound.sound,
            sound.pitch,
            sound.pan,
            sound.gain
        );
    });

    let start = cli
        .sequence
        .clone()
        .or_else(|| config.auto_play_sequence.clone())
        .or_else(|| manager.sequences().next().map(|s| s.name.clone()));
    let Some(start) = start else {
        tracing::warn!("Scene has no sequences, nothing to play");
        return Ok(());
    };

    let report = match cli.tween {
        Some(tween) => manager.run_sequence(&mut graph, start.as_str(), tween)?,
        None => manager.run_sequence_default(&mut graph, start.as_str())?,
    };
    for warning in &report.warnings {
        tracing::warn!("{:?}", warning);
    }

    let step = 1.0 / cli.fps.max(1) as f32;
    let max_ticks = (cli.max_seconds.max(0.0) / step).ceil() as u32;
    let mut tick = 0;
    print_state(&graph, &nodes, 0.0);

    while manager.wants_update() && tick < max_ticks {
        tick += 1;
        let report = manager.update(&mut graph, step);
        for warning in &report.warnings {
            tracing::warn!("{:?}", warning);
        }
        if tick % cli.print_every.max(1) == 0 || report.completed.is_some() {
            print_state(&graph, &nodes, tick as f32 * step);
        }
    }

    tracing::info!(
        "Stopped after {} tick(s), {} completion(s), last completed: {}",
        tick,
        completions.get(),
        manager.last_completed_sequence_name().unwrap_or("none")
    );
    Ok(())
}

fn print_state(graph: &SceneGraph, nodes: &IndexMap<String, NodeId>, clock: f32) {
    println!("t={clock:.3}");
    for (name, id) in nodes {
        let Some(node) = graph.get(*id) else {
            continue;
        };
        println!(
            "  {name:<12} pos=({:.1}, {:.1}) rot={:.1} scale=({:.2}, {:.2}) opacity={:.2} visible={}",
            node.position[0],
            node.position[1],
            node.rotation,
            node.scale[0],
            node.scale[1],
            node.opacity,
            node.visible
        );
    }
}
