// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Director runner - headless host for director scripts
//!
//! Loads a script document, then drives the director at a fixed tick rate
//! until its threads run out or the configured tick count is reached.
//!
//! ```text
//! ordoplay_director [settings.ron]
//! ```

mod clock;
mod error;
mod notifier;
mod settings;

use clock::TickClock;
use error::Result;
use notifier::TracingNotifier;
use ordoplay_director::{Director, DirectorConfig, NodeManager, RonScriptFactory};
use settings::RunnerSettings;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["ordoplay_director=info", "director=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay Director runner v{}", env!("CARGO_PKG_VERSION"));

    let settings = match std::env::args().nth(1) {
        Some(path) => RunnerSettings::load(Path::new(&path)),
        None => Ok(RunnerSettings::default()),
    };

    if let Err(e) = settings.and_then(|settings| run(&settings)) {
        tracing::error!("Runner failed: {e}");
        std::process::exit(1);
    }
}

fn run(settings: &RunnerSettings) -> Result<()> {
    let manager = Arc::new(NodeManager::with_core());
    let config = DirectorConfig {
        node_logging: settings.node_logging,
        ..DirectorConfig::default()
    };
    let factory = Rc::new(RonScriptFactory::new(&settings.resource_root));

    let mut director = Director::new(manager, config).with_factory(factory);
    director.init(None, None)?;
    director.load_script(&settings.script)?;
    director.set_node_logging(director.node_logging() || settings.node_logging);
    report_missing(&director);

    let notifier = Rc::new(TracingNotifier::new(settings.breakpoints.iter().cloned()));
    director.set_notifier(Some(notifier.clone()));
    if settings.debug {
        director.toggle_debug_enabled(true);
    }

    let mut clock = TickClock::new(settings.tick_seconds());
    let tick = Duration::from_secs_f32(clock.tick_seconds());
    let mut last_frame = Instant::now();

    loop {
        let due = if settings.real_time {
            std::thread::sleep(tick);
            let now = Instant::now();
            let frame = now.duration_since(last_frame);
            last_frame = now;
            clock.advance(frame.as_secs_f64())
        } else {
            1
        };

        for _ in 0..due {
            // Paused families advance one step per tick.
            if director.is_debugging() {
                director.step_debugger();
            }
            director.update(clock.tick_seconds(), clock.tick_seconds());
            clock.tick();
        }

        let finished = match settings.tick_count {
            Some(count) => clock.ticks >= count,
            None => clock.ticks > 0 && !director.is_running(None),
        };
        if finished {
            break;
        }
    }

    if director.is_debugging() {
        director.toggle_debug_enabled(false);
    }

    tracing::info!(
        "Ran '{}' for {} ticks ({:.2}s simulated): {} node visits, {} breakpoint hits, {} threads left",
        director.name(),
        clock.ticks,
        clock.elapsed,
        notifier.visits(),
        notifier.breaks(),
        director.threads().len()
    );

    if let Some(path) = &settings.snapshot {
        std::fs::write(path, director.get_state().to_bytes()?)?;
        tracing::info!("Wrote execution snapshot to {}", path.display());
    }
    Ok(())
}

fn report_missing(director: &Director) {
    for library in director.missing_libraries() {
        tracing::warn!("Script uses missing node library '{}'", library);
    }
    for node_type in director.missing_node_types() {
        tracing::warn!("Script uses missing node type '{}'", node_type);
    }
    for script in director.missing_imported_scripts() {
        tracing::warn!("Script imports missing script '{}'", script);
    }
}
