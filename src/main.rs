use std::{
    io::{self, BufReader},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use gesture_pilot::{
    action::{ActionDispatcher, KeyInjector, LogInjector},
    config::{ConfigStore, DEFAULT_CONFIG_FILE, GestureEffect},
    pipeline::{
        Engine, FrameMode,
        input::start_input_reader,
        output::{OutputEvent, publish, start_output_writer},
        run_frame_loop,
    },
    types::GestureKind,
    verifier::{GeminiVerifier, VerifierWorker},
};

const USAGE: &str = "usage:
  gesture-pilot [run] [--config PATH] [--replay] [--dry-run]
  gesture-pilot show [--config PATH]
  gesture-pilot set <gesture> <command> [description] [--config PATH]
  gesture-pilot reset [--config PATH]";

struct Args {
    command: String,
    positional: Vec<String>,
    config: PathBuf,
    replay: bool,
    dry_run: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        command: "run".to_string(),
        positional: Vec::new(),
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        replay: false,
        dry_run: false,
    };
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = PathBuf::from(path);
            }
            "--replay" => parsed.replay = true,
            "--dry-run" => parsed.dry_run = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            _ => words.push(arg),
        }
    }

    let mut words = words.into_iter();
    if let Some(command) = words.next() {
        parsed.command = command;
    }
    parsed.positional = words.collect();
    Ok(parsed)
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let config = ConfigStore::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    match args.command.as_str() {
        "run" => run(&args, config),
        "show" => {
            show(&config);
            Ok(())
        }
        "set" => {
            let [gesture, command, rest @ ..] = args.positional.as_slice() else {
                bail!("set needs a gesture and a command\n{USAGE}");
            };
            let gesture: GestureKind = gesture.parse().map_err(anyhow::Error::msg)?;
            config.set_command(gesture, command, rest.first().map(String::as_str));
            config.save()?;
            show(&config);
            Ok(())
        }
        "reset" => {
            config.reset_to_defaults();
            config.save()?;
            show(&config);
            Ok(())
        }
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}

fn show(config: &ConfigStore) {
    if let Some(path) = config.path() {
        println!("# {}", path.display());
    }
    let settings = config.snapshot();
    for (gesture, binding) in &settings.gestures {
        let effect = match &binding.effect {
            GestureEffect::Command(command) => format!("\"{command}\""),
            GestureEffect::Action(action) => format!("[{}]", action.as_str()),
        };
        println!(
            "{}{:<14} {:<16} {effect}",
            gesture.emoji(),
            gesture.as_str(),
            settings.description(*gesture)
        );
    }
}

fn run(args: &Args, config: ConfigStore) -> Result<()> {
    let settings = config.snapshot();
    let dispatcher = ActionDispatcher::new(config.clone(), build_injector(args.dry_run));
    let mut engine = Engine::new(&settings, dispatcher);

    if settings.verifier.enabled {
        match GeminiVerifier::from_env(&settings.verifier) {
            Some(Ok(verifier)) => {
                let interval = Duration::from_millis(settings.verifier.sample_interval_ms);
                engine = engine.with_verifier(VerifierWorker::spawn(verifier), interval);
            }
            Some(Err(err)) => log::warn!("verifier disabled: {err}"),
            None => log::warn!(
                "verifier enabled but ${} is not set, using local detection only",
                settings.verifier.api_key_env
            ),
        }
    }

    let mode = if args.replay {
        FrameMode::Replay
    } else {
        FrameMode::Live
    };
    log::info!("gesture-pilot running ({mode:?}), reading frames from stdin");

    let (event_tx, event_rx) = crossbeam_channel::bounded(8);
    let reader = start_input_reader(BufReader::new(io::stdin()), event_tx);
    let (output_tx, writer) = start_output_writer(io::stdout());
    publish(&output_tx, OutputEvent::config(&config));

    run_frame_loop(&mut engine, &config, event_rx, output_tx.clone(), mode);
    log::info!("input closed, final state: {:?}", engine.status());

    drop(output_tx);
    drop(engine);
    let _ = reader.join();
    let _ = writer.join();
    Ok(())
}

fn build_injector(dry_run: bool) -> Box<dyn KeyInjector> {
    if dry_run {
        return Box::new(LogInjector);
    }

    #[cfg(feature = "enigo")]
    match gesture_pilot::action::EnigoInjector::new() {
        Ok(injector) => return Box::new(injector),
        Err(err) => log::error!("{err}, falling back to logging keystrokes"),
    }

    #[cfg(not(feature = "enigo"))]
    log::warn!("built without keystroke support, logging keystrokes instead");

    Box::new(LogInjector)
}
