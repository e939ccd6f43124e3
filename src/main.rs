use std::{io, sync::Arc, sync::mpsc::channel, thread};

use anyhow::{Context, Result};
use env_logger::Env;
use log::LevelFilter;

use midi2key::{
    config::{self, Backend, Config},
    dispatch::Dispatcher,
    inject::KeyWorker,
    jack_input::JackInput,
    keys::{self, UinputKeyboard},
    mapping::MappingTable,
    midi::MidirInput,
    queue,
};

enum Transport {
    Jack(JackInput),
    Alsa(MidirInput),
}

impl Transport {
    fn stop(self) -> Result<()> {
        match self {
            Self::Jack(jack) => jack.stop(),
            Self::Alsa(alsa) => {
                alsa.stop();
                Ok(())
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let path = config::config_path();
    log::info!("📄 Using config {:?}", path);
    let mut config = Config::load(&path)?;

    let table = MappingTable::build(std::mem::take(&mut config.message_map))
        .with_context(|| format!("invalid message_map in {}", path.display()))?;
    let table = Arc::new(table);
    let sequences = keys::parse_all(&table)
        .with_context(|| format!("invalid key name in {}", path.display()))?;
    log::info!("{} mapped messages, {} key sequences", table.len(), sequences.len());
    if table.is_empty() {
        log::warn!("message_map is empty, nothing will be injected");
    }

    let (quit_tx, quit_rx) = channel::<()>();
    let signal_tx = quit_tx.clone();
    ctrlc::set_handler(move || {
        signal_tx.send(()).ok();
    })
    .context("install signal handler")?;

    // pipeline: MIDI → dispatcher → ring → key injector
    let keyboard = UinputKeyboard::create(&config.client_name)?;
    let diagnostics = log::max_level() >= LevelFilter::Debug;
    let (sink, queue) = queue::report_channel(config.queue_capacity, diagnostics);
    let worker = KeyWorker::spawn(queue, keyboard, table.clone(), sequences, config.key_delay())?;

    let dispatcher = Dispatcher::new(table);
    let transport = match config.backend {
        Backend::Jack => Transport::Jack(JackInput::start(&config, dispatcher, sink)?),
        Backend::Alsa => Transport::Alsa(MidirInput::connect(&config, dispatcher, sink)?),
    };

    // EOF on stdin (no terminal) leaves only the signal path.
    thread::spawn(move || {
        let mut line = String::new();
        if matches!(io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            quit_tx.send(()).ok();
        }
    });

    log::info!("✅ Running. Press Enter or Ctrl-C to quit.");
    quit_rx.recv().ok();

    // Transport first: dropping its sink lets the worker drain and exit.
    let stopped = transport.stop();
    drop(worker);
    stopped
}
