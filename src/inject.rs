//! Non-real-time side: drains the report ring, injects keys and logs.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result};

use crate::{
    keys::KeySequence,
    mapping::{MappingTable, NameId},
    queue::{Diagnostic, KeyReport, ReportQueue},
    resolver::ActionKind,
};

/// Sleep between polls of an empty ring.
const IDLE_POLL: Duration = Duration::from_millis(1);

pub trait KeyInjector: Send {
    fn key_down(&mut self, keys: &KeySequence, delay: Duration) -> Result<()>;
    fn key_up(&mut self, keys: &KeySequence, delay: Duration) -> Result<()>;
    fn key_press(&mut self, keys: &KeySequence, delay: Duration) -> Result<()>;
}

/// Everything the worker thread owns.
struct Injection<K> {
    injector: K,
    table: Arc<MappingTable>,
    sequences: Vec<KeySequence>,
    delay: Duration,
    /// Sequences currently pressed down, indexed by `NameId`.
    held: Vec<bool>,
}

impl<K: KeyInjector> Injection<K> {
    fn new(
        injector: K,
        table: Arc<MappingTable>,
        sequences: Vec<KeySequence>,
        delay: Duration,
    ) -> Self {
        let held = vec![false; sequences.len()];
        Self {
            injector,
            table,
            sequences,
            delay,
            held,
        }
    }

    fn diagnose(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::Decoded { time, raw, message } => {
                log::trace!("raw MIDI @{time}: {raw}");
                log::debug!("decoded {message}");
            }
            Diagnostic::Unmapped(message) => log::debug!("no mapping for {message}"),
            Diagnostic::Unsupported(message) => log::info!(
                "{} is not handled (only note on/off, control change and program change), ignoring",
                message.kind
            ),
        }
    }

    fn inject(&mut self, report: KeyReport) {
        let KeyReport { id, kind } = report;
        let name = self.table.name(id).unwrap_or("?");
        let Some(keys) = self.sequences.get(id.index()) else {
            log::warn!("no key sequence for {name:?}");
            return;
        };

        let result = match kind {
            ActionKind::Down => self.injector.key_down(keys, self.delay),
            ActionKind::Up => self.injector.key_up(keys, self.delay),
            ActionKind::Press => self.injector.key_press(keys, self.delay),
        };

        match result {
            Ok(()) => {
                match kind {
                    ActionKind::Down => self.held[id.index()] = true,
                    ActionKind::Up => self.held[id.index()] = false,
                    ActionKind::Press => {}
                }
                log::info!("mapped key {name} ({kind})");
            }
            Err(e) => log::warn!("injecting {name} ({kind}) failed: {e:#}"),
        }
    }

    /// Lifts every sequence still held down.
    fn release_held(&mut self) {
        for (index, held) in self.held.iter_mut().enumerate() {
            if !std::mem::take(held) {
                continue;
            }
            let keys = &self.sequences[index];
            if let Err(e) = self.injector.key_up(keys, self.delay) {
                log::warn!("releasing {keys} failed: {e:#}");
            } else {
                log::debug!("released held {keys}");
            }
        }
    }

    /// Handles everything currently queued, keys before diagnostics.
    /// Returns false when the ring was empty.
    fn drain(&mut self, queue: &mut ReportQueue) -> bool {
        let mut busy = false;
        while let Some(report) = queue.pop_key() {
            self.inject(report);
            busy = true;
        }
        while let Some(diagnostic) = queue.pop_diagnostic() {
            self.diagnose(diagnostic);
            busy = true;
        }

        // a dropped Up may have left a key down
        let overruns = queue.take_overruns();
        if overruns > 0 {
            log::warn!("key queue full, dropped {overruns} key actions; releasing held keys");
            self.release_held();
        }
        busy
    }

    fn run(mut self, mut queue: ReportQueue) {
        loop {
            if self.drain(&mut queue) {
                continue;
            }
            if queue.is_finished() {
                break;
            }
            thread::sleep(IDLE_POLL);
        }
        self.release_held();
        log::debug!("key injector stopped");
    }
}

/// Worker thread; exits once the transport drops its sink and the ring is
/// drained. Joined on drop.
pub struct KeyWorker {
    handle: Option<JoinHandle<()>>,
}

impl KeyWorker {
    pub fn spawn<K: KeyInjector + 'static>(
        queue: ReportQueue,
        injector: K,
        table: Arc<MappingTable>,
        sequences: Vec<KeySequence>,
        delay: Duration,
    ) -> Result<Self> {
        let injection = Injection::new(injector, table, sequences, delay);
        let handle = thread::Builder::new()
            .name("key-injector".into())
            .spawn(move || injection.run(queue))
            .context("spawn key injector thread")?;

        Ok(Self {
            handle: Some(handle),
        })
    }
}

impl Drop for KeyWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("key injector thread panicked");
            }
        }
    }
}
