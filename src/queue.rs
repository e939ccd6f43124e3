//! Lock-free hand-off from the real-time thread to the key-injection worker.
//! The producer side never blocks. Key actions and diagnostics travel on
//! separate rings, so a burst of diagnostics cannot cost a key report. A full
//! ring drops the report and counts it.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::{
    dispatch::{ActionSink, RawEvent},
    mapping::NameId,
    message::MidiMessage,
    resolver::{ActionKind, KeyAction},
};

/// Up to three raw bytes, copied so they can cross the ring.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawBytes {
    buf: [u8; 3],
    len: u8,
}

impl RawBytes {
    pub fn copy_from(bytes: &[u8]) -> Self {
        let mut buf = [0; 3];
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Self { buf, len: len as u8 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

impl fmt::Debug for RawBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x?}", self.as_slice())
    }
}

/// Binary, one group per byte.
impl fmt::Display for RawBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:08b}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyReport {
    pub id: NameId,
    pub kind: ActionKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    Decoded {
        time: u32,
        raw: RawBytes,
        message: MidiMessage,
    },
    Unmapped(MidiMessage),
    Unsupported(MidiMessage),
}

/// Both rings get `capacity` slots.
pub fn report_channel(capacity: usize, diagnostics: bool) -> (ReportSink, ReportQueue) {
    let (keys_tx, keys_rx) = RingBuffer::new(capacity.max(1));
    let (diag_tx, diag_rx) = RingBuffer::new(capacity.max(1));
    let overruns = Arc::new(AtomicUsize::new(0));
    (
        ReportSink {
            keys: keys_tx,
            diagnostics: diag_tx,
            overruns: overruns.clone(),
            verbose: diagnostics,
        },
        ReportQueue {
            keys: keys_rx,
            diagnostics: diag_rx,
            overruns,
        },
    )
}

/// Real-time side. Owned by the transport callback.
pub struct ReportSink {
    keys: Producer<KeyReport>,
    diagnostics: Producer<Diagnostic>,
    /// Dropped key reports.
    overruns: Arc<AtomicUsize>,
    /// Forward decoded/unmapped reports too, not only unsupported kinds.
    verbose: bool,
}

impl ReportSink {
    /// Dropped silently when full.
    fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic).ok();
    }
}

impl ActionSink for ReportSink {
    fn key_action(&mut self, action: KeyAction<'_>) {
        let report = KeyReport {
            id: action.id,
            kind: action.kind,
        };
        if self.keys.push(report).is_err() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn decoded(&mut self, event: &RawEvent<'_>, message: &MidiMessage) {
        if self.verbose {
            self.diagnose(Diagnostic::Decoded {
                time: event.time,
                raw: RawBytes::copy_from(event.bytes),
                message: *message,
            });
        }
    }

    fn unmapped(&mut self, message: &MidiMessage) {
        if self.verbose {
            self.diagnose(Diagnostic::Unmapped(*message));
        }
    }

    fn unsupported(&mut self, message: &MidiMessage) {
        self.diagnose(Diagnostic::Unsupported(*message));
    }
}

/// Worker side.
pub struct ReportQueue {
    keys: Consumer<KeyReport>,
    diagnostics: Consumer<Diagnostic>,
    overruns: Arc<AtomicUsize>,
}

impl ReportQueue {
    pub fn pop_key(&mut self) -> Option<KeyReport> {
        self.keys.pop().ok()
    }

    pub fn pop_diagnostic(&mut self) -> Option<Diagnostic> {
        self.diagnostics.pop().ok()
    }

    /// Key reports dropped since the last call.
    pub fn take_overruns(&self) -> usize {
        self.overruns.swap(0, Ordering::Relaxed)
    }

    /// The sink is gone and nothing is left to drain.
    pub fn is_finished(&self) -> bool {
        self.keys.is_abandoned() && self.keys.is_empty() && self.diagnostics.is_empty()
    }
}
