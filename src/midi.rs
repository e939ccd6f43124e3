//! ALSA transport through midir. Every incoming message is its own cycle.

use anyhow::{Result, anyhow};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};

use crate::{
    config::Config,
    dispatch::{Dispatcher, RawEvent},
    queue::ReportSink,
};

pub struct MidirInput {
    conn: MidiInputConnection<()>, // RAII – stays alive
}

impl MidirInput {
    pub fn connect(config: &Config, dispatcher: Dispatcher, mut sink: ReportSink) -> Result<Self> {
        let mut midi_in = MidiInput::new(&config.client_name)?;
        midi_in.ignore(Ignore::None);

        let port = find_port(&midi_in, config.port_match.as_deref())?;
        let name = midi_in.port_name(&port)?;
        let conn = midi_in
            .connect(
                &port,
                &config.port_name,
                move |_stamp, msg, _| {
                    dispatcher.dispatch(&RawEvent { time: 0, bytes: msg }, &mut sink);
                },
                (),
            )
            .map_err(|e| anyhow!("connect {name}: {e}"))?;

        log::info!("🎹 Connected to {name}");
        Ok(Self { conn })
    }

    pub fn stop(self) {
        self.conn.close();
        log::info!("MIDI connection closed");
    }
}

// ─────────────────── helpers ─────────────────────────────────────────────────

fn find_port(midi_in: &MidiInput, pattern: Option<&str>) -> Result<MidiInputPort> {
    let ports = midi_in.ports();
    let Some(pattern) = pattern else {
        return ports
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no MIDI input ports available"));
    };

    ports
        .into_iter()
        .find(|port| {
            midi_in
                .port_name(port)
                .is_ok_and(|name| port_matches(&name, pattern))
        })
        .ok_or_else(|| anyhow!("no MIDI input port matching {pattern:?}"))
}

fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_match_is_case_insensitive_substring() {
        assert!(port_matches("nanoKONTROL2:nanoKONTROL2 MIDI 1 20:0", "nanokontrol"));
        assert!(port_matches("Midi Through:Midi Through Port-0 14:0", "THROUGH"));
        assert!(!port_matches("Midi Through:Midi Through Port-0 14:0", "usb"));
    }
}
