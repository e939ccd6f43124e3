//! JACK transport: one MIDI input port, one process handler running the
//! dispatcher once per cycle.

use std::{
    thread::sleep,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use jack::{AsyncClient, Client, ClientOptions, ClientStatus, Control, MidiIn, Port, ProcessScope};

use crate::{
    config::Config,
    dispatch::{Dispatcher, RawEvent},
    queue::ReportSink,
};

/// Open a throw-away client **without** starting the server.
/// Success ⇒ server is up and ready to accept clients.
fn jack_is_running(check_name: &str) -> bool {
    matches!(Client::new(check_name, ClientOptions::NO_START_SERVER), Ok(_))
}

/// Poll until a JACK server answers, or bail after `timeout`.
/// A zero timeout checks exactly once.
pub fn wait_for_server(client_name: &str, timeout: Duration) -> Result<()> {
    let check = format!("{client_name}-check");
    let start = Instant::now();

    loop {
        if jack_is_running(&check) {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(anyhow!("no JACK server answered within {timeout:?}"));
        }
        log::info!("Waiting for JACK server...");
        sleep(Duration::from_millis(100));
    }
}

struct MidiProcessor {
    midi_in: Port<MidiIn>,
    dispatcher: Dispatcher,
    sink: ReportSink,
}

impl jack::ProcessHandler for MidiProcessor {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let events = self.midi_in.iter(ps).map(|raw| RawEvent {
            time: raw.time,
            bytes: raw.bytes,
        });
        self.dispatcher.dispatch_cycle(events, &mut self.sink);
        Control::Continue
    }
}

struct Notifications;

impl jack::NotificationHandler for Notifications {
    fn sample_rate(&mut self, _client: &Client, srate: jack::Frames) -> Control {
        log::info!("JACK sample rate changed to {srate}");
        Control::Continue
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        log::warn!("JACK xrun detected");
        Control::Continue
    }
}

/// Active JACK client. Dropping it (or `stop`) deactivates and closes it.
pub struct JackInput {
    client: AsyncClient<Notifications, MidiProcessor>,
}

impl JackInput {
    pub fn start(config: &Config, dispatcher: Dispatcher, sink: ReportSink) -> Result<Self> {
        wait_for_server(&config.client_name, config.server_timeout())?;

        let (client, status) = Client::new(&config.client_name, ClientOptions::NO_START_SERVER)
            .context("open JACK client")?;
        if status.contains(ClientStatus::NAME_NOT_UNIQUE) {
            log::info!("JACK renamed the client to {:?}", client.name());
        }

        let midi_in = client
            .register_port(&config.port_name, MidiIn::default())
            .with_context(|| format!("register MIDI port {:?}", config.port_name))?;
        let port_name = midi_in.name().context("query MIDI port name")?;

        let sample_rate = client.sample_rate();
        let buffer_size = client.buffer_size();

        let processor = MidiProcessor {
            midi_in,
            dispatcher,
            sink,
        };
        let client = client
            .activate_async(Notifications, processor)
            .context("activate JACK client")?;

        log::info!(
            "🎹 Listening on {port_name} ({sample_rate} Hz, {buffer_size} frames, {:.1} ms)",
            buffer_size as f32 / sample_rate as f32 * 1000.0
        );

        if let Some(source) = &config.connect_from {
            match client.as_client().connect_ports_by_name(source, &port_name) {
                Ok(()) => log::info!("Connected {source} → {port_name}"),
                Err(e) => log::warn!("Auto-connect {source} failed: {e}"),
            }
        }

        Ok(Self { client })
    }

    pub fn stop(self) -> Result<()> {
        self.client
            .deactivate()
            .context("deactivate JACK client")?;
        log::info!("JACK client closed");
        Ok(())
    }
}
