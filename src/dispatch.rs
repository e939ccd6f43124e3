//! Runs one processing cycle: decode → lookup → resolve → sink, in arrival
//! order. Called from the real-time thread; nothing here allocates or blocks.

use std::sync::Arc;

use crate::{
    mapping::MappingTable,
    message::MidiMessage,
    resolver::{self, KeyAction},
};

/// One timed event as delivered by the transport, borrowed for the cycle.
#[derive(Clone, Copy, Debug)]
pub struct RawEvent<'a> {
    /// Frames since the start of the cycle.
    pub time: u32,
    pub bytes: &'a [u8],
}

/// Receives the dispatcher's output. Only `key_action` is required.
pub trait ActionSink {
    fn key_action(&mut self, action: KeyAction<'_>);

    fn decoded(&mut self, _event: &RawEvent<'_>, _message: &MidiMessage) {}

    fn unmapped(&mut self, _message: &MidiMessage) {}

    fn unsupported(&mut self, _message: &MidiMessage) {}
}

pub struct Dispatcher {
    table: Arc<MappingTable>,
}

impl Dispatcher {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }

    pub fn dispatch_cycle<'a, I, S>(&self, events: I, sink: &mut S)
    where
        I: IntoIterator<Item = RawEvent<'a>>,
        S: ActionSink + ?Sized,
    {
        for event in events {
            self.dispatch(&event, sink);
        }
    }

    pub fn dispatch<S: ActionSink + ?Sized>(&self, event: &RawEvent<'_>, sink: &mut S) {
        let message = MidiMessage::decode(event.bytes);
        sink.decoded(event, &message);

        let Some(names) = self.table.lookup(MappingTable::key_of(event.bytes)) else {
            sink.unmapped(&message);
            return;
        };

        match resolver::resolve(&message, names) {
            Ok(actions) => actions.for_each(|action| sink.key_action(action)),
            Err(_) => sink.unsupported(&message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{message::MessageKind, resolver::ActionKind};

    #[derive(Default)]
    struct Recorder {
        actions: Vec<(String, ActionKind)>,
        decoded: usize,
        unmapped: Vec<MidiMessage>,
        unsupported: Vec<MessageKind>,
    }

    impl ActionSink for Recorder {
        fn key_action(&mut self, action: KeyAction<'_>) {
            self.actions.push((action.name.to_string(), action.kind));
        }

        fn decoded(&mut self, _event: &RawEvent<'_>, _message: &MidiMessage) {
            self.decoded += 1;
        }

        fn unmapped(&mut self, message: &MidiMessage) {
            self.unmapped.push(*message);
        }

        fn unsupported(&mut self, message: &MidiMessage) {
            self.unsupported.push(message.kind);
        }
    }

    fn dispatcher(pairs: &[(&[u8], &[&str])]) -> Dispatcher {
        let table = MappingTable::build(pairs.iter().map(|(key, names)| {
            (key.to_vec(), names.iter().map(|n| n.to_string()).collect())
        }))
        .unwrap();
        Dispatcher::new(Arc::new(table))
    }

    fn run(dispatcher: &Dispatcher, cycle: &[&[u8]]) -> Recorder {
        let mut recorder = Recorder::default();
        let events = cycle
            .iter()
            .enumerate()
            .map(|(i, bytes)| RawEvent { time: i as u32, bytes });
        dispatcher.dispatch_cycle(events, &mut recorder);
        recorder
    }

    fn acts(pairs: &[(&str, ActionKind)]) -> Vec<(String, ActionKind)> {
        pairs.iter().map(|(n, k)| (n.to_string(), *k)).collect()
    }

    #[test]
    fn note_on_presses_and_zero_velocity_releases() {
        let d = dispatcher(&[(&[0x90, 0x3C], &["a"])]);
        assert_eq!(
            run(&d, &[&[0x90, 0x3C, 0x64]]).actions,
            acts(&[("a", ActionKind::Down)])
        );
        assert_eq!(
            run(&d, &[&[0x90, 0x3C, 0x00]]).actions,
            acts(&[("a", ActionKind::Up)])
        );
    }

    #[test]
    fn control_change_full_scale_only() {
        let d = dispatcher(&[(&[0xB0, 0x07], &["volup"])]);
        assert_eq!(
            run(&d, &[&[0xB0, 0x07, 0x7F]]).actions,
            acts(&[("volup", ActionKind::Down)])
        );
        let ignored = run(&d, &[&[0xB0, 0x07, 0x40]]);
        assert!(ignored.actions.is_empty());
        assert!(ignored.unsupported.is_empty());
        assert!(ignored.unmapped.is_empty());
    }

    #[test]
    fn program_change_presses() {
        let d = dispatcher(&[(&[0xC0, 0x01], &["presetA"])]);
        assert_eq!(
            run(&d, &[&[0xC0, 0x01]]).actions,
            acts(&[("presetA", ActionKind::Press)])
        );
    }

    #[test]
    fn cycle_preserves_arrival_and_name_order() {
        let d = dispatcher(&[
            (&[0x90, 0x3C], &["ctrl", "a"]),
            (&[0x90, 0x3E], &["b"]),
            (&[0x80, 0x3C], &["ctrl", "a"]),
        ]);
        let rec = run(
            &d,
            &[
                &[0x90, 0x3C, 0x40],
                &[0x90, 0x3E, 0x40],
                &[0x90, 0x3E, 0x00],
                &[0x80, 0x3C, 0x00],
            ],
        );
        assert_eq!(
            rec.actions,
            acts(&[
                ("ctrl", ActionKind::Down),
                ("a", ActionKind::Down),
                ("b", ActionKind::Down),
                ("b", ActionKind::Up),
                ("ctrl", ActionKind::Up),
                ("a", ActionKind::Up),
            ])
        );
        assert_eq!(rec.decoded, 4);
    }

    #[test]
    fn unmapped_messages_are_reported_not_acted_on() {
        let d = dispatcher(&[(&[0x90, 0x3C], &["a"])]);
        let rec = run(&d, &[&[0x90, 0x3D, 0x40], &[0xF8]]);
        assert!(rec.actions.is_empty());
        assert_eq!(rec.unmapped.len(), 2);
        assert_eq!(rec.unmapped[1].kind, MessageKind::Other);
    }

    #[test]
    fn mapped_unsupported_kind_is_reported() {
        let d = dispatcher(&[(&[0xE0, 0x00], &["bend"]), (&[0x90, 0x3C], &["a"])]);
        let rec = run(&d, &[&[0xE0, 0x00, 0x40], &[0x90, 0x3C, 0x01]]);
        assert_eq!(rec.unsupported, [MessageKind::PitchBend]);
        assert_eq!(rec.actions, acts(&[("a", ActionKind::Down)]));
    }

    #[test]
    fn truncated_events_are_inert() {
        let d = dispatcher(&[(&[0x90, 0x3C], &["a"]), (&[0xC0, 0x00], &["preset"])]);
        // status-only channel messages cannot match a two-byte key
        let rec = run(&d, &[&[0x90], &[0xC0]]);
        assert!(rec.actions.is_empty());
        assert_eq!(rec.unmapped.len(), 2);
    }
}
