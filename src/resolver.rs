//! Decides which key actions a mapped message implies.

use std::fmt;

use crate::{
    mapping::{NameId, Names},
    message::{MessageKind, MidiMessage},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Down,
    Up,
    Press,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Press => "press",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyAction<'t> {
    pub id: NameId,
    pub name: &'t str,
    pub kind: ActionKind,
}

#[derive(Clone, Copy, Debug)]
enum When {
    Always,
    Zero,
    Positive,
    Max,
}

impl When {
    fn holds(self, value: u8) -> bool {
        match self {
            Self::Always => true,
            Self::Zero => value == 0,
            Self::Positive => value > 0,
            Self::Max => value == 127,
        }
    }
}

struct Rule {
    kind: MessageKind,
    when: When,
    /// `None` ignores the message.
    action: Option<ActionKind>,
}

const fn rule(kind: MessageKind, when: When, action: Option<ActionKind>) -> Rule {
    Rule { kind, when, action }
}

/// First matching rule wins. Kinds without a rule are unsupported.
const RULES: &[Rule] = &[
    rule(MessageKind::NoteOff, When::Always, Some(ActionKind::Up)),
    rule(MessageKind::NoteOn, When::Positive, Some(ActionKind::Down)),
    // zero-velocity note on is a release
    rule(MessageKind::NoteOn, When::Zero, Some(ActionKind::Up)),
    rule(MessageKind::ControlChange, When::Zero, Some(ActionKind::Up)),
    rule(MessageKind::ControlChange, When::Max, Some(ActionKind::Down)),
    rule(MessageKind::ControlChange, When::Always, None),
    rule(MessageKind::ProgramChange, When::Always, Some(ActionKind::Press)),
];

/// The message kind has no resolution rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unsupported(pub MessageKind);

/// Action applied to every mapped name, `None` when the value is ignored.
pub fn action_for(message: &MidiMessage) -> Result<Option<ActionKind>, Unsupported> {
    let value = message.value();
    let mut known = false;

    for rule in RULES.iter().filter(|r| r.kind == message.kind) {
        known = true;
        if rule.when.holds(value) {
            return Ok(rule.action);
        }
    }

    if known {
        Ok(None)
    } else {
        Err(Unsupported(message.kind))
    }
}

pub fn resolve<'t>(message: &MidiMessage, names: Names<'t>) -> Result<Actions<'t>, Unsupported> {
    let kind = action_for(message)?;
    Ok(Actions { kind, names, next: 0 })
}

/// Key actions for one message, in mapping-name order.
pub struct Actions<'t> {
    kind: Option<ActionKind>,
    names: Names<'t>,
    next: usize,
}

impl<'t> Iterator for Actions<'t> {
    type Item = KeyAction<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.kind?;
        let (id, name) = self.names.get(self.next)?;
        self.next += 1;
        Some(KeyAction { id, name, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTable;

    fn table() -> MappingTable {
        MappingTable::build([
            (vec![0x90, 0x3C], vec!["a".to_string(), "b".to_string()]),
            (vec![0xB0, 0x07], vec!["volup".to_string()]),
            (vec![0xC0, 0x01], vec!["presetA".to_string()]),
            (vec![0xE0, 0x00], vec!["bend".to_string()]),
        ])
        .unwrap()
    }

    fn run(table: &MappingTable, bytes: &[u8]) -> Result<Vec<(String, ActionKind)>, Unsupported> {
        let message = MidiMessage::decode(bytes);
        let names = table.lookup(MappingTable::key_of(bytes)).unwrap();
        Ok(resolve(&message, names)?
            .map(|a| (a.name.to_string(), a.kind))
            .collect())
    }

    fn acts(pairs: &[(&str, ActionKind)]) -> Vec<(String, ActionKind)> {
        pairs.iter().map(|(n, k)| (n.to_string(), *k)).collect()
    }

    #[test]
    fn note_on_with_velocity_is_down_per_name() {
        let table = table();
        for velocity in 1..=127u8 {
            assert_eq!(
                run(&table, &[0x90, 0x3C, velocity]).unwrap(),
                acts(&[("a", ActionKind::Down), ("b", ActionKind::Down)])
            );
        }
    }

    #[test]
    fn note_on_without_velocity_is_up() {
        let table = table();
        assert_eq!(
            run(&table, &[0x90, 0x3C, 0x00]).unwrap(),
            acts(&[("a", ActionKind::Up), ("b", ActionKind::Up)])
        );
        // truncated note on defaults velocity to 0
        assert_eq!(
            run(&table, &[0x90, 0x3C]).unwrap(),
            acts(&[("a", ActionKind::Up), ("b", ActionKind::Up)])
        );
    }

    #[test]
    fn note_off_is_up_regardless_of_velocity() {
        let table = MappingTable::build([(vec![0x80, 0x3C], vec!["a".to_string()])]).unwrap();
        for velocity in [0u8, 64, 127] {
            assert_eq!(
                run(&table, &[0x80, 0x3C, velocity]).unwrap(),
                acts(&[("a", ActionKind::Up)])
            );
        }
    }

    #[test]
    fn control_change_edges() {
        let table = table();
        assert_eq!(
            run(&table, &[0xB0, 0x07, 0x7F]).unwrap(),
            acts(&[("volup", ActionKind::Down)])
        );
        assert_eq!(
            run(&table, &[0xB0, 0x07, 0x00]).unwrap(),
            acts(&[("volup", ActionKind::Up)])
        );
        for value in 1..=126u8 {
            assert!(run(&table, &[0xB0, 0x07, value]).unwrap().is_empty());
        }
    }

    #[test]
    fn program_change_is_press() {
        assert_eq!(
            run(&table(), &[0xC0, 0x01]).unwrap(),
            acts(&[("presetA", ActionKind::Press)])
        );
    }

    #[test]
    fn unsupported_kinds_are_reported() {
        assert_eq!(
            run(&table(), &[0xE0, 0x00, 0x40]),
            Err(Unsupported(MessageKind::PitchBend))
        );
        for status in [0xA0u8, 0xD0, 0xF0] {
            let message = MidiMessage::decode(&[status, 0x01, 0x02]);
            assert_eq!(action_for(&message), Err(Unsupported(message.kind)));
        }
    }

    #[test]
    fn action_carries_name_id() {
        let table = table();
        let message = MidiMessage::decode(&[0x90, 0x3C, 0x40]);
        let ids: Vec<_> = resolve(&message, table.lookup(&[0x90, 0x3C]).unwrap())
            .unwrap()
            .map(|a| a.id)
            .collect();
        let names: Vec<_> = ids.iter().map(|id| table.name(*id).unwrap()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
