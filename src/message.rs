//! Decodes raw MIDI bytes into a `MidiMessage`.
//! Decoding never fails: short buffers leave the missing fields at 0.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    PolyAftertouch,
    ControlChange,
    ProgramChange,
    ChannelAftertouch,
    PitchBend,
    Other,
}

impl MessageKind {
    /// Kind selected by the high nibble of a status byte.
    pub fn from_status(status: u8) -> Self {
        match status >> 4 {
            0x8 => Self::NoteOff,
            0x9 => Self::NoteOn,
            0xA => Self::PolyAftertouch,
            0xB => Self::ControlChange,
            0xC => Self::ProgramChange,
            0xD => Self::ChannelAftertouch,
            0xE => Self::PitchBend,
            _ => Self::Other,
        }
    }

    /// Number of data bytes this kind carries after the status byte.
    pub fn data_len(self) -> usize {
        match self {
            Self::NoteOff
            | Self::NoteOn
            | Self::PolyAftertouch
            | Self::ControlChange
            | Self::PitchBend => 2,
            Self::ProgramChange | Self::ChannelAftertouch => 1,
            Self::Other => 0,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoteOff => "note off",
            Self::NoteOn => "note on",
            Self::PolyAftertouch => "poly aftertouch",
            Self::ControlChange => "control change",
            Self::ProgramChange => "program change",
            Self::ChannelAftertouch => "channel aftertouch",
            Self::PitchBend => "pitch bend",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiMessage {
    pub kind: MessageKind,
    /// 1–16
    pub channel: u8,
    pub data1: u8,
    /// Only meaningful for kinds with two data bytes.
    pub data2: u8,
}

impl MidiMessage {
    pub fn decode(bytes: &[u8]) -> Self {
        let status = bytes.first().copied().unwrap_or(0);
        let kind = MessageKind::from_status(status);
        let data = |index: usize| {
            if index <= kind.data_len() {
                bytes.get(index).map_or(0, |b| b & 0x7F)
            } else {
                0
            }
        };

        Self {
            kind,
            channel: (status & 0x0F) + 1,
            data1: data(1),
            data2: data(2),
        }
    }

    /// The byte the resolver inspects: data2 for two-byte kinds, data1 otherwise.
    pub fn value(&self) -> u8 {
        if self.kind.data_len() == 2 {
            self.data2
        } else {
            self.data1
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch {} data1 {:#04x} data2 {:#04x}",
            self.kind, self.channel, self.data1, self.data2
        )
    }
}
