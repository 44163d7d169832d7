use std::sync::Arc;

use crossbeam_queue::SegQueue;
use midi_msg::{ChannelVoiceMsg, MidiMsg};
use midir::{Ignore, InitError, MidiInput, MidiInputConnection, MidiInputPort, MidiInputPorts};

use crate::error::Error;
use crate::matcher::KeyEvent;
use crate::pitch::Pitch;

pub const SHOW_KEY_EVENTS: bool = false;

#[derive(Clone)]
pub enum MidiScenario {
    StartingUp,
    NoInputPorts(String),
    InputPortSelected { in_port: MidiInputPort },
    MultipleInputPorts { in_ports: MidiInputPorts },
}

impl MidiScenario {
    pub fn new(midi_in: &mut Result<MidiInput, InitError>) -> Self {
        match midi_in {
            Ok(ref mut midi_in) => {
                midi_in.ignore(Ignore::None);
                let in_ports = midi_in.ports();
                match in_ports.len() {
                    0 => MidiScenario::NoInputPorts(
                        "No MIDI devices found\nRestart program after MIDI device plugged in"
                            .to_string(),
                    ),
                    1 => MidiScenario::InputPortSelected {
                        in_port: in_ports[0].clone(),
                    },
                    _ => MidiScenario::MultipleInputPorts {
                        in_ports: in_ports.clone(),
                    },
                }
            }
            Err(e) => MidiScenario::NoInputPorts(e.to_string()),
        }
    }
}

/// Decodes one wire message into a keystroke. A note-on at velocity zero is
/// the running-status spelling of a release. Messages that are not
/// keystrokes, or that carry a pitch outside the playable range, give `None`.
pub fn key_event_from(msg: &MidiMsg) -> Option<KeyEvent> {
    if let MidiMsg::ChannelVoice { msg, .. } = msg {
        match msg {
            ChannelVoiceMsg::NoteOn { note, velocity } => {
                let pitch = Pitch::from_midi(*note as i16).ok()?;
                if *velocity == 0 {
                    Some(KeyEvent::NoteOff { pitch })
                } else {
                    Some(KeyEvent::NoteOn {
                        pitch,
                        velocity: *velocity,
                    })
                }
            }
            ChannelVoiceMsg::NoteOff { note, .. } => {
                let pitch = Pitch::from_midi(*note as i16).ok()?;
                Some(KeyEvent::NoteOff { pitch })
            }
            _ => None,
        }
    } else {
        None
    }
}

pub fn start_input_thread(
    keystrokes: Arc<SegQueue<KeyEvent>>,
    midi_in: MidiInput,
    in_port: MidiInputPort,
) {
    std::thread::spawn(move || match start_input(keystrokes, midi_in, in_port) {
        Ok(_conn_in) => loop {
            std::thread::park();
        },
        Err(e) => eprintln!("MIDI input unavailable: {e}"),
    });
}

/// Start the input connection. The returned value needs to remain in scope
/// until we are finished receiving MIDI input.
pub fn start_input(
    keystrokes: Arc<SegQueue<KeyEvent>>,
    midi_in: MidiInput,
    in_port: MidiInputPort,
) -> Result<MidiInputConnection<()>, Error> {
    midi_in
        .connect(
            &in_port,
            "midir-read-input",
            move |_stamp, message, _| {
                if let Ok((msg, _len)) = MidiMsg::from_midi(message) {
                    if SHOW_KEY_EVENTS {
                        println!("midi input: {msg:?}");
                    }
                    if let Some(event) = key_event_from(&msg) {
                        keystrokes.push(event);
                    }
                }
            },
            (),
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))
}
