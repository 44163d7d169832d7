use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bare_metal_modulo::{MNum, ModNumC};

use crate::error::{Error, Result};

pub type MidiByte = i16;

pub const NOTES_PER_OCTAVE: MidiByte = 12;
pub const USIZE_NOTES_PER_OCTAVE: usize = NOTES_PER_OCTAVE as usize;
pub const MAX_MIDI_VALUE: MidiByte = 127;

/// Flat-preferred spellings for the twelve pitch classes, starting at C.
const SPELLINGS: [(NoteLetter, Accidental); USIZE_NOTES_PER_OCTAVE] = [
    (NoteLetter::C, Accidental::Natural),
    (NoteLetter::D, Accidental::Flat),
    (NoteLetter::D, Accidental::Natural),
    (NoteLetter::E, Accidental::Flat),
    (NoteLetter::E, Accidental::Natural),
    (NoteLetter::F, Accidental::Natural),
    (NoteLetter::G, Accidental::Flat),
    (NoteLetter::G, Accidental::Natural),
    (NoteLetter::A, Accidental::Flat),
    (NoteLetter::A, Accidental::Natural),
    (NoteLetter::B, Accidental::Flat),
    (NoteLetter::B, Accidental::Natural),
];

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NoteLetter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteLetter {
    pub fn semitone(&self) -> MidiByte {
        match self {
            NoteLetter::C => 0,
            NoteLetter::D => 2,
            NoteLetter::E => 4,
            NoteLetter::F => 5,
            NoteLetter::G => 7,
            NoteLetter::A => 9,
            NoteLetter::B => 11,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteLetter::C),
            'D' => Some(NoteLetter::D),
            'E' => Some(NoteLetter::E),
            'F' => Some(NoteLetter::F),
            'G' => Some(NoteLetter::G),
            'A' => Some(NoteLetter::A),
            'B' => Some(NoteLetter::B),
            _ => None,
        }
    }
}

impl fmt::Display for NoteLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Accidental {
    Flat,
    Natural,
    Sharp,
}

impl Accidental {
    pub fn offset(&self) -> MidiByte {
        match self {
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
        }
    }
}

/// A musical pitch spelled as letter + accidental + octave. Two pitches are
/// the same pitch whenever their MIDI numbers agree, so `C#4 == Db4`; the
/// spelling is kept only for display.
#[derive(Debug, Copy, Clone)]
pub struct Pitch {
    letter: NoteLetter,
    accidental: Accidental,
    octave: i8,
}

impl Pitch {
    pub fn new(letter: NoteLetter, accidental: Accidental, octave: i8) -> Self {
        Pitch {
            letter,
            accidental,
            octave,
        }
    }

    /// Flat-preferred spelling of a MIDI number. Rejects anything outside
    /// 0..=127.
    pub fn from_midi(midi: MidiByte) -> Result<Self> {
        if !(0..=MAX_MIDI_VALUE).contains(&midi) {
            return Err(Error::InvalidPitch(midi));
        }
        let class = ModNumC::<usize, USIZE_NOTES_PER_OCTAVE>::new(midi as usize);
        let (letter, accidental) = SPELLINGS[class.a()];
        Ok(Pitch {
            letter,
            accidental,
            octave: (midi / NOTES_PER_OCTAVE) as i8 - 1,
        })
    }

    /// Parses spellings like `C4`, `Db4`, `F#3`, or `A-1`.
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::UnparseablePitch(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().and_then(NoteLetter::from_char).ok_or_else(bad)?;
        let rest = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('b') => (Accidental::Flat, &rest[1..]),
            Some('#') => (Accidental::Sharp, &rest[1..]),
            _ => (Accidental::Natural, rest),
        };
        let octave: i8 = octave_str.parse().map_err(|_| bad())?;
        let pitch = Pitch::new(letter, accidental, octave);
        if !(0..=MAX_MIDI_VALUE).contains(&pitch.midi()) {
            return Err(Error::InvalidPitch(pitch.midi()));
        }
        Ok(pitch)
    }

    pub fn midi(&self) -> MidiByte {
        (self.octave as MidiByte + 1) * NOTES_PER_OCTAVE
            + self.letter.semitone()
            + self.accidental.offset()
    }

    pub fn pitch_class(&self) -> MidiByte {
        self.midi().rem_euclid(NOTES_PER_OCTAVE)
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    /// The same pitch shifted by `semitones`, respelled flat-preferred.
    pub fn transposed(&self, semitones: MidiByte) -> Result<Self> {
        Pitch::from_midi(self.midi() + semitones)
    }
}

impl PartialEq for Pitch {
    fn eq(&self, other: &Self) -> bool {
        self.midi() == other.midi()
    }
}

impl Eq for Pitch {}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.midi().cmp(&other.midi())
    }
}

impl Hash for Pitch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.midi().hash(state);
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.letter,
            self.accidental.symbol(),
            self.octave
        )
    }
}
