use enum_iterator::{all, Sequence};
use rand::prelude::SliceRandom;
use rand::Rng;

use crate::pitch::{Accidental, MidiByte, NoteLetter, Pitch, NOTES_PER_OCTAVE};

/// Correct answers in one clef before `ClefMode::Auto` flips to the other.
pub const ANSWERS_PER_CLEF: usize = 4;

/// Lowest pitch a generated melody may use (middle C).
pub const MELODY_MIDI_MIN: MidiByte = 60;

/// Default melody ceiling (B5, two octaves above middle C).
pub const DEFAULT_MELODY_MIDI_MAX: MidiByte = 83;

/// Attempts at avoiding a repeat of the previous melody before the collision
/// is accepted. Bounded so a tiny pool cannot livelock the generator; the
/// occasional duplicate is documented behavior.
const MELODY_RETRY_LIMIT: usize = 10;

const MAJOR_SCALE_OFFSETS: [MidiByte; 7] = [0, 2, 4, 5, 7, 9, 11];

const CLEF_POOL_SIZE: usize = 13;

const TREBLE_POOL: [(NoteLetter, i8); CLEF_POOL_SIZE] = [
    (NoteLetter::C, 4),
    (NoteLetter::D, 4),
    (NoteLetter::E, 4),
    (NoteLetter::F, 4),
    (NoteLetter::G, 4),
    (NoteLetter::A, 4),
    (NoteLetter::B, 4),
    (NoteLetter::C, 5),
    (NoteLetter::D, 5),
    (NoteLetter::E, 5),
    (NoteLetter::F, 5),
    (NoteLetter::G, 5),
    (NoteLetter::A, 5),
];

const BASS_POOL: [(NoteLetter, i8); CLEF_POOL_SIZE] = [
    (NoteLetter::E, 2),
    (NoteLetter::F, 2),
    (NoteLetter::G, 2),
    (NoteLetter::A, 2),
    (NoteLetter::B, 2),
    (NoteLetter::C, 3),
    (NoteLetter::D, 3),
    (NoteLetter::E, 3),
    (NoteLetter::F, 3),
    (NoteLetter::G, 3),
    (NoteLetter::A, 3),
    (NoteLetter::B, 3),
    (NoteLetter::C, 4),
];

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Sequence)]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    pub fn other(&self) -> Self {
        match self {
            Clef::Treble => Clef::Bass,
            Clef::Bass => Clef::Treble,
        }
    }

    /// The fixed 13-note pool this clef draws sight-reading problems from.
    pub fn pool(&self) -> Vec<Pitch> {
        let spellings = match self {
            Clef::Treble => &TREBLE_POOL,
            Clef::Bass => &BASS_POOL,
        };
        spellings
            .iter()
            .map(|(letter, octave)| Pitch::new(*letter, Accidental::Natural, *octave))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Sequence)]
pub enum ClefMode {
    Auto,
    Treble,
    Bass,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Sequence)]
pub enum Interval {
    Minor2nd,
    Major2nd,
    Minor3rd,
    Major3rd,
    Perfect4th,
    Tritone,
    Perfect5th,
    Minor6th,
    Major6th,
    Minor7th,
    Major7th,
    Octave,
}

impl Interval {
    pub fn semitones(&self) -> MidiByte {
        match self {
            Interval::Minor2nd => 1,
            Interval::Major2nd => 2,
            Interval::Minor3rd => 3,
            Interval::Major3rd => 4,
            Interval::Perfect4th => 5,
            Interval::Tritone => 6,
            Interval::Perfect5th => 7,
            Interval::Minor6th => 8,
            Interval::Major6th => 9,
            Interval::Minor7th => 10,
            Interval::Major7th => 11,
            Interval::Octave => 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interval::Minor2nd => "Minor 2nd",
            Interval::Major2nd => "Major 2nd",
            Interval::Minor3rd => "Minor 3rd",
            Interval::Major3rd => "Major 3rd",
            Interval::Perfect4th => "Perfect 4th",
            Interval::Tritone => "Tritone",
            Interval::Perfect5th => "Perfect 5th",
            Interval::Minor6th => "Minor 6th",
            Interval::Major6th => "Major 6th",
            Interval::Minor7th => "Minor 7th",
            Interval::Major7th => "Major 7th",
            Interval::Octave => "Octave",
        }
    }
}

/// The eleven major keys the ear trainer offers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Sequence)]
pub enum MajorKey {
    C,
    G,
    D,
    A,
    E,
    B,
    F,
    BFlat,
    EFlat,
    AFlat,
    DFlat,
}

impl MajorKey {
    pub fn root_pitch_class(&self) -> MidiByte {
        match self {
            MajorKey::C => 0,
            MajorKey::G => 7,
            MajorKey::D => 2,
            MajorKey::A => 9,
            MajorKey::E => 4,
            MajorKey::B => 11,
            MajorKey::F => 5,
            MajorKey::BFlat => 10,
            MajorKey::EFlat => 3,
            MajorKey::AFlat => 8,
            MajorKey::DFlat => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MajorKey::C => "C",
            MajorKey::G => "G",
            MajorKey::D => "D",
            MajorKey::A => "A",
            MajorKey::E => "E",
            MajorKey::B => "B",
            MajorKey::F => "F",
            MajorKey::BFlat => "Bb",
            MajorKey::EFlat => "Eb",
            MajorKey::AFlat => "Ab",
            MajorKey::DFlat => "Db",
        }
    }

    pub fn contains(&self, midi: MidiByte) -> bool {
        let relative = (midi - self.root_pitch_class()).rem_euclid(NOTES_PER_OCTAVE);
        MAJOR_SCALE_OFFSETS.contains(&relative)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NoteProblem {
    pub pitch: Pitch,
    pub clef: Clef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalProblem {
    pub base: Pitch,
    pub upper: Pitch,
    pub interval: Interval,
    pub choices: Vec<Interval>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MelodyProblem {
    pub pitches: Vec<Pitch>,
    pub key: MajorKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Note(NoteProblem),
    Interval(IntervalProblem),
    Melody(MelodyProblem),
}

/// Picks the next sight-reading note. In `Auto` mode the clef flips after
/// `ANSWERS_PER_CLEF` correct answers in the active clef; the pinned modes
/// never flip. The previous pitch is rejection-sampled away, which terminates
/// because every pool holds more than one pitch.
pub fn generate_note<R: Rng>(
    previous: Option<Pitch>,
    current_clef: Clef,
    answered_in_clef: usize,
    mode: ClefMode,
    rng: &mut R,
) -> NoteProblem {
    let clef = match mode {
        ClefMode::Treble => Clef::Treble,
        ClefMode::Bass => Clef::Bass,
        ClefMode::Auto => {
            if answered_in_clef >= ANSWERS_PER_CLEF {
                current_clef.other()
            } else {
                current_clef
            }
        }
    };
    let pool = clef.pool();
    let mut pitch = pool[rng.gen_range(0..pool.len())];
    while previous == Some(pitch) && pool.len() > 1 {
        pitch = pool[rng.gen_range(0..pool.len())];
    }
    NoteProblem { pitch, clef }
}

/// Builds an aural interval question: a base note from {E4, F4}, a quality
/// drawn uniformly from the twelve, and a shuffled four-way multiple choice
/// containing the right answer exactly once.
pub fn generate_interval<R: Rng>(previous_base: Option<Pitch>, rng: &mut R) -> IntervalProblem {
    let bases = [
        Pitch::new(NoteLetter::E, Accidental::Natural, 4),
        Pitch::new(NoteLetter::F, Accidental::Natural, 4),
    ];
    let mut base = bases[rng.gen_range(0..bases.len())];
    if previous_base == Some(base) {
        base = if base == bases[0] { bases[1] } else { bases[0] };
    }

    let qualities: Vec<Interval> = all::<Interval>().collect();
    let interval = qualities[rng.gen_range(0..qualities.len())];
    let upper = base
        .transposed(interval.semitones())
        .expect("an octave above F4 is still a valid MIDI pitch");

    let mut wrong: Vec<Interval> = qualities.into_iter().filter(|q| *q != interval).collect();
    wrong.shuffle(rng);
    let mut choices: Vec<Interval> = wrong.into_iter().take(3).collect();
    choices.push(interval);
    choices.shuffle(rng);

    IntervalProblem {
        base,
        upper,
        interval,
        choices,
    }
}

/// All pitches diatonic to `key` between middle C and `midi_max`, ascending.
pub fn diatonic_pool(key: MajorKey, midi_max: MidiByte) -> Vec<Pitch> {
    (MELODY_MIDI_MIN..=midi_max)
        .filter(|midi| key.contains(*midi))
        .filter_map(|midi| Pitch::from_midi(midi).ok())
        .collect()
}

/// Draws a melody of distinct diatonic pitches. A request longer than the
/// pool saturates to the pool size. Up to `MELODY_RETRY_LIMIT` redraws avoid
/// repeating `previous`; after that the duplicate is returned as-is.
pub fn generate_melody<R: Rng>(
    key: MajorKey,
    length: usize,
    previous: Option<&[Pitch]>,
    midi_max: MidiByte,
    rng: &mut R,
) -> MelodyProblem {
    let pool = diatonic_pool(key, midi_max);
    let take = length.min(pool.len());

    let mut draw = |rng: &mut R| {
        let mut shuffled = pool.clone();
        shuffled.shuffle(rng);
        shuffled.truncate(take);
        shuffled
    };

    let mut pitches = draw(rng);
    let mut attempts = 1;
    while attempts < MELODY_RETRY_LIMIT && previous == Some(pitches.as_slice()) {
        pitches = draw(rng);
        attempts += 1;
    }

    MelodyProblem { pitches, key }
}
