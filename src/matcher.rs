use std::collections::BTreeSet;

use ordered_float::OrderedFloat;

use crate::clock::{EventClock, SessionCommand};
use crate::pitch::Pitch;
use crate::session::{PracticeMode, PracticeSession};

/// Gap between successive notes when a listening target is played back.
pub const ECHO_NOTE_SPACING_SECONDS: f64 = 0.75;

/// How long each played-back target note sounds.
pub const ECHO_NOTE_DURATION_SECONDS: f64 = 0.5;

/// A keystroke after wire decoding. Velocity is kept for the audio echo;
/// matching only cares about which key it was.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    NoteOn { pitch: Pitch, velocity: u8 },
    NoteOff { pitch: Pitch },
}

impl KeyEvent {
    pub fn pitch(&self) -> Pitch {
        match self {
            KeyEvent::NoteOn { pitch, .. } => *pitch,
            KeyEvent::NoteOff { pitch } => *pitch,
        }
    }
}

/// Routes live keystrokes into a practice session. Tracks which keys are
/// currently held so a chord target only advances once every one of its
/// pitches is down at the same time.
pub struct LiveMatcher {
    held: BTreeSet<Pitch>,
}

impl LiveMatcher {
    pub fn new() -> Self {
        LiveMatcher {
            held: BTreeSet::new(),
        }
    }

    pub fn held(&self) -> &BTreeSet<Pitch> {
        &self.held
    }

    /// Applies one keystroke. Every note-on echoes audibly; in wait-for-me
    /// mode a keystroke outside the target lights the wrong-note indicator
    /// without losing the player's place, and a completed target advances
    /// the cursor.
    pub fn handle(&mut self, event: KeyEvent, session: &mut PracticeSession) {
        match event {
            KeyEvent::NoteOn { pitch, .. } => {
                self.held.insert(pitch);
                session.echo_keystroke(pitch);
                if session.mode() != PracticeMode::WaitForMe {
                    return;
                }
                let (in_target, satisfied) = match session.pending_target() {
                    Some(target) => (
                        target.contains(&pitch),
                        target.iter().all(|p| self.held.contains(p)),
                    ),
                    None => return,
                };
                if !in_target {
                    session.flag_wrong_note(pitch);
                } else if satisfied {
                    session.clear_wrong_note();
                    session.advance();
                }
            }
            KeyEvent::NoteOff { pitch } => {
                self.held.remove(&pitch);
            }
        }
    }
}

/// Running tally of graded attempts, with the current and best streaks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_attempts: usize,
    pub correct_attempts: usize,
    pub current_streak: usize,
    pub best_streak: usize,
}

impl Stats {
    pub fn record(&mut self, correct: bool) {
        self.total_attempts += 1;
        if correct {
            self.correct_attempts += 1;
            self.current_streak += 1;
            self.best_streak = self.best_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EchoState {
    Idle,
    Playing,
    Listening,
    Revealed,
}

/// Play-back-what-you-heard trainer. A target sequence is played through the
/// clock, then the player's keystrokes are collected and graded against it
/// note for note. Grading fires automatically once the attempt is as long as
/// the target, or early on `reveal`, where every missing note counts as a
/// miss.
pub struct EchoTrainer {
    target: Vec<Pitch>,
    attempt: Vec<Pitch>,
    state: EchoState,
    stats: Stats,
}

impl EchoTrainer {
    pub fn new() -> Self {
        EchoTrainer {
            target: Vec::new(),
            attempt: Vec::new(),
            state: EchoState::Idle,
            stats: Stats::default(),
        }
    }

    pub fn state(&self) -> EchoState {
        self.state
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn target(&self) -> &[Pitch] {
        &self.target
    }

    pub fn attempt(&self) -> &[Pitch] {
        &self.attempt
    }

    pub fn set_target(&mut self, target: Vec<Pitch>) {
        self.target = target;
        self.attempt.clear();
        self.state = EchoState::Idle;
    }

    /// Schedules the target for audible playback and returns how many
    /// seconds the playback spans.
    pub fn play_target(&mut self, clock: &dyn EventClock) -> f64 {
        self.attempt.clear();
        self.state = EchoState::Playing;
        for (i, pitch) in self.target.iter().enumerate() {
            clock.schedule(
                i as f64 * ECHO_NOTE_SPACING_SECONDS,
                SessionCommand::Play {
                    pitch: *pitch,
                    duration_seconds: OrderedFloat(ECHO_NOTE_DURATION_SECONDS),
                },
            );
        }
        self.target.len() as f64 * ECHO_NOTE_SPACING_SECONDS
    }

    pub fn begin_listening(&mut self) {
        if !self.target.is_empty() {
            self.state = EchoState::Listening;
        }
    }

    /// Records one keystroke of the attempt. Returns the grade when this
    /// keystroke completes the attempt; keystrokes outside the listening
    /// phase are ignored.
    pub fn note_on(&mut self, pitch: Pitch) -> Option<bool> {
        if self.state != EchoState::Listening {
            return None;
        }
        self.attempt.push(pitch);
        if self.attempt.len() == self.target.len() {
            Some(self.finish_grade())
        } else {
            None
        }
    }

    /// Grades the attempt as it stands. Only meaningful while listening.
    pub fn reveal(&mut self) -> Option<bool> {
        if self.state != EchoState::Listening {
            return None;
        }
        Some(self.finish_grade())
    }

    fn finish_grade(&mut self) -> bool {
        let correct = self.attempt.len() == self.target.len()
            && self
                .attempt
                .iter()
                .zip(self.target.iter())
                .all(|(a, t)| a == t);
        self.state = EchoState::Revealed;
        self.stats.record(correct);
        correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, NotePlayback, ScheduledCommand};
    use crate::session::Notice;
    use crossbeam_queue::SegQueue;
    use float_cmp::approx_eq;
    use std::sync::Arc;

    fn p(name: &str) -> Pitch {
        Pitch::parse(name).unwrap()
    }

    fn on(name: &str) -> KeyEvent {
        KeyEvent::NoteOn {
            pitch: p(name),
            velocity: 80,
        }
    }

    fn off(name: &str) -> KeyEvent {
        KeyEvent::NoteOff { pitch: p(name) }
    }

    struct Rig {
        session: PracticeSession,
        clock: Arc<ManualClock>,
        audio: Arc<SegQueue<NotePlayback>>,
        notices: Arc<SegQueue<Notice>>,
    }

    fn rig(markup: &str) -> Rig {
        let commands: Arc<SegQueue<ScheduledCommand>> = Arc::new(SegQueue::new());
        let clock = Arc::new(ManualClock::new(commands.clone()));
        let audio = Arc::new(SegQueue::new());
        let notices = Arc::new(SegQueue::new());
        let mut session = PracticeSession::new(
            clock.clone(),
            commands,
            audio.clone(),
            notices.clone(),
        );
        session.load_score(markup).unwrap();
        session.set_range(1, 1);
        Rig {
            session,
            clock,
            audio,
            notices,
        }
    }

    #[test]
    fn test_wrong_then_right_keystroke() {
        let mut r = rig("E4:0.25 F4:0.25 G4:0.5");
        r.session.start_wait_for_me();
        let mut matcher = LiveMatcher::new();

        matcher.handle(on("F4"), &mut r.session);
        assert_eq!(r.session.wrong_note(), Some(p("F4")));
        assert!(r.session.pending_target().unwrap().contains(&p("E4")));

        matcher.handle(off("F4"), &mut r.session);
        matcher.handle(on("E4"), &mut r.session);
        assert_eq!(r.session.wrong_note(), None);
        assert!(r.session.pending_target().unwrap().contains(&p("F4")));
        // Both keystrokes echoed.
        assert!(r.audio.pop().is_some());
        assert!(r.audio.pop().is_some());
        assert!(r.audio.pop().is_none());
    }

    #[test]
    fn test_chord_needs_every_pitch_held() {
        let mut r = rig("C4+E4:0.5 G4:0.5");
        r.session.start_wait_for_me();
        let mut matcher = LiveMatcher::new();

        matcher.handle(on("C4"), &mut r.session);
        assert!(r.session.pending_target().unwrap().contains(&p("E4")));
        assert_eq!(r.session.wrong_note(), None);

        matcher.handle(on("E4"), &mut r.session);
        assert!(r.session.pending_target().unwrap().contains(&p("G4")));
    }

    #[test]
    fn test_released_chord_note_does_not_count() {
        let mut r = rig("C4+E4:0.5 G4:0.5");
        r.session.start_wait_for_me();
        let mut matcher = LiveMatcher::new();

        matcher.handle(on("C4"), &mut r.session);
        matcher.handle(off("C4"), &mut r.session);
        matcher.handle(on("E4"), &mut r.session);
        // C4 no longer held, so the chord is incomplete.
        assert!(r.session.pending_target().unwrap().contains(&p("C4")));
    }

    #[test]
    fn test_keystrokes_echo_when_inactive() {
        let mut r = rig("E4:0.25 F4:0.25");
        let mut matcher = LiveMatcher::new();
        matcher.handle(on("A4"), &mut r.session);
        assert_eq!(r.session.wrong_note(), None);
        let echoed = r.audio.pop().unwrap();
        assert_eq!(echoed.pitch, p("A4"));
    }

    #[test]
    fn test_stats_streaks() {
        let mut stats = Stats::default();
        stats.record(true);
        stats.record(true);
        stats.record(false);
        stats.record(true);
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.correct_attempts, 3);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.best_streak, 2);
    }

    #[test]
    fn test_echo_correct_attempt() {
        let mut trainer = EchoTrainer::new();
        trainer.set_target(vec![p("C4"), p("E4"), p("G4")]);
        trainer.begin_listening();
        assert_eq!(trainer.note_on(p("C4")), None);
        assert_eq!(trainer.note_on(p("E4")), None);
        assert_eq!(trainer.note_on(p("G4")), Some(true));
        assert_eq!(trainer.state(), EchoState::Revealed);
        assert_eq!(trainer.stats().current_streak, 1);
    }

    #[test]
    fn test_echo_wrong_note_breaks_streak() {
        let mut trainer = EchoTrainer::new();
        trainer.set_target(vec![p("C4"), p("E4")]);
        trainer.begin_listening();
        trainer.note_on(p("C4"));
        assert_eq!(trainer.note_on(p("E4")), Some(true));

        trainer.set_target(vec![p("C4"), p("F4"), p("G4")]);
        trainer.begin_listening();
        trainer.note_on(p("C4"));
        trainer.note_on(p("E4"));
        assert_eq!(trainer.note_on(p("G4")), Some(false));
        assert_eq!(trainer.stats().current_streak, 0);
        assert_eq!(trainer.stats().best_streak, 1);
    }

    #[test]
    fn test_echo_reveal_grades_short_attempt() {
        let mut trainer = EchoTrainer::new();
        trainer.set_target(vec![p("C4"), p("E4"), p("G4")]);
        trainer.begin_listening();
        trainer.note_on(p("C4"));
        assert_eq!(trainer.reveal(), Some(false));
        // Keystrokes after the reveal are ignored.
        assert_eq!(trainer.note_on(p("E4")), None);
        assert_eq!(trainer.attempt().len(), 1);
    }

    #[test]
    fn test_echo_playback_schedule() {
        let commands: Arc<SegQueue<ScheduledCommand>> = Arc::new(SegQueue::new());
        let clock = ManualClock::new(commands);
        let mut trainer = EchoTrainer::new();
        trainer.set_target(vec![p("C4"), p("E4"), p("G4")]);
        let span = trainer.play_target(&clock);
        assert!(approx_eq!(f64, span, 3.0 * ECHO_NOTE_SPACING_SECONDS));
        assert_eq!(trainer.state(), EchoState::Playing);

        let scheduled = clock.scheduled();
        assert_eq!(scheduled.len(), 3);
        for (i, (at, command)) in scheduled.iter().enumerate() {
            assert!(approx_eq!(f64, *at, i as f64 * ECHO_NOTE_SPACING_SECONDS));
            match command {
                SessionCommand::Play {
                    duration_seconds, ..
                } => {
                    assert!(approx_eq!(
                        f64,
                        duration_seconds.into_inner(),
                        ECHO_NOTE_DURATION_SECONDS
                    ));
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
    }

    #[test]
    fn test_echo_ignores_input_before_listening() {
        let mut trainer = EchoTrainer::new();
        trainer.set_target(vec![p("C4")]);
        assert_eq!(trainer.note_on(p("C4")), None);
        assert_eq!(trainer.attempt().len(), 0);
        // An empty target never enters the listening phase.
        trainer.set_target(Vec::new());
        trainer.begin_listening();
        assert_eq!(trainer.state(), EchoState::Idle);
    }

    #[test]
    fn test_section_finish_notice_reaches_front_end() {
        let mut r = rig("E4:1.0");
        r.session.start_wait_for_me();
        let mut matcher = LiveMatcher::new();
        matcher.handle(on("E4"), &mut r.session);
        assert_eq!(r.session.mode(), PracticeMode::Inactive);
        assert_eq!(r.notices.pop(), Some(Notice::SectionFinished));
        assert!(r.clock.scheduled().is_empty());
    }
}
