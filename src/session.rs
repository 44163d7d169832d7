use std::collections::BTreeSet;
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use ordered_float::OrderedFloat;

use crate::clock::{EventClock, NotePlayback, ScheduledCommand, SessionCommand};
use crate::error::{Error, Result};
use crate::pitch::Pitch;
use crate::scheduler::plan_playback;
use crate::score::{Cursor, ScoreTimeline};

/// Tempo a freshly created session plays back at.
pub const DEFAULT_TEMPO_BPM: u16 = 46;

/// How long a wrong-note indicator stays lit before it clears itself.
pub const WRONG_NOTE_CLEAR_SECONDS: f64 = 0.3;

/// Length of the audible echo for a keystroke the player makes.
pub const KEY_ECHO_SECONDS: f64 = 0.3;

/// Measures selected by default when a score is loaded.
const DEFAULT_RANGE_MEASURES: usize = 4;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PracticeMode {
    Inactive,
    Playback,
    WaitForMe,
}

/// User-visible session events, drained by whatever front end is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    SectionFinished,
    PlaybackFinished,
    SessionError(Error),
}

/// One score-based practice session: holds the live cursor, the practice
/// range and tempo, and whichever of the two practice modes is running.
/// There is never more than one plan outstanding; starting a mode tears the
/// previous session down first, and `stop` is the single cancellation point.
pub struct PracticeSession {
    mode: PracticeMode,
    start_measure: usize,
    end_measure: usize,
    tempo_bpm: u16,
    cursor: Option<Cursor>,
    pending_target: Option<BTreeSet<Pitch>>,
    wrong_note: Option<Pitch>,
    clock: Arc<dyn EventClock>,
    commands: Arc<SegQueue<ScheduledCommand>>,
    audio: Arc<SegQueue<NotePlayback>>,
    notices: Arc<SegQueue<Notice>>,
}

impl PracticeSession {
    pub fn new(
        clock: Arc<dyn EventClock>,
        commands: Arc<SegQueue<ScheduledCommand>>,
        audio: Arc<SegQueue<NotePlayback>>,
        notices: Arc<SegQueue<Notice>>,
    ) -> Self {
        PracticeSession {
            mode: PracticeMode::Inactive,
            start_measure: 1,
            end_measure: DEFAULT_RANGE_MEASURES,
            tempo_bpm: DEFAULT_TEMPO_BPM,
            cursor: None,
            pending_target: None,
            wrong_note: None,
            clock,
            commands,
            audio,
            notices,
        }
    }

    /// Replaces the loaded score. Any running session stops first; if the
    /// markup is malformed the previous score is kept and nothing starts.
    pub fn load_score(&mut self, markup: &str) -> Result<()> {
        self.stop();
        let timeline = Arc::new(ScoreTimeline::parse(markup)?);
        let measures = timeline.measures();
        let mut cursor = Cursor::new(timeline);
        cursor.show();
        self.cursor = Some(cursor);
        self.start_measure = 1;
        self.end_measure = DEFAULT_RANGE_MEASURES.min(measures);
        Ok(())
    }

    pub fn set_range(&mut self, start_measure: usize, end_measure: usize) {
        self.start_measure = start_measure.max(1);
        self.end_measure = end_measure.max(self.start_measure);
    }

    pub fn set_tempo(&mut self, tempo_bpm: u16) {
        self.tempo_bpm = tempo_bpm.max(1);
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn range(&self) -> (usize, usize) {
        (self.start_measure, self.end_measure)
    }

    pub fn tempo_bpm(&self) -> u16 {
        self.tempo_bpm
    }

    pub fn measures(&self) -> Option<usize> {
        self.cursor.as_ref().map(|c| c.timeline().measures())
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn pending_target(&self) -> Option<&BTreeSet<Pitch>> {
        self.pending_target.as_ref()
    }

    pub fn wrong_note(&self) -> Option<Pitch> {
        self.wrong_note
    }

    /// Starts autonomous playback over the practice range: silent seek, plan
    /// against a timeline snapshot, register the whole plan with the clock.
    pub fn start_playback(&mut self) {
        self.stop();
        let start = self.start_measure;
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        cursor.show();
        cursor.reset();
        while cursor.measure() < start - 1 && !cursor.end_reached() {
            cursor.next();
        }
        let plan = plan_playback(cursor.iter_from_here(), self.end_measure, self.tempo_bpm);
        for action in plan {
            self.clock.schedule(action.at_seconds, action.command);
        }
        self.mode = PracticeMode::Playback;
    }

    /// Starts wait-for-me practice: seek to the range start, skip past
    /// rest-only positions, and wait passively for the first target pitch.
    /// A range with nothing to play stops immediately.
    pub fn start_wait_for_me(&mut self) {
        self.stop();
        let start = self.start_measure;
        let end = self.end_measure;
        let mut finished = false;
        {
            let Some(cursor) = self.cursor.as_mut() else {
                return;
            };
            cursor.reset();
            cursor.show();
            while cursor.measure() < start - 1 && !cursor.end_reached() {
                cursor.next();
            }
            loop {
                if cursor.end_reached() || cursor.measure() >= end {
                    finished = true;
                    break;
                }
                if cursor.pitches_under_cursor().is_empty() {
                    cursor.next();
                } else {
                    break;
                }
            }
        }
        if finished {
            self.stop();
            return;
        }
        self.refresh_target();
        self.mode = PracticeMode::WaitForMe;
    }

    /// Wait-for-me only: move to the next sounding position, or finish the
    /// section when the range (or score) runs out.
    pub fn advance(&mut self) {
        if self.mode != PracticeMode::WaitForMe {
            return;
        }
        let end = self.end_measure;
        let mut finished = false;
        {
            let Some(cursor) = self.cursor.as_mut() else {
                return;
            };
            cursor.next();
            loop {
                if cursor.end_reached() || cursor.measure() >= end {
                    finished = true;
                    break;
                }
                if cursor.pitches_under_cursor().is_empty() {
                    cursor.next();
                } else {
                    break;
                }
            }
        }
        if finished {
            self.stop();
            self.notices.push(Notice::SectionFinished);
            return;
        }
        self.refresh_target();
    }

    /// Tears the session down: invalidates every scheduled action, clears
    /// the pending target, resets and hides the cursor. Safe to call in any
    /// state, including when already inactive.
    pub fn stop(&mut self) {
        self.clock.cancel_all();
        self.pending_target = None;
        self.wrong_note = None;
        self.mode = PracticeMode::Inactive;
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.reset();
            cursor.hide();
        }
    }

    /// Drains the clock's released commands. Commands stamped with a stale
    /// generation belong to a canceled plan and are dropped unexecuted.
    pub fn pump(&mut self) {
        while let Some(ScheduledCommand {
            generation,
            command,
        }) = self.commands.pop()
        {
            if generation != self.clock.generation() {
                continue;
            }
            match command {
                SessionCommand::AdvanceCursor => self.playback_advance(),
                SessionCommand::Play {
                    pitch,
                    duration_seconds,
                } => self.audio.push(NotePlayback {
                    pitch,
                    duration_seconds,
                }),
                SessionCommand::FinishSection => {
                    self.stop();
                    self.notices.push(Notice::PlaybackFinished);
                }
                SessionCommand::ClearWrongNote => {
                    self.wrong_note = None;
                }
            }
        }
    }

    /// Marks a mismatched keystroke and schedules its indicator to clear
    /// itself shortly, without blocking further input.
    pub fn flag_wrong_note(&mut self, pitch: Pitch) {
        self.wrong_note = Some(pitch);
        self.clock
            .schedule(WRONG_NOTE_CLEAR_SECONDS, SessionCommand::ClearWrongNote);
    }

    pub fn clear_wrong_note(&mut self) {
        self.wrong_note = None;
    }

    /// Echoes a keystroke to the audio queue so the player hears what they
    /// pressed, whatever the session mode.
    pub fn echo_keystroke(&mut self, pitch: Pitch) {
        self.audio.push(NotePlayback {
            pitch,
            duration_seconds: OrderedFloat(KEY_ECHO_SECONDS),
        });
    }

    fn refresh_target(&mut self) {
        self.pending_target = self
            .cursor
            .as_ref()
            .map(|c| c.pitches_under_cursor().into_iter().collect());
    }

    fn playback_advance(&mut self) {
        if self.mode != PracticeMode::Playback {
            return;
        }
        let at_end = self.cursor.as_ref().map_or(true, |c| c.end_reached());
        if at_end {
            // The planned position no longer exists; fatal to the session,
            // not the process.
            let position = self.cursor.as_ref().map_or(0, |c| c.position());
            self.stop();
            self.notices
                .push(Notice::SessionError(Error::ScheduleOverrun(position)));
        } else if let Some(cursor) = self.cursor.as_mut() {
            cursor.next();
        }
    }
}
