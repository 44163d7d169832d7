use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use crossbeam_utils::atomic::AtomicCell;
use ordered_float::OrderedFloat;

use crate::pitch::Pitch;

/// How often the wall-clock worker wakes to check for due actions.
const WALL_CLOCK_TICK: Duration = Duration::from_millis(1);

/// Deferred work a practice session registers against the clock. Commands are
/// executed by the session's `pump()`, never inside the clock itself.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionCommand {
    AdvanceCursor,
    Play {
        pitch: Pitch,
        duration_seconds: OrderedFloat<f64>,
    },
    FinishSection,
    ClearWrongNote,
}

/// A command stamped with the clock generation it was scheduled under. The
/// session drops any command whose generation is no longer current, so a
/// canceled plan can never fire, even if its commands were already in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledCommand {
    pub generation: u64,
    pub command: SessionCommand,
}

/// One note handed to the external audio engine: play `pitch` now, for
/// `duration_seconds`.
#[derive(Clone, Debug, PartialEq)]
pub struct NotePlayback {
    pub pitch: Pitch,
    pub duration_seconds: OrderedFloat<f64>,
}

/// The cancelable scheduling clock a session plans against. `cancel_all` is
/// the single cancellation point: it atomically invalidates every outstanding
/// registration by advancing the generation counter.
pub trait EventClock: Send + Sync {
    /// Registers `command` to be released `delay_seconds` from now onto the
    /// clock's output queue.
    fn schedule(&self, delay_seconds: f64, command: SessionCommand);

    fn cancel_all(&self);

    fn generation(&self) -> u64;
}

struct WallEntry {
    due: Instant,
    seq: u64,
    generation: u64,
    command: SessionCommand,
}

impl PartialEq for WallEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for WallEntry {}

impl PartialOrd for WallEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallEntry {
    // Reversed so the BinaryHeap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

/// Real-time clock: a worker thread releases due commands onto the output
/// queue in scheduled order.
pub struct WallClock {
    out: Arc<SegQueue<ScheduledCommand>>,
    generation: Arc<AtomicCell<u64>>,
    seq: Arc<AtomicCell<u64>>,
    pending: Arc<Mutex<BinaryHeap<WallEntry>>>,
}

impl WallClock {
    pub fn new(out: Arc<SegQueue<ScheduledCommand>>) -> Self {
        let clock = WallClock {
            out,
            generation: Arc::new(AtomicCell::new(0)),
            seq: Arc::new(AtomicCell::new(0)),
            pending: Arc::new(Mutex::new(BinaryHeap::new())),
        };
        clock.start_worker();
        clock
    }

    fn start_worker(&self) {
        let out = self.out.clone();
        let generation = self.generation.clone();
        let pending = self.pending.clone();
        std::thread::spawn(move || loop {
            {
                let mut pending = pending.lock().unwrap();
                let now = Instant::now();
                while pending.peek().map_or(false, |entry| entry.due <= now) {
                    let entry = pending.pop().unwrap();
                    if entry.generation == generation.load() {
                        out.push(ScheduledCommand {
                            generation: entry.generation,
                            command: entry.command,
                        });
                    }
                }
            }
            std::thread::sleep(WALL_CLOCK_TICK);
        });
    }
}

impl EventClock for WallClock {
    fn schedule(&self, delay_seconds: f64, command: SessionCommand) {
        let entry = WallEntry {
            due: Instant::now() + Duration::from_secs_f64(delay_seconds.max(0.0)),
            seq: self.seq.fetch_add(1),
            generation: self.generation.load(),
            command,
        };
        self.pending.lock().unwrap().push(entry);
    }

    fn cancel_all(&self) {
        self.generation.fetch_add(1);
        self.pending.lock().unwrap().clear();
    }

    fn generation(&self) -> u64 {
        self.generation.load()
    }
}

struct ManualEntry {
    due: OrderedFloat<f64>,
    seq: u64,
    generation: u64,
    command: SessionCommand,
}

/// Deterministic clock driven by explicit `advance_to` calls instead of wall
/// time. Used wherever real-time behavior would make a run unrepeatable.
pub struct ManualClock {
    out: Arc<SegQueue<ScheduledCommand>>,
    now: AtomicCell<f64>,
    seq: AtomicCell<u64>,
    generation: AtomicCell<u64>,
    pending: Mutex<Vec<ManualEntry>>,
}

impl ManualClock {
    pub fn new(out: Arc<SegQueue<ScheduledCommand>>) -> Self {
        ManualClock {
            out,
            now: AtomicCell::new(0.0),
            seq: AtomicCell::new(0),
            generation: AtomicCell::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn now(&self) -> f64 {
        self.now.load()
    }

    /// Moves virtual time forward, releasing every still-valid command due at
    /// or before `time`, in scheduled order.
    pub fn advance_to(&self, time: f64) {
        if time > self.now.load() {
            self.now.store(time);
        }
        let mut pending = self.pending.lock().unwrap();
        pending.sort_by_key(|entry| (entry.due, entry.seq));
        let generation = self.generation.load();
        let mut rest = Vec::new();
        for entry in pending.drain(..) {
            if entry.generation != generation {
                continue;
            }
            if entry.due.into_inner() <= time {
                self.out.push(ScheduledCommand {
                    generation: entry.generation,
                    command: entry.command,
                });
            } else {
                rest.push(entry);
            }
        }
        *pending = rest;
    }

    /// Snapshot of the still-pending registrations: (absolute seconds,
    /// command), in time order.
    pub fn scheduled(&self) -> Vec<(f64, SessionCommand)> {
        let mut pending = self.pending.lock().unwrap();
        pending.sort_by_key(|entry| (entry.due, entry.seq));
        let generation = self.generation.load();
        pending
            .iter()
            .filter(|entry| entry.generation == generation)
            .map(|entry| (entry.due.into_inner(), entry.command.clone()))
            .collect()
    }
}

impl EventClock for ManualClock {
    fn schedule(&self, delay_seconds: f64, command: SessionCommand) {
        let entry = ManualEntry {
            due: OrderedFloat(self.now.load() + delay_seconds.max(0.0)),
            seq: self.seq.fetch_add(1),
            generation: self.generation.load(),
            command,
        };
        self.pending.lock().unwrap().push(entry);
    }

    fn cancel_all(&self) {
        self.generation.fetch_add(1);
        self.pending.lock().unwrap().clear();
    }

    fn generation(&self) -> u64 {
        self.generation.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn drain(out: &SegQueue<ScheduledCommand>) -> Vec<SessionCommand> {
        let mut result = Vec::new();
        while let Some(cmd) = out.pop() {
            result.push(cmd.command);
        }
        result
    }

    #[test]
    fn test_manual_clock_releases_in_time_order() {
        let out = Arc::new(SegQueue::new());
        let clock = ManualClock::new(out.clone());
        clock.schedule(2.0, SessionCommand::FinishSection);
        clock.schedule(0.5, SessionCommand::AdvanceCursor);
        clock.schedule(1.0, SessionCommand::ClearWrongNote);

        clock.advance_to(1.0);
        assert_eq!(
            drain(&out),
            vec![SessionCommand::AdvanceCursor, SessionCommand::ClearWrongNote]
        );
        assert_eq!(clock.scheduled().len(), 1);

        clock.advance_to(5.0);
        assert_eq!(drain(&out), vec![SessionCommand::FinishSection]);
        assert!(clock.scheduled().is_empty());
    }

    #[test]
    fn test_manual_clock_cancel_purges_everything() {
        let out = Arc::new(SegQueue::new());
        let clock = ManualClock::new(out.clone());
        clock.schedule(1.0, SessionCommand::AdvanceCursor);
        clock.schedule(2.0, SessionCommand::FinishSection);
        let before = clock.generation();
        clock.cancel_all();
        assert_eq!(clock.generation(), before + 1);
        clock.advance_to(10.0);
        assert!(drain(&out).is_empty());
        // Cancel with nothing pending is a no-op.
        clock.cancel_all();
        assert!(clock.scheduled().is_empty());
    }

    #[test]
    fn test_manual_clock_stamps_current_generation() {
        let out = Arc::new(SegQueue::new());
        let clock = ManualClock::new(out.clone());
        clock.schedule(0.0, SessionCommand::AdvanceCursor);
        clock.advance_to(0.0);
        let stamped = out.pop().unwrap();
        assert_eq!(stamped.generation, clock.generation());
    }

    #[test]
    fn test_wall_clock_releases_due_commands() {
        let out = Arc::new(SegQueue::new());
        let clock = WallClock::new(out.clone());
        clock.schedule(0.01, SessionCommand::AdvanceCursor);
        clock.schedule(0.03, SessionCommand::FinishSection);
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(
            drain(&out),
            vec![SessionCommand::AdvanceCursor, SessionCommand::FinishSection]
        );
    }

    #[test]
    fn test_wall_clock_cancel_means_nothing_fires() {
        let out = Arc::new(SegQueue::new());
        let clock = WallClock::new(out.clone());
        clock.schedule(0.05, SessionCommand::AdvanceCursor);
        clock.cancel_all();
        std::thread::sleep(Duration::from_millis(150));
        assert!(out.pop().is_none());
    }
}
