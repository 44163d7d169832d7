use ordered_float::OrderedFloat;

use crate::clock::SessionCommand;
use crate::score::TimelineIter;

pub const QUARTERS_PER_WHOLE_NOTE: f64 = 4.0;

/// Exact tempo conversion: one quarter note lasts `60 / bpm` seconds.
pub fn seconds_per_quarter(tempo_bpm: u16) -> f64 {
    60.0 / tempo_bpm as f64
}

/// One entry of a playback plan: release `command` `at_seconds` after the
/// plan starts executing.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedAction {
    pub at_seconds: f64,
    pub command: SessionCommand,
}

/// Walks a read-only timeline snapshot and lays out the complete playback
/// plan for one run: a cursor advance per event, an audio trigger per
/// sounding pitch, and a terminal `FinishSection` at the time the range ends.
/// Purely synchronous; executing the plan is the clock's job. A tempo change
/// means building a fresh plan, never rescaling a pending one.
pub fn plan_playback(
    mut iter: TimelineIter,
    end_measure: usize,
    tempo_bpm: u16,
) -> Vec<PlannedAction> {
    let spq = seconds_per_quarter(tempo_bpm);
    let t0 = iter.time();
    let mut plan = Vec::new();

    while !iter.end_reached() && iter.measure() < end_measure {
        let event = match iter.event() {
            Some(event) => event,
            None => break,
        };
        let at_seconds = (event.time() - t0) * QUARTERS_PER_WHOLE_NOTE * spq;
        plan.push(PlannedAction {
            at_seconds,
            command: SessionCommand::AdvanceCursor,
        });
        for (pitch, duration) in event.notes() {
            plan.push(PlannedAction {
                at_seconds,
                command: SessionCommand::Play {
                    pitch: *pitch,
                    duration_seconds: OrderedFloat(
                        duration.into_inner() * QUARTERS_PER_WHOLE_NOTE * spq,
                    ),
                },
            });
        }
        iter.advance();
    }

    plan.push(PlannedAction {
        at_seconds: (iter.time() - t0) * QUARTERS_PER_WHOLE_NOTE * spq,
        command: SessionCommand::FinishSection,
    });
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Pitch;
    use crate::score::{Cursor, ScoreTimeline};
    use float_cmp::approx_eq;
    use std::sync::Arc;

    fn iter_over(markup: &str) -> TimelineIter {
        Cursor::new(Arc::new(ScoreTimeline::parse(markup).unwrap())).iter_from_here()
    }

    fn play_times(plan: &[PlannedAction]) -> Vec<(f64, Pitch, f64)> {
        plan.iter()
            .filter_map(|action| match &action.command {
                SessionCommand::Play {
                    pitch,
                    duration_seconds,
                } => Some((action.at_seconds, *pitch, duration_seconds.into_inner())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_four_quarters_at_60_bpm() {
        let plan = plan_playback(iter_over("C4:0.25 D4:0.25 E4:0.25 F4:0.25"), 1, 60);
        let plays = play_times(&plan);
        assert_eq!(plays.len(), 4);
        let expected = [("C4", 0.0), ("D4", 1.0), ("E4", 2.0), ("F4", 3.0)];
        for ((at, pitch, duration), (name, time)) in plays.iter().zip(expected.iter()) {
            assert!(approx_eq!(f64, *at, *time));
            assert!(approx_eq!(f64, *duration, 1.0));
            assert_eq!(*pitch, Pitch::parse(name).unwrap());
        }
        let finish = plan.last().unwrap();
        assert_eq!(finish.command, SessionCommand::FinishSection);
        assert!(approx_eq!(f64, finish.at_seconds, 4.0));
        assert_eq!(
            plan.iter()
                .filter(|a| a.command == SessionCommand::AdvanceCursor)
                .count(),
            4
        );
    }

    #[test]
    fn test_tempo_scales_linearly() {
        let plan = plan_playback(iter_over("C4:0.25 D4:0.25 E4:0.25 F4:0.25"), 1, 120);
        let plays = play_times(&plan);
        for (i, (at, _, duration)) in plays.iter().enumerate() {
            assert!(approx_eq!(f64, *at, i as f64 * 0.5));
            assert!(approx_eq!(f64, *duration, 0.5));
        }
        assert!(approx_eq!(f64, plan.last().unwrap().at_seconds, 2.0));
    }

    #[test]
    fn test_range_ends_at_end_measure() {
        // Two measures of half notes; plan only the first measure.
        let plan = plan_playback(iter_over("C4:0.5 D4:0.5 E4:0.5 F4:0.5"), 1, 60);
        let plays = play_times(&plan);
        assert_eq!(plays.len(), 2);
        // The terminal action lands where the second measure begins.
        assert!(approx_eq!(f64, plan.last().unwrap().at_seconds, 4.0));
    }

    #[test]
    fn test_rests_advance_without_audio() {
        let plan = plan_playback(iter_over("C4:0.25 R:0.25 E4:0.5"), 1, 60);
        assert_eq!(
            plan.iter()
                .filter(|a| a.command == SessionCommand::AdvanceCursor)
                .count(),
            3
        );
        let plays = play_times(&plan);
        assert_eq!(plays.len(), 2);
        assert!(approx_eq!(f64, plays[1].0, 2.0));
        assert!(approx_eq!(f64, plays[1].2, 2.0));
    }

    #[test]
    fn test_chord_triggers_share_one_time() {
        let plan = plan_playback(iter_over("C4+E4+G4:0.25 F4:0.25"), 1, 60);
        let plays = play_times(&plan);
        assert_eq!(plays.len(), 4);
        for (at, _, _) in plays.iter().take(3) {
            assert!(approx_eq!(f64, *at, 0.0));
        }
    }

    #[test]
    fn test_plan_starts_mid_score() {
        // Seek past the first measure before planning, as a silent seek does.
        let timeline = Arc::new(ScoreTimeline::parse("C4:0.5 D4:0.5 E4:0.5 F4:0.5").unwrap());
        let mut cursor = Cursor::new(timeline);
        while cursor.measure() < 1 && !cursor.end_reached() {
            cursor.next();
        }
        let plan = plan_playback(cursor.iter_from_here(), 2, 60);
        let plays = play_times(&plan);
        assert_eq!(plays.len(), 2);
        assert!(approx_eq!(f64, plays[0].0, 0.0));
        assert_eq!(plays[0].1, Pitch::parse("E4").unwrap());
        assert!(approx_eq!(f64, plays[1].0, 2.0));
    }
}
