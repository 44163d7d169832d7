use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::pitch::Pitch;

/// Whole notes per measure; the timeline assumes 4/4, where one whole note
/// fills a bar.
pub const WHOLE_NOTES_PER_MEASURE: f64 = 1.0;

/// One symbolic moment in a score: everything that sounds (or rests) at a
/// single cursor position. Times and durations are in whole-note units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    measure: usize,
    time: OrderedFloat<f64>,
    notes: Vec<(Pitch, OrderedFloat<f64>)>,
}

impl TimelineEvent {
    pub fn measure(&self) -> usize {
        self.measure
    }

    pub fn time(&self) -> f64 {
        self.time.into_inner()
    }

    pub fn notes(&self) -> &[(Pitch, OrderedFloat<f64>)] {
        &self.notes
    }

    /// The sounding pitches at this position; empty for a rest.
    pub fn pitches(&self) -> Vec<Pitch> {
        self.notes.iter().map(|(p, _)| *p).collect()
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }
}

/// A read-only, time-ordered view over a score. Produced once from markup;
/// never mutated afterwards, so cursors can share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTimeline {
    events: Vec<TimelineEvent>,
    total_whole_notes: OrderedFloat<f64>,
}

impl ScoreTimeline {
    /// Parses the textual score markup: whitespace-separated event tokens,
    /// each `pitches:duration` with `+`-joined pitches for a chord and `R`
    /// for a rest. Durations are in whole-note units and accumulate left to
    /// right; a measure boundary falls on every whole multiple of
    /// `WHOLE_NOTES_PER_MEASURE`.
    ///
    /// `E4:0.25 R:0.25 C4+E4:0.5` is a quarter note, a quarter rest, and a
    /// half-note chord filling one 4/4 bar.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut events = Vec::new();
        let mut time = 0.0;
        for (index, token) in markup.split_whitespace().enumerate() {
            let bad = |reason: &str| Error::ScoreLoad {
                token: index + 1,
                reason: reason.to_string(),
            };
            let (notes_part, duration_part) =
                token.split_once(':').ok_or_else(|| bad("missing ':'"))?;
            let duration: f64 = duration_part
                .parse()
                .map_err(|_| bad("unreadable duration"))?;
            if duration <= 0.0 || !duration.is_finite() {
                return Err(bad("duration must be positive"));
            }
            let mut notes = Vec::new();
            if notes_part != "R" {
                for name in notes_part.split('+') {
                    let pitch = Pitch::parse(name).map_err(|e| Error::ScoreLoad {
                        token: index + 1,
                        reason: e.to_string(),
                    })?;
                    notes.push((pitch, OrderedFloat(duration)));
                }
            }
            events.push(TimelineEvent {
                measure: (time / WHOLE_NOTES_PER_MEASURE) as usize,
                time: OrderedFloat(time),
                notes,
            });
            time += duration;
        }
        if events.is_empty() {
            return Err(Error::ScoreLoad {
                token: 0,
                reason: "empty score".to_string(),
            });
        }
        Ok(ScoreTimeline {
            events,
            total_whole_notes: OrderedFloat(time),
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, position: usize) -> Option<&TimelineEvent> {
        self.events.get(position)
    }

    pub fn measures(&self) -> usize {
        (self.total_whole_notes.into_inner() / WHOLE_NOTES_PER_MEASURE).ceil() as usize
    }

    pub fn total_whole_notes(&self) -> f64 {
        self.total_whole_notes.into_inner()
    }
}

/// The single live pointer into the displayed score. At most one writer (the
/// active practice session) advances it; planning works on `TimelineIter`
/// snapshots instead so lookahead never disturbs what the player sees.
#[derive(Debug, Clone)]
pub struct Cursor {
    timeline: Arc<ScoreTimeline>,
    position: usize,
    visible: bool,
}

impl Cursor {
    pub fn new(timeline: Arc<ScoreTimeline>) -> Self {
        Cursor {
            timeline,
            position: 0,
            visible: false,
        }
    }

    pub fn timeline(&self) -> &Arc<ScoreTimeline> {
        &self.timeline
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn next(&mut self) {
        if !self.end_reached() {
            self.position += 1;
        }
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn end_reached(&self) -> bool {
        self.position >= self.timeline.len()
    }

    /// Current measure index; past the end this is the measure count, so
    /// range checks of the form `measure() >= end` keep working.
    pub fn measure(&self) -> usize {
        self.timeline
            .event(self.position)
            .map(|e| e.measure())
            .unwrap_or_else(|| self.timeline.measures())
    }

    /// Whole-note timestamp of the current position, or the total score
    /// length once the end is reached.
    pub fn time(&self) -> f64 {
        self.timeline
            .event(self.position)
            .map(|e| e.time())
            .unwrap_or_else(|| self.timeline.total_whole_notes())
    }

    /// Sounding pitches at the cursor; rests and end-of-score give an empty
    /// set.
    pub fn pitches_under_cursor(&self) -> Vec<Pitch> {
        self.timeline
            .event(self.position)
            .map(|e| e.pitches())
            .unwrap_or_default()
    }

    /// An independent read-only snapshot starting at the cursor's position.
    pub fn iter_from_here(&self) -> TimelineIter {
        TimelineIter {
            timeline: self.timeline.clone(),
            position: self.position,
        }
    }
}

/// Read-only lookahead over the timeline, detached from the live cursor.
/// Playback planning walks one of these to the end of the practice range
/// without moving anything on screen.
#[derive(Debug, Clone)]
pub struct TimelineIter {
    timeline: Arc<ScoreTimeline>,
    position: usize,
}

impl TimelineIter {
    pub fn event(&self) -> Option<&TimelineEvent> {
        self.timeline.event(self.position)
    }

    pub fn advance(&mut self) {
        if !self.end_reached() {
            self.position += 1;
        }
    }

    pub fn end_reached(&self) -> bool {
        self.position >= self.timeline.len()
    }

    pub fn measure(&self) -> usize {
        self.event()
            .map(|e| e.measure())
            .unwrap_or_else(|| self.timeline.measures())
    }

    pub fn time(&self) -> f64 {
        self.event()
            .map(|e| e.time())
            .unwrap_or_else(|| self.timeline.total_whole_notes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarters() -> Arc<ScoreTimeline> {
        Arc::new(ScoreTimeline::parse("C4:0.25 D4:0.25 E4:0.25 F4:0.25").unwrap())
    }

    #[test]
    fn test_parse_quarters() {
        let timeline = quarters();
        assert_eq!(timeline.len(), 4);
        assert_eq!(timeline.measures(), 1);
        assert_eq!(timeline.total_whole_notes(), 1.0);
        let times: Vec<f64> = (0..4).map(|i| timeline.event(i).unwrap().time()).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75]);
        for i in 0..4 {
            assert_eq!(timeline.event(i).unwrap().measure(), 0);
        }
    }

    #[test]
    fn test_parse_chords_rests_and_measures() {
        let timeline =
            ScoreTimeline::parse("C4+E4+G4:0.5 R:0.5 Bb3:1.0 R:0.25 F4:0.75").unwrap();
        assert_eq!(timeline.len(), 5);
        assert_eq!(timeline.measures(), 3);
        let chord = timeline.event(0).unwrap();
        assert_eq!(chord.pitches().len(), 3);
        assert!(!chord.is_rest());
        assert!(timeline.event(1).unwrap().is_rest());
        assert_eq!(timeline.event(2).unwrap().measure(), 1);
        assert_eq!(timeline.event(3).unwrap().measure(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ScoreTimeline::parse(""),
            Err(Error::ScoreLoad { .. })
        ));
        assert!(matches!(
            ScoreTimeline::parse("C4"),
            Err(Error::ScoreLoad { .. })
        ));
        assert!(matches!(
            ScoreTimeline::parse("C4:zero"),
            Err(Error::ScoreLoad { .. })
        ));
        assert!(matches!(
            ScoreTimeline::parse("C4:-0.25"),
            Err(Error::ScoreLoad { .. })
        ));
        assert!(matches!(
            ScoreTimeline::parse("H4:0.25"),
            Err(Error::ScoreLoad { token: 1, .. })
        ));
    }

    #[test]
    fn test_cursor_walk() {
        let mut cursor = Cursor::new(quarters());
        assert_eq!(cursor.pitches_under_cursor(), vec![Pitch::parse("C4").unwrap()]);
        cursor.next();
        cursor.next();
        assert_eq!(cursor.pitches_under_cursor(), vec![Pitch::parse("E4").unwrap()]);
        cursor.next();
        assert!(!cursor.end_reached());
        cursor.next();
        assert!(cursor.end_reached());
        assert_eq!(cursor.measure(), 1);
        assert_eq!(cursor.time(), 1.0);
        assert!(cursor.pitches_under_cursor().is_empty());
        cursor.next(); // saturates
        assert_eq!(cursor.position(), 4);
        cursor.reset();
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_iter_does_not_move_cursor() {
        let cursor = {
            let mut c = Cursor::new(quarters());
            c.next();
            c
        };
        let mut iter = cursor.iter_from_here();
        while !iter.end_reached() {
            iter.advance();
        }
        assert_eq!(iter.time(), 1.0);
        assert_eq!(cursor.position(), 1);
    }
}
