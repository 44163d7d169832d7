use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use enum_iterator::all;
use midir::MidiInput;
use read_input::prelude::input;
use read_input::InputBuild;

use keytrainer::{
    generate_interval, generate_melody, generate_note, start_input_thread, Clef, ClefMode,
    EchoTrainer, KeyEvent, LiveMatcher, MajorKey, MidiScenario, NotePlayback, Notice, Pitch,
    PracticeMode, PracticeSession, ScheduledCommand, Stats, WallClock, DEFAULT_MELODY_MIDI_MAX,
    DEFAULT_TEMPO_BPM, ECHO_NOTE_SPACING_SECONDS,
};

const POLL_SLEEP: Duration = Duration::from_millis(1);

fn user_pick_element<T: Clone, S: Fn(&T) -> String>(
    choices: impl Iterator<Item = T>,
    show: S,
) -> T {
    let choices = choices.collect::<Vec<_>>();
    for (i, item) in choices.iter().enumerate() {
        println!("{}) {}", i + 1, show(item));
    }
    let choice: usize = input().msg("Enter choice: ").inside(1..=choices.len()).get();
    choices[choice - 1].clone()
}

fn main() -> anyhow::Result<()> {
    let mut midi_in = MidiInput::new("keytrainer input");
    let scenario = MidiScenario::new(&mut midi_in);
    let in_port = match scenario {
        MidiScenario::StartingUp => unreachable!(),
        MidiScenario::NoInputPorts(msg) => {
            println!("{msg}");
            return Ok(());
        }
        MidiScenario::InputPortSelected { in_port } => in_port,
        MidiScenario::MultipleInputPorts { in_ports } => {
            let midi_in = midi_in.as_ref().unwrap();
            user_pick_element(in_ports.iter().cloned(), |p| {
                midi_in.port_name(p).unwrap_or_else(|_| "Unknown".to_string())
            })
        }
    };
    let keystrokes = Arc::new(SegQueue::new());
    start_input_thread(keystrokes.clone(), midi_in?, in_port);

    let commands: Arc<SegQueue<ScheduledCommand>> = Arc::new(SegQueue::new());
    let clock = Arc::new(WallClock::new(commands.clone()));
    let audio: Arc<SegQueue<NotePlayback>> = Arc::new(SegQueue::new());
    let notices: Arc<SegQueue<Notice>> = Arc::new(SegQueue::new());
    start_audio_thread(audio.clone());
    let mut session = PracticeSession::new(clock.clone(), commands, audio, notices.clone());

    loop {
        let choice = user_pick_element(
            [
                "Note reading",
                "Interval ear training",
                "Echo a melody",
                "Practice a song",
                "Quit",
            ]
            .iter(),
            |s| s.to_string(),
        );
        match *choice {
            "Note reading" => note_reading(&keystrokes, &mut session),
            "Interval ear training" => interval_training(&keystrokes, &mut session, clock.clone()),
            "Echo a melody" => echo_training(&keystrokes, &mut session, clock.clone()),
            "Practice a song" => {
                if let Err(e) = song_practice(&keystrokes, &mut session, &notices) {
                    println!("{e}");
                }
            }
            _ => return Ok(()),
        }
    }
}

/// Prints queued playback as it comes due. Stands in for a synthesizer.
fn start_audio_thread(audio: Arc<SegQueue<NotePlayback>>) {
    std::thread::spawn(move || loop {
        while let Some(note) = audio.pop() {
            println!(
                "[audio] {} ({:.2}s)",
                note.pitch,
                note.duration_seconds.into_inner()
            );
        }
        std::thread::sleep(POLL_SLEEP);
    });
}

fn next_note_on(keystrokes: &SegQueue<KeyEvent>, session: &mut PracticeSession) -> Pitch {
    loop {
        session.pump();
        if let Some(KeyEvent::NoteOn { pitch, .. }) = keystrokes.pop() {
            return pitch;
        }
        std::thread::sleep(POLL_SLEEP);
    }
}

fn report(stats: &Stats) {
    println!(
        "{}/{} correct, streak {} (best {})",
        stats.correct_attempts, stats.total_attempts, stats.current_streak, stats.best_streak
    );
}

fn note_reading(keystrokes: &SegQueue<KeyEvent>, session: &mut PracticeSession) {
    let mode = user_pick_element(all::<ClefMode>(), |m| format!("{m:?}"));
    let rounds: usize = input().msg("How many notes? ").inside(1..=100).get();
    let mut rng = rand::thread_rng();
    let mut stats = Stats::default();
    let mut clef = Clef::Treble;
    let mut answered_in_clef = 0;
    let mut previous = None;
    for _ in 0..rounds {
        let problem = generate_note(previous, clef, answered_in_clef, mode, &mut rng);
        if problem.clef != clef {
            clef = problem.clef;
            answered_in_clef = 0;
        }
        println!("Play {} ({:?} clef)", problem.pitch, problem.clef);
        let played = next_note_on(keystrokes, session);
        let correct = played == problem.pitch;
        if correct {
            answered_in_clef += 1;
            println!("Right!");
        } else {
            println!("That was {played}.");
        }
        stats.record(correct);
        previous = Some(problem.pitch);
    }
    report(&stats);
}

fn interval_training(
    keystrokes: &SegQueue<KeyEvent>,
    session: &mut PracticeSession,
    clock: Arc<WallClock>,
) {
    let rounds: usize = input().msg("How many intervals? ").inside(1..=100).get();
    let mut rng = rand::thread_rng();
    let mut stats = Stats::default();
    let mut previous_base = None;
    for _ in 0..rounds {
        let problem = generate_interval(previous_base, &mut rng);
        previous_base = Some(problem.base);
        let mut trainer = EchoTrainer::new();
        trainer.set_target(vec![problem.base, problem.upper]);
        let span = trainer.play_target(clock.as_ref());
        wait_pumping(session, span);
        while keystrokes.pop().is_some() {}
        let answer = user_pick_element(problem.choices.iter(), |i| i.name().to_string());
        let correct = *answer == problem.interval;
        if correct {
            println!("Right!");
        } else {
            println!("It was a {}.", problem.interval.name());
        }
        stats.record(correct);
    }
    report(&stats);
}

fn echo_training(
    keystrokes: &SegQueue<KeyEvent>,
    session: &mut PracticeSession,
    clock: Arc<WallClock>,
) {
    let key = user_pick_element(all::<MajorKey>(), |k| format!("{} major", k.name()));
    let ranges = [("One octave", 72), ("Two octaves", DEFAULT_MELODY_MIDI_MAX)];
    let (_, midi_max) = *user_pick_element(ranges.iter(), |r| r.0.to_string());
    let length: usize = input().msg("Notes per melody? ").inside(1..=8).get();
    let rounds: usize = input().msg("How many melodies? ").inside(1..=100).get();
    let mut rng = rand::thread_rng();
    let mut trainer = EchoTrainer::new();
    let mut previous: Option<Vec<Pitch>> = None;
    for _ in 0..rounds {
        let problem = generate_melody(key, length, previous.as_deref(), midi_max, &mut rng);
        previous = Some(problem.pitches.clone());
        trainer.set_target(problem.pitches);
        println!("Listen...");
        let span = trainer.play_target(clock.as_ref());
        wait_pumping(session, span + ECHO_NOTE_SPACING_SECONDS);
        while keystrokes.pop().is_some() {}
        println!("Now play it back.");
        trainer.begin_listening();
        loop {
            let pitch = next_note_on(keystrokes, session);
            match trainer.note_on(pitch) {
                Some(true) => {
                    println!("Right!");
                    break;
                }
                Some(false) => {
                    let names: Vec<String> =
                        trainer.target().iter().map(|p| p.to_string()).collect();
                    println!("It was {}.", names.join(" "));
                    break;
                }
                None => {}
            }
        }
        let stats = trainer.stats();
        report(&stats);
    }
}

fn song_practice(
    keystrokes: &SegQueue<KeyEvent>,
    session: &mut PracticeSession,
    notices: &SegQueue<Notice>,
) -> anyhow::Result<()> {
    let filename: String = input().msg("Score file: ").get();
    let markup = std::fs::read_to_string(filename.trim())?;
    session.load_score(&markup)?;
    let measures = session.measures().unwrap();
    println!("{measures} measures loaded.");
    let start: usize = input()
        .msg("Start measure: ")
        .inside(1..=measures)
        .default(1)
        .get();
    let end: usize = input()
        .msg("End measure: ")
        .inside(start..=measures)
        .default(measures)
        .get();
    session.set_range(start, end);
    let tempo: u16 = input()
        .msg("Tempo (bpm): ")
        .inside(20..=240)
        .default(DEFAULT_TEMPO_BPM)
        .get();
    session.set_tempo(tempo);

    let mode = user_pick_element(["Playback", "Wait for me"].iter(), |s| s.to_string());
    match *mode {
        "Playback" => session.start_playback(),
        _ => session.start_wait_for_me(),
    }

    let mut matcher = LiveMatcher::new();
    let mut last_position = usize::MAX;
    let mut last_wrong = None;
    while session.mode() != PracticeMode::Inactive {
        session.pump();
        while let Some(event) = keystrokes.pop() {
            matcher.handle(event, session);
        }
        if let Some(cursor) = session.cursor() {
            if cursor.is_visible() && cursor.position() != last_position {
                last_position = cursor.position();
                let names: Vec<String> = cursor
                    .pitches_under_cursor()
                    .iter()
                    .map(|p| p.to_string())
                    .collect();
                let shown = if names.is_empty() {
                    "rest".to_string()
                } else {
                    names.join("+")
                };
                println!("measure {} | {}", cursor.measure() + 1, shown);
            }
        }
        if session.wrong_note() != last_wrong {
            last_wrong = session.wrong_note();
            if let Some(wrong) = last_wrong {
                println!("wrong note: {wrong}");
            }
        }
        std::thread::sleep(POLL_SLEEP);
    }
    while let Some(notice) = notices.pop() {
        match notice {
            Notice::SectionFinished => println!("Section finished!"),
            Notice::PlaybackFinished => println!("Playback finished."),
            Notice::SessionError(e) => println!("Session stopped: {e}"),
        }
    }
    Ok(())
}

fn wait_pumping(session: &mut PracticeSession, seconds: f64) {
    let deadline = std::time::Instant::now() + Duration::from_secs_f64(seconds);
    while std::time::Instant::now() < deadline {
        session.pump();
        std::thread::sleep(POLL_SLEEP);
    }
    session.pump();
}
