// Console - Text commands standing in for the hardware panel
// Every command expands to the same InputEvent sequence the buttons and
// encoders would produce, so the host exercises the real mapping.

use crate::config::STEPS;
use crate::input::mapper::{InputEvent, Rotary};
use crate::sequencer::note::note_name;
use crate::sequencer::pattern::{ChannelId, PatternStore, StepIndex};

pub const HELP: &str = "\
commands:
  start | stop            toggle transport (start/stop button)
  step <n>                tap step n on the selected channel
  ch <n>                  select channel n (0-3)
  mute <n>                toggle mute of channel n
  fill on|off             hold or release the fill modifier
  turn <rotary> <delta>   turn tempo|pitch|length|euclid by raw transitions
  lock <n> <rotary> <d>   turn a rotary while holding step n
  press <rotary>          press a rotary switch (tempo = save)
  show                    print the pattern
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Events(Vec<InputEvent>),
    Show,
    Help,
    Quit,
}

fn parse_index(word: Option<&str>, limit: usize, what: &str) -> Result<usize, String> {
    let word = word.ok_or_else(|| format!("missing {}", what))?;
    let index: usize = word
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, word))?;
    if index >= limit {
        return Err(format!("{} {} out of range 0..{}", what, index, limit));
    }
    Ok(index)
}

fn parse_step(word: Option<&str>) -> Result<StepIndex, String> {
    let index = parse_index(word, STEPS, "step")?;
    StepIndex::new(index).ok_or_else(|| format!("invalid step {}", index))
}

fn parse_rotary(word: Option<&str>) -> Result<Rotary, String> {
    match word {
        Some("tempo") | Some("0") => Ok(Rotary::Tempo),
        Some("pitch") | Some("1") => Ok(Rotary::Pitch),
        Some("length") | Some("2") => Ok(Rotary::Length),
        Some("euclid") | Some("3") => Ok(Rotary::Euclid),
        Some(other) => Err(format!("unknown rotary '{}'", other)),
        None => Err("missing rotary".to_string()),
    }
}

fn parse_delta(word: Option<&str>) -> Result<i32, String> {
    let word = word.ok_or("missing delta")?;
    word.parse()
        .map_err(|_| format!("invalid delta '{}'", word))
}

/// Parse one console line
pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(ConsoleCommand::Events(Vec::new()));
    };

    let events = match verb {
        "start" | "stop" => vec![InputEvent::StartStopPressed, InputEvent::StartStopReleased],
        "step" => {
            let step = parse_step(words.next())?;
            vec![InputEvent::StepPressed(step), InputEvent::StepReleased(step)]
        }
        "ch" | "mute" => {
            let channel = parse_index(words.next(), crate::config::CHANNELS, "channel")?;
            let step = StepIndex::new(channel).ok_or("invalid channel")?;
            let (press, release) = if verb == "ch" {
                (
                    InputEvent::ChannelModifier { held: true },
                    InputEvent::ChannelModifier { held: false },
                )
            } else {
                (InputEvent::StartStopPressed, InputEvent::StartStopReleased)
            };
            vec![
                press,
                InputEvent::StepPressed(step),
                InputEvent::StepReleased(step),
                release,
            ]
        }
        "fill" => match words.next() {
            Some("on") => vec![InputEvent::ChannelModifier { held: true }],
            Some("off") => vec![InputEvent::ChannelModifier { held: false }],
            _ => return Err("usage: fill on|off".to_string()),
        },
        "turn" => {
            let rotary = parse_rotary(words.next())?;
            let delta = parse_delta(words.next())?;
            vec![InputEvent::RotaryTurned { rotary, delta }]
        }
        "lock" => {
            let step = parse_step(words.next())?;
            let rotary = parse_rotary(words.next())?;
            let delta = parse_delta(words.next())?;
            vec![
                InputEvent::StepPressed(step),
                InputEvent::RotaryTurned { rotary, delta },
                InputEvent::StepReleased(step),
            ]
        }
        "press" => vec![InputEvent::RotaryPressed(parse_rotary(words.next())?)],
        "show" => return Ok(ConsoleCommand::Show),
        "help" | "?" => return Ok(ConsoleCommand::Help),
        "quit" | "exit" | "q" => return Ok(ConsoleCommand::Quit),
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(ConsoleCommand::Events(events))
}

/// One line per channel: `x` on, `f` fill, `r` ratchet, `.` off, `>` marks the playhead
pub fn render_grid(store: &PatternStore, playhead: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("length {}\n", store.default_length().label()));
    for channel in ChannelId::all() {
        let ch = store.channel(channel);
        out.push_str(&format!(
            "ch{} {:>4} {}",
            channel.index(),
            note_name(ch.base_pitch()),
            if ch.is_muted() { "M " } else { "  " }
        ));
        for step in StepIndex::all() {
            let slot = ch.step(step);
            let mark = if !ch.is_active(step) {
                '.'
            } else if slot.is_fill() {
                'f'
            } else if !slot.ratchet().is_off() {
                'r'
            } else {
                'x'
            };
            if step.index() == playhead {
                out.push('>');
            } else if step.index() % 4 == 0 {
                out.push(' ');
            }
            out.push(mark);
        }
        if ch.euclid().enabled {
            out.push_str(&format!(
                "  euclid {}/{} r{} {:?}",
                ch.euclid().pulses,
                STEPS,
                ch.euclid().rotation,
                ch.euclid().scale
            ));
        }
        out.push('\n');
    }
    out
}
