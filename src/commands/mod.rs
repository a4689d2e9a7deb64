// Control surface commands
//
// A small line-oriented command language driving the equalizer pipeline:
//   gain <band> <db>   volume <percent>   reset
//   start   stop   toggle   bands   status   devices   debug <on|off>   quit

pub mod equalizer;

use std::str::FromStr;

pub use equalizer::*;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetGain { band: usize, gain_db: f32 },
    /// Master volume in percent (100 = unity)
    SetVolume { percent: f32 },
    ResetGains,
    Start,
    Stop,
    Toggle,
    Bands,
    Status,
    Devices,
    AudioDebug(bool),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("'{value}' is not a valid {what}")]
    BadArgument { what: &'static str, value: String },
}

fn parse_arg<T: FromStr>(value: Option<&str>, what: &'static str, usage: &'static str) -> Result<T, CommandError> {
    let value = value.ok_or(CommandError::Usage(usage))?;
    value.parse().map_err(|_| CommandError::BadArgument {
        what,
        value: value.to_string(),
    })
}

impl FromStr for ControlCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?.to_lowercase();

        let command = match verb.as_str() {
            "gain" => {
                const USAGE: &str = "gain <band> <db>";
                let band = parse_arg(words.next(), "band index", USAGE)?;
                let gain_db = parse_arg(words.next(), "gain in dB", USAGE)?;
                ControlCommand::SetGain { band, gain_db }
            }
            "volume" | "vol" => {
                let percent = parse_arg(words.next(), "volume percentage", "volume <percent>")?;
                ControlCommand::SetVolume { percent }
            }
            "reset" => ControlCommand::ResetGains,
            "start" => ControlCommand::Start,
            "stop" => ControlCommand::Stop,
            "toggle" => ControlCommand::Toggle,
            "bands" => ControlCommand::Bands,
            "status" | "stats" => ControlCommand::Status,
            "devices" => ControlCommand::Devices,
            "debug" => match words.next() {
                Some("on") => ControlCommand::AudioDebug(true),
                Some("off") => ControlCommand::AudioDebug(false),
                _ => return Err(CommandError::Usage("debug <on|off>")),
            },
            "help" | "?" => ControlCommand::Help,
            "quit" | "exit" | "q" => ControlCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  gain <band> <db>    set one band's gain (-20..20 dB)
  volume <percent>    set master volume (0..200 %)
  reset               flatten every band to 0 dB
  start | stop        start or stop equalizing
  toggle              switch between running and stopped
  bands               list bands with their current gains
  status              pipeline counters as JSON
  devices             list audio devices
  debug <on|off>      per-cycle audio debug logging
  quit                stop and exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gain() {
        assert_eq!(
            "gain 3 -4.5".parse::<ControlCommand>(),
            Ok(ControlCommand::SetGain {
                band: 3,
                gain_db: -4.5
            })
        );
        assert_eq!(
            "GAIN 3".parse::<ControlCommand>(),
            Err(CommandError::Usage("gain <band> <db>"))
        );
        assert!(matches!(
            "gain x 1".parse::<ControlCommand>(),
            Err(CommandError::BadArgument { what: "band index", .. })
        ));
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!("  toggle ".parse::<ControlCommand>(), Ok(ControlCommand::Toggle));
        assert_eq!("volume 150".parse::<ControlCommand>(), Ok(ControlCommand::SetVolume { percent: 150.0 }));
        assert_eq!("debug on".parse::<ControlCommand>(), Ok(ControlCommand::AudioDebug(true)));
        assert_eq!("".parse::<ControlCommand>(), Err(CommandError::Empty));
        assert_eq!(
            "louder".parse::<ControlCommand>(),
            Err(CommandError::Unknown("louder".to_string()))
        );
    }
}
