use anyhow::{anyhow, bail, Result};
use client_core::Command;
use shared::domain::{SeatLabel, Zone};

pub const HELP: &str = "commands: <label> | toggle <label> | reset <label> | zone <T|C|B> | refresh | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Command(Command),
    Help,
    Quit,
}

/// Parses one stdin line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<UserInput>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if let Some(extra) = words.next() {
        bail!("unexpected '{extra}'; {HELP}");
    }

    let input = match (head.to_ascii_lowercase().as_str(), arg) {
        ("toggle" | "t", Some(label)) => UserInput::Command(Command::Toggle(parse_label(label)?)),
        ("reset" | "r", Some(label)) => UserInput::Command(Command::Reset(parse_label(label)?)),
        ("zone" | "z", Some(zone)) => UserInput::Command(Command::SwitchZone(
            zone.parse::<Zone>().map_err(|err| anyhow!("{err}"))?,
        )),
        ("refresh", None) => UserInput::Command(Command::Refresh),
        ("help" | "?", None) => UserInput::Help,
        ("quit" | "q" | "exit", None) => UserInput::Quit,
        (_, None) => UserInput::Command(Command::Toggle(parse_label(head)?)),
        (other, Some(_)) => bail!("unknown command '{other}'; {HELP}"),
    };
    Ok(Some(input))
}

fn parse_label(raw: &str) -> Result<SeatLabel> {
    raw.parse::<SeatLabel>().map_err(|err| anyhow!("{err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(raw: &str) -> SeatLabel {
        raw.parse().expect("label")
    }

    #[test]
    fn bare_label_toggles() {
        assert_eq!(
            parse_line(" t14 ").expect("parse"),
            Some(UserInput::Command(Command::Toggle(label("T14"))))
        );
    }

    #[test]
    fn long_and_short_forms_agree() {
        for (long, short) in [("toggle C3", "t C3"), ("reset B2", "r B2"), ("zone c", "z C")] {
            assert_eq!(parse_line(long).expect("long"), parse_line(short).expect("short"));
        }
        assert_eq!(
            parse_line("zone b").expect("parse"),
            Some(UserInput::Command(Command::SwitchZone(Zone::B)))
        );
    }

    #[test]
    fn control_words() {
        assert_eq!(parse_line("").expect("blank"), None);
        assert_eq!(parse_line("quit").expect("quit"), Some(UserInput::Quit));
        assert_eq!(parse_line("help").expect("help"), Some(UserInput::Help));
        assert_eq!(
            parse_line("refresh").expect("refresh"),
            Some(UserInput::Command(Command::Refresh))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_line("X9").is_err());
        assert!(parse_line("zone Q").is_err());
        assert!(parse_line("toggle T1 T2").is_err());
        assert!(parse_line("launch T1").is_err());
    }
}
