use eyre::{
    bail,
    eyre,
    Context as _,
    Result,
};
use meet_faces_config::SettingsKey;
use std::str::FromStr;
use strum::IntoEnumIterator as _;

/// One line typed into the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the participant directory as JSON.
    Participants,
    /// Print the stored settings.
    Settings,
    Set(SettingsKey, bool),
    /// Re-read the settings after the file was edited by hand.
    Reload,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = eyre::Report;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            bail!("empty command");
        };

        let parsed = match command {
            "participants" | "p" => Command::Participants,
            "settings" => Command::Settings,
            "set" => {
                let key = words.next().ok_or_else(|| eyre!("usage: set <key> <true|false>"))?;
                let key = SettingsKey::from_str(key).wrap_err_with(|| format!("unknown setting {key:?}"))?;
                let value = words.next().ok_or_else(|| eyre!("usage: set {key} <true|false>"))?;
                let value = parse_switch(value)?;
                Command::Set(key, value)
            }
            "reload" => Command::Reload,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command {other:?}, try `help`"),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected argument {extra:?}");
        }

        Ok(parsed)
    }
}

fn parse_switch(value: &str) -> Result<bool> {
    match value {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => bail!("expected true or false, got {other:?}"),
    }
}

pub fn help() -> String {
    let keys = SettingsKey::iter().map(|key| key.to_string()).collect::<Vec<_>>().join(", ");
    format!(
        "commands:\n  \
         participants          print the participant directory\n  \
         settings              print the stored settings\n  \
         set <key> <on|off>    change a setting ({keys})\n  \
         reload                re-read the settings file\n  \
         quit                  close the meeting session"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_commands() {
        assert_eq!("participants".parse::<Command>().unwrap(), Command::Participants);
        assert_eq!("  q ".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!(
            "set includeYou on".parse::<Command>().unwrap(),
            Command::Set(SettingsKey::IncludeYou, true)
        );
        assert_eq!(
            "set enabled false".parse::<Command>().unwrap(),
            Command::Set(SettingsKey::IsEnabled, false)
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!("".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("set debugging".parse::<Command>().is_err());
        assert!("set debugging maybe".parse::<Command>().is_err());
        assert!("set volume on".parse::<Command>().is_err());
        assert!("reload now".parse::<Command>().is_err());
    }

    #[test]
    fn help_lists_every_setting() {
        let help = help();
        for key in SettingsKey::iter() {
            assert!(help.contains(&key.to_string()), "{key} missing");
        }
    }
}
