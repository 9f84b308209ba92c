use anyhow::{anyhow, bail, Context, Result};
use std::str::FromStr;
use strum::{EnumString, VariantNames};

/// A user action the session carries out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Toggle {
        address: String,
        number: u8,
        on: bool,
    },
    Trigger {
        address: String,
        number: u8,
    },
    ToggleGroup {
        address: String,
        group: String,
        on: bool,
    },
    ToggleAll {
        on: bool,
    },
    ToggleCustomGroup {
        name: String,
        on: bool,
    },
    Renumber {
        address: String,
        number: u8,
        new_number: u8,
    },
    Rename {
        address: String,
        number: u8,
        name: String,
    },
    RefreshMatrix {
        address: String,
    },
    /// Name an input; an empty name restores the default label.
    RenameInput {
        address: String,
        number: u8,
        name: String,
    },
    /// Set a group's icon; an empty icon restores the default.
    SetGroupIcon {
        address: String,
        group: String,
        icon: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
enum Verb {
    On,
    Off,
    Trigger,
    Group,
    All,
    Custom,
    Renumber,
    Rename,
    Matrix,
    Label,
    Icon,
}

/// Usage lines for every console command, in the order [`parse_intent`] accepts them.
pub const INTENT_USAGE: &[&str] = &[
    "on <ip> <number>",
    "off <ip> <number>",
    "trigger <ip> <number>",
    "group <ip> <group name> on|off",
    "all on|off",
    "custom <custom group name> on|off",
    "renumber <ip> <number> <new number>",
    "rename <ip> <number> <new name>",
    "matrix <ip>",
    "label <ip> <input number> [name]",
    "icon <ip> <group name> <icon>|none",
];

fn parse_state(word: &str) -> Result<bool> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        other => bail!("Expected on or off, got \"{other}\""),
    }
}

fn parse_number(word: &str) -> Result<u8> {
    word.parse()
        .with_context(|| format!("\"{word}\" is not a device number"))
}

/// Split `rest` into a free-form name and a trailing `on|off`.
fn name_and_state<'a>(rest: &[&'a str]) -> Result<(String, bool)> {
    let Some((state, name)) = rest.split_last() else {
        bail!("Missing name and on|off");
    };
    if name.is_empty() {
        bail!("Missing name");
    }
    Ok((name.join(" "), parse_state(state)?))
}

/// Parse one console line into an [`Intent`].
pub fn parse_intent(line: &str) -> Result<Intent> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((first, rest)) = words.split_first() else {
        bail!("Empty command");
    };
    let verb = Verb::from_str(&first.to_lowercase()).map_err(|_| {
        anyhow!(
            "Unknown command \"{first}\" (expected one of {})",
            Verb::VARIANTS.join(", ")
        )
    })?;

    let intent = match (verb, rest) {
        (Verb::On | Verb::Off, [address, number]) => Intent::Toggle {
            address: address.to_string(),
            number: parse_number(number)?,
            on: verb == Verb::On,
        },
        (Verb::Trigger, [address, number]) => Intent::Trigger {
            address: address.to_string(),
            number: parse_number(number)?,
        },
        (Verb::Group, [address, tail @ ..]) if !tail.is_empty() => {
            let (group, on) = name_and_state(tail)?;
            Intent::ToggleGroup {
                address: address.to_string(),
                group,
                on,
            }
        }
        (Verb::All, [state]) => Intent::ToggleAll {
            on: parse_state(state)?,
        },
        (Verb::Custom, tail) if !tail.is_empty() => {
            let (name, on) = name_and_state(tail)?;
            Intent::ToggleCustomGroup { name, on }
        }
        (Verb::Renumber, [address, number, new_number]) => Intent::Renumber {
            address: address.to_string(),
            number: parse_number(number)?,
            new_number: parse_number(new_number)?,
        },
        (Verb::Rename, [address, number, name @ ..]) if !name.is_empty() => Intent::Rename {
            address: address.to_string(),
            number: parse_number(number)?,
            name: name.join(" "),
        },
        (Verb::Matrix, [address]) => Intent::RefreshMatrix {
            address: address.to_string(),
        },
        (Verb::Label, [address, number, name @ ..]) => Intent::RenameInput {
            address: address.to_string(),
            number: parse_number(number)?,
            name: name.join(" "),
        },
        (Verb::Icon, [address, group @ .., icon]) if !group.is_empty() => Intent::SetGroupIcon {
            address: address.to_string(),
            group: group.join(" "),
            icon: if icon.eq_ignore_ascii_case("none") {
                String::new()
            } else {
                icon.to_string()
            },
        },
        _ => {
            let usage = INTENT_USAGE
                .iter()
                .find(|u| u.split_whitespace().next() == Some(first.to_lowercase().as_str()))
                .copied()
                .unwrap_or_default();
            bail!("Usage: {usage}")
        }
    };
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toggles_and_trigger() -> Result<()> {
        assert_eq!(
            parse_intent("on 192.168.4.1 3")?,
            Intent::Toggle {
                address: "192.168.4.1".into(),
                number: 3,
                on: true
            }
        );
        assert_eq!(
            parse_intent("  OFF 10.0.0.2 0 ")?,
            Intent::Toggle {
                address: "10.0.0.2".into(),
                number: 0,
                on: false
            }
        );
        assert_eq!(
            parse_intent("trigger 10.0.0.2 5")?,
            Intent::Trigger {
                address: "10.0.0.2".into(),
                number: 5
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_input_labels_and_icons() -> Result<()> {
        assert_eq!(
            parse_intent("label 10.0.0.2 3 Back door")?,
            Intent::RenameInput {
                address: "10.0.0.2".into(),
                number: 3,
                name: "Back door".into()
            }
        );
        assert_eq!(
            parse_intent("label 10.0.0.2 3")?,
            Intent::RenameInput {
                address: "10.0.0.2".into(),
                number: 3,
                name: String::new()
            }
        );
        assert_eq!(
            parse_intent("icon 10.0.0.2 Living room 💡")?,
            Intent::SetGroupIcon {
                address: "10.0.0.2".into(),
                group: "Living room".into(),
                icon: "💡".into()
            }
        );
        assert_eq!(
            parse_intent("icon 10.0.0.2 Lights none")?,
            Intent::SetGroupIcon {
                address: "10.0.0.2".into(),
                group: "Lights".into(),
                icon: String::new()
            }
        );
        let err = parse_intent("icon 10.0.0.2 💡").unwrap_err();
        assert_eq!(err.to_string(), "Usage: icon <ip> <group name> <icon>|none");
        Ok(())
    }

    #[test]
    fn test_parse_names_with_spaces() -> Result<()> {
        assert_eq!(
            parse_intent("group 10.0.0.2 Living room on")?,
            Intent::ToggleGroup {
                address: "10.0.0.2".into(),
                group: "Living room".into(),
                on: true
            }
        );
        assert_eq!(
            parse_intent("custom Night mode off")?,
            Intent::ToggleCustomGroup {
                name: "Night mode".into(),
                on: false
            }
        );
        assert_eq!(
            parse_intent("rename 10.0.0.2 4 Garage door")?,
            Intent::Rename {
                address: "10.0.0.2".into(),
                number: 4,
                name: "Garage door".into()
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(parse_intent("").is_err());
        assert!(parse_intent("dance 10.0.0.2").is_err());
        assert!(parse_intent("on 10.0.0.2 x").is_err());
        assert!(parse_intent("on 10.0.0.2 300").is_err());
        assert!(parse_intent("all maybe").is_err());
        assert!(parse_intent("group 10.0.0.2 on").is_err());

        let err = parse_intent("renumber 10.0.0.2 1").unwrap_err();
        assert_eq!(err.to_string(), "Usage: renumber <ip> <number> <new number>");
    }
}
