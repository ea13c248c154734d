use crate::CueError;

/// Recognizes channel toggle cue names such as `MIC04 - ON` or `MICALL - OFF` and renders the
/// network commands they stand for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPattern {
    pub prefix: String,
    pub first_channel: u32,
    pub last_channel: u32,
    /// Network patch the rendered commands are sent through.
    pub patch: u32,
    /// Command text with `{channel}` and `{value}` placeholders.
    pub template: String,
}

impl Default for CommandPattern {
    fn default() -> Self {
        Self {
            prefix: "MIC".to_string(),
            first_channel: 1,
            last_channel: 32,
            patch: 1,
            template: "/ch/{channel}/mix/on {value}".to_string(),
        }
    }
}

/// One channel switched on or off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkCommand {
    pub channel: u32,
    pub enabled: bool,
}

impl NetworkCommand {
    pub fn value(&self) -> u8 {
        u8::from(self.enabled)
    }

    fn action(&self) -> &'static str {
        if self.enabled {
            "ON"
        } else {
            "OFF"
        }
    }
}

impl CommandPattern {
    pub fn matches(&self, name: &str) -> bool {
        !self.prefix.is_empty() && name.starts_with(&self.prefix)
    }

    /// Expands a command cue name into one command per addressed channel.
    pub fn parse(&self, name: &str) -> Result<Vec<NetworkCommand>, CueError> {
        let malformed = || CueError::MalformedCommandPattern {
            name: name.to_string(),
            prefix: self.prefix.clone(),
        };

        let rest = name.strip_prefix(&self.prefix).ok_or_else(malformed)?;
        let (target, action) = split_action(rest).ok_or_else(malformed)?;
        let enabled = match action {
            "ON" => true,
            "OFF" => false,
            _ => return Err(malformed()),
        };

        if target == "ALL" {
            return Ok((self.first_channel..=self.last_channel)
                .map(|channel| NetworkCommand { channel, enabled })
                .collect());
        }

        if target.len() != 2 || !target.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let channel: u32 = target.parse().map_err(|_| malformed())?;
        if !(self.first_channel..=self.last_channel).contains(&channel) {
            return Err(malformed());
        }

        Ok(vec![NetworkCommand { channel, enabled }])
    }

    pub fn render(&self, command: &NetworkCommand) -> String {
        self.template
            .replace("{channel}", &format!("{:02}", command.channel))
            .replace("{value}", &command.value().to_string())
    }

    /// Human readable cue name, e.g. `MIC04 ON`.
    pub fn label(&self, command: &NetworkCommand) -> String {
        format!("{}{:02} {}", self.prefix, command.channel, command.action())
    }
}

/// Splits `XX - ACTION`, requiring exactly one whitespace character around the dash.
fn split_action(rest: &str) -> Option<(&str, &str)> {
    let dash = rest.find('-')?;
    let (target, action) = (&rest[..dash], &rest[dash + 1..]);

    let mut target_chars = target.chars();
    let separator = target_chars.next_back()?;
    let target = target_chars.as_str();

    let mut action_chars = action.chars();
    let leading = action_chars.next()?;
    let action = action_chars.as_str();

    let single_space = |c: char, side: &str| {
        c.is_whitespace() && !side.starts_with(char::is_whitespace) && !side.ends_with(char::is_whitespace)
    };
    (single_space(separator, target) && single_space(leading, action)).then_some((target, action))
}
