//! Command vocabulary shared by presenters and the host OS.

use crate::error::PlaybackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media actions delivered by the OS (notification buttons, headset keys,
/// lock screen, audio routing changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaCommand {
    SkipPrevious,
    SkipNext,
    Play,
    Pause,
    /// Dismiss the player; refused while audio renders.
    Close,
    PlayPause,
    /// Audio output is about to switch to the speaker (headset unplugged).
    AudioBecomingNoisy,
}

impl MediaCommand {
    pub const ALL: [MediaCommand; 7] = [
        MediaCommand::SkipPrevious,
        MediaCommand::SkipNext,
        MediaCommand::Play,
        MediaCommand::Pause,
        MediaCommand::Close,
        MediaCommand::PlayPause,
        MediaCommand::AudioBecomingNoisy,
    ];

    /// Action string used by hosts.
    pub fn action(self) -> &'static str {
        match self {
            MediaCommand::SkipPrevious => "SKIP_PREVIOUS",
            MediaCommand::SkipNext => "SKIP_NEXT",
            MediaCommand::Play => "PLAY",
            MediaCommand::Pause => "PAUSE",
            MediaCommand::Close => "CLOSE",
            MediaCommand::PlayPause => "PLAY_PAUSE",
            MediaCommand::AudioBecomingNoisy => "AUDIO_BECOMING_NOISY",
        }
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

impl FromStr for MediaCommand {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = s.trim();
        Self::ALL
            .into_iter()
            .find(|command| command.action().eq_ignore_ascii_case(action))
            .ok_or_else(|| PlaybackError::UnknownCommand(action.to_string()))
    }
}

/// Why a command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Audio focus was not granted.
    FocusDenied,
    /// The engine is rendering and the command would interrupt it.
    Busy,
}

/// What the engine did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// State changed as requested.
    Applied,
    /// Accepted; takes effect once the current track is prepared.
    Deferred,
    /// Nothing to do in the current state.
    Ignored,
    Rejected(RejectReason),
}

impl CommandOutcome {
    /// `Applied` or `Deferred`.
    pub fn is_accepted(self) -> bool {
        matches!(self, CommandOutcome::Applied | CommandOutcome::Deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_back_to_commands() {
        for command in MediaCommand::ALL {
            assert_eq!(command.action().parse::<MediaCommand>().unwrap(), command);
        }
        assert_eq!(" play_pause ".parse::<MediaCommand>().unwrap(), MediaCommand::PlayPause);
    }

    #[test]
    fn unknown_action_is_an_error() {
        let err = "REWIND".parse::<MediaCommand>().unwrap_err();
        assert!(matches!(err, PlaybackError::UnknownCommand(action) if action == "REWIND"));
    }

    #[test]
    fn outcome_acceptance() {
        assert!(CommandOutcome::Deferred.is_accepted());
        assert!(!CommandOutcome::Rejected(RejectReason::Busy).is_accepted());
    }
}
