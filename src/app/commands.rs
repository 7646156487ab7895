//! Inbound operator commands.
//!
//! Buttons, a console or a network client raise flags from any thread;
//! the controller takes (and clears) all of them once per tick and acts
//! on at most one.

use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the stack (Off → Startup).
    On,
    /// Stop the stack (Startup/On → Shutdown).
    Off,
    /// Acknowledge a fault (Error → Off) once readings are back in bounds.
    Reset,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Reset => "reset",
        })
    }
}

impl FromStr for Command {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "start" => Ok(Self::On),
            "off" | "stop" => Ok(Self::Off),
            "reset" => Ok(Self::Reset),
            _ => Err(ConfigError::UnknownCommand),
        }
    }
}

/// The three operator flags. Share behind an `Arc`.
#[derive(Debug, Default)]
pub struct CommandFlags {
    on: AtomicBool,
    off: AtomicBool,
    reset: AtomicBool,
}

/// Flags as taken by the controller for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCommands {
    pub on: bool,
    pub off: bool,
    pub reset: bool,
}

impl PendingCommands {
    pub fn any(&self) -> bool {
        self.on || self.off || self.reset
    }

    /// Raised commands in priority order: off, on, reset.
    pub fn by_priority(&self) -> impl Iterator<Item = Command> {
        [
            (self.off, Command::Off),
            (self.on, Command::On),
            (self.reset, Command::Reset),
        ]
        .into_iter()
        .filter_map(|(raised, cmd)| raised.then_some(cmd))
    }
}

impl CommandFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a flag. Raising one twice before a tick is the same as once.
    pub fn request(&self, command: Command) {
        let flag = match command {
            Command::On => &self.on,
            Command::Off => &self.off,
            Command::Reset => &self.reset,
        };
        flag.store(true, Ordering::Release);
    }

    /// Take every flag, clearing them.
    pub fn take(&self) -> PendingCommands {
        PendingCommands {
            on: self.on.swap(false, Ordering::AcqRel),
            off: self.off.swap(false, Ordering::AcqRel),
            reset: self.reset.swap(false, Ordering::AcqRel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!("ON".parse::<Command>(), Ok(Command::On));
        assert_eq!(" off\n".parse::<Command>(), Ok(Command::Off));
        assert_eq!("reset".parse::<Command>(), Ok(Command::Reset));
        assert_eq!("purge".parse::<Command>(), Err(ConfigError::UnknownCommand));
    }

    #[test]
    fn take_clears_flags() {
        let flags = CommandFlags::new();
        flags.request(Command::On);
        flags.request(Command::Reset);
        let taken = flags.take();
        assert!(taken.on && taken.reset && !taken.off);
        assert!(!flags.take().any());
    }

    #[test]
    fn priority_is_off_on_reset() {
        let all = PendingCommands {
            on: true,
            off: true,
            reset: true,
        };
        let order: Vec<Command> = all.by_priority().collect();
        assert_eq!(order, vec![Command::Off, Command::On, Command::Reset]);
    }

    #[test]
    fn flags_are_shareable_across_threads() {
        let flags = std::sync::Arc::new(CommandFlags::new());
        let remote = std::sync::Arc::clone(&flags);
        std::thread::spawn(move || remote.request(Command::Off))
            .join()
            .unwrap();
        assert!(flags.take().off);
    }
}
