//! Developer console commands.
//!
//! The registry is owned by the scene and handed text lines by the host. Commands never touch
//! the world directly: they either queue a `SceneCommand` for the end of the frame or report
//! something back.

use std::collections::BTreeMap;

use log::debug;

use crate::{
    collision::Vec3,
    commands::{SceneCommand, SceneCommands},
    error::DebugCommandError,
};

/// Result of a successfully parsed command.
#[derive(Clone, Debug, PartialEq)]
pub enum DebugAction {
    Queue(SceneCommand),
    ReportPosition,
}

/// What the console should show after running a command.
#[derive(Clone, Debug, PartialEq)]
pub enum DebugOutput {
    Queued,
    Position(Option<Vec3>),
}

pub type DebugHandler = Box<dyn Fn(&[&str]) -> Result<DebugAction, DebugCommandError>>;

pub struct DebugCommandRegistry {
    handlers: BTreeMap<String, DebugHandler>,
}

impl Default for DebugCommandRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("teleport", Box::new(parse_teleport));
        registry.register("getPos", Box::new(|args| {
            no_arguments("getPos", args)?;
            Ok(DebugAction::ReportPosition)
        }));
        registry.register("fly", Box::new(parse_fly));
        registry.register("reset", Box::new(|args| {
            no_arguments("reset", args)?;
            Ok(DebugAction::Queue(SceneCommand::Reset))
        }));
        registry
    }
}

impl DebugCommandRegistry {
    /// Registry with `teleport`, `getPos`, `fly` and `reset`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Add or replace a command.
    pub fn register(&mut self, name: &str, handler: DebugHandler) {
        self.handlers.insert(name.to_owned(), handler);
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Parse a console line into an action.
    pub fn parse(&self, line: &str) -> Result<DebugAction, DebugCommandError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(DebugCommandError::Empty)?;
        let args: Vec<&str> = words.collect();
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| DebugCommandError::Unknown(name.to_owned()))?;
        handler(&args)
    }

    /// Run a console line, queueing any world mutation into `commands`.
    pub fn execute(
        &self,
        line: &str,
        player_position: Option<Vec3>,
        commands: &mut SceneCommands,
    ) -> Result<DebugOutput, DebugCommandError> {
        debug!("debug console: `{line}`");
        match self.parse(line)? {
            DebugAction::Queue(command) => {
                commands.push(command);
                Ok(DebugOutput::Queued)
            }
            DebugAction::ReportPosition => Ok(DebugOutput::Position(player_position)),
        }
    }
}

fn invalid(command: &str, reason: impl Into<String>) -> DebugCommandError {
    DebugCommandError::InvalidArguments {
        command: command.to_owned(),
        reason: reason.into(),
    }
}

fn no_arguments(command: &str, args: &[&str]) -> Result<(), DebugCommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(invalid(command, "takes no arguments"))
    }
}

fn parse_teleport(args: &[&str]) -> Result<DebugAction, DebugCommandError> {
    let [x, y, z] = args else {
        return Err(invalid("teleport", "expected `teleport x y z`"));
    };
    let coord = |s: &str| {
        s.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid("teleport", format!("`{s}` is not a number")))
    };
    Ok(DebugAction::Queue(SceneCommand::Teleport {
        position: Vec3::new(coord(x)?, coord(y)?, coord(z)?),
        rotation: None,
    }))
}

fn parse_fly(args: &[&str]) -> Result<DebugAction, DebugCommandError> {
    let enabled = match args {
        [] => None,
        ["on"] => Some(true),
        ["off"] => Some(false),
        _ => return Err(invalid("fly", "expected `fly [on|off]`")),
    };
    Ok(DebugAction::Queue(SceneCommand::SetFlyMode(enabled)))
}
