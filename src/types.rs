//! This module defines the core data structures and types used throughout the rig,
//! including tape symbols, machine states, transition tables, requests and error types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::hal::HardwareError;
use crate::Rule;

/// The number of cells on the physical tape.
pub const CELL_COUNT: usize = 13;
/// The largest operand accepted by a load request.
pub const MAX_OPERAND: i64 = 5;
/// The maximum number of interpreter steps `Machine::run` executes before giving up.
pub const MAX_EXECUTION_STEPS: usize = 1000;

/// A symbol stored in a tape cell.
///
/// The numeric values are the ones reported by the status document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Symbol {
    /// An empty cell. The sensor reports these as "zero" readings.
    #[default]
    Blank = 0,
    /// A unary digit.
    One = 1,
    /// The operand separator. Written once by the loader.
    Separator = 2,
}

impl Symbol {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The character used for this symbol in program files.
    pub fn as_char(self) -> char {
        match self {
            Symbol::Blank => '_',
            Symbol::One => '1',
            Symbol::Separator => '|',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '_' => Some(Symbol::Blank),
            '1' => Some(Symbol::One),
            '|' => Some(Symbol::Separator),
            _ => None,
        }
    }
}

/// A machine state identifier.
///
/// `READY` means no program is loaded. `HALT` and `UNDERFLOW` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub u8);

impl State {
    pub const READY: State = State(0);
    pub const UNDERFLOW: State = State(98);
    pub const HALT: State = State(99);

    /// Returns `true` for the reserved states a program may stop in.
    pub fn is_terminal(self) -> bool {
        self == State::HALT || self == State::UNDERFLOW
    }

    /// Returns `true` for every id a program may not define rules for.
    pub fn is_reserved(self) -> bool {
        self == State::READY || self.is_terminal()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            State::HALT => write!(f, "halt"),
            State::UNDERFLOW => write!(f, "underflow"),
            State(id) => write!(f, "q{id}"),
        }
    }
}

/// The fixed-size tape.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tape([Symbol; CELL_COUNT]);

impl Tape {
    pub fn blank() -> Self {
        Self::default()
    }

    /// Builds a tape from a program-file style string such as `"111|11"`.
    /// Missing cells are blank and extra characters are ignored.
    pub fn from_str_lossy(input: &str) -> Self {
        let mut tape = Self::blank();
        for (cell, c) in input.chars().take(CELL_COUNT).enumerate() {
            tape.0[cell] = Symbol::from_char(c).unwrap_or_default();
        }
        tape
    }

    pub fn get(&self, cell: usize) -> Symbol {
        self.0.get(cell).copied().unwrap_or_default()
    }

    /// Writes `symbol` at `cell`. Writes past the end are dropped.
    pub fn set(&mut self, cell: usize, symbol: Symbol) {
        if let Some(slot) = self.0.get_mut(cell) {
            *slot = symbol;
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.0.iter().filter(|&&s| s == symbol).count()
    }

    pub fn to_values(&self) -> Vec<u8> {
        self.0.iter().map(|s| s.as_u8()).collect()
    }
}

impl fmt::Display for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in &self.0 {
            write!(f, "{}", symbol.as_char())?;
        }
        Ok(())
    }
}

/// The arithmetic operation a program implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
}

impl Operation {
    pub fn operator(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
        }
    }
}

impl FromStr for Operation {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" | "+" => Ok(Operation::Add),
            "sub" | "subtract" | "-" => Ok(Operation::Subtract),
            other => Err(RigError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => write!(f, "add"),
            Operation::Subtract => write!(f, "sub"),
        }
    }
}

/// A transition table: one Turing machine program.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTable {
    /// The name of the program.
    pub name: String,
    /// The operation the program computes.
    pub operation: Operation,
    /// The state a freshly loaded machine starts in.
    pub start: State,
    /// The transition rules keyed by the current state.
    pub rules: HashMap<State, Vec<Transition>>,
}

impl TransitionTable {
    /// Finds the rule for `state` reading `symbol`.
    pub fn lookup(&self, state: State, symbol: Symbol) -> Option<&Transition> {
        self.rules
            .get(&state)?
            .iter()
            .find(|transition| transition.read == symbol)
    }

    pub fn transition_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

/// A single transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The symbol under the head.
    pub read: Symbol,
    /// The symbol written back.
    pub write: Symbol,
    /// Where the head goes afterwards.
    pub direction: Direction,
    /// The state the machine transitions to.
    pub next_state: State,
}

/// Represents the possible directions the head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one cell to the left.
    Left,
    /// Move the head one cell to the right.
    Right,
    /// Keep the head in the same cell.
    Stay,
}

impl Direction {
    pub fn delta(self) -> i64 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
            Direction::Stay => 0,
        }
    }
}

/// Represents the outcome of one interpreter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No program is loaded; nothing happened.
    Idle,
    /// A rule was applied and the machine keeps going.
    Continue,
    /// No rule matched; tape, head and state are unchanged.
    Hold,
    /// The machine is in a terminal state.
    Halt,
}

/// What the LED strip is currently used for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Mode {
    /// The strip shows the tape and the machine may run.
    #[default]
    Turing = 0,
    Rainbow = 1,
    Fade = 2,
    Confetti = 3,
    Off = 4,
}

impl Mode {
    pub fn is_machine(self) -> bool {
        self == Mode::Turing
    }
}

impl FromStr for Mode {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "turing" => Ok(Mode::Turing),
            "rainbow" => Ok(Mode::Rainbow),
            "fade" => Ok(Mode::Fade),
            "confetti" => Ok(Mode::Confetti),
            "off" => Ok(Mode::Off),
            other => Err(RigError::UnknownMode(other.to_string())),
        }
    }
}

/// A request to load a program onto the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub a: i64,
    pub b: i64,
    pub op: Operation,
}

/// A control request coming from the request-serving collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Load(LoadRequest),
    Run(bool),
    Mode(Mode),
}

/// The status document answered to status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub head: usize,
    pub state: State,
    pub mode: u8,
    pub running: bool,
    pub tape: Vec<u8>,
}

impl Status {
    /// The status document as sent to status queries.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Represents the errors surfaced by the rig.
#[derive(Debug, Error)]
pub enum RigError {
    /// Indicates an error during the parsing of a program definition.
    #[error("Program parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates a program that parsed but is not a usable transition table.
    #[error("Program validation error: {0}")]
    ValidationError(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    /// No embedded program implements the requested operation.
    #[error("No program for operation '{0}'")]
    ProgramNotFound(Operation),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// A positioning command was issued before the axis established its origin.
    #[error("Axis is not homed")]
    NotHomed,
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_delta() {
        assert_eq!(Direction::Left.delta(), -1);
        assert_eq!(Direction::Right.delta(), 1);
        assert_eq!(Direction::Stay.delta(), 0);
    }

    #[test]
    fn test_symbol_values_match_status_encoding() {
        assert_eq!(Symbol::Blank.as_u8(), 0);
        assert_eq!(Symbol::One.as_u8(), 1);
        assert_eq!(Symbol::Separator.as_u8(), 2);
    }

    #[test]
    fn test_tape_from_str_lossy() {
        let tape = Tape::from_str_lossy("111|11");
        assert_eq!(tape.to_values(), vec![1, 1, 1, 2, 1, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(tape.to_string(), "111|11_______");
        assert_eq!(tape.count(Symbol::One), 5);
    }

    #[test]
    fn test_tape_ignores_out_of_range_writes() {
        let mut tape = Tape::blank();
        tape.set(CELL_COUNT, Symbol::One);
        assert_eq!(tape, Tape::blank());
        assert_eq!(tape.get(CELL_COUNT + 4), Symbol::Blank);
    }

    #[test]
    fn test_state_classification() {
        assert!(State::HALT.is_terminal());
        assert!(State::UNDERFLOW.is_terminal());
        assert!(!State::READY.is_terminal());
        assert!(State::READY.is_reserved());
        assert!(!State(10).is_reserved());
        assert_eq!(State(21).to_string(), "q21");
        assert_eq!(State::HALT.to_string(), "halt");
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("add".parse::<Operation>().unwrap(), Operation::Add);
        assert_eq!("SUB".parse::<Operation>().unwrap(), Operation::Subtract);
        assert_eq!("-".parse::<Operation>().unwrap(), Operation::Subtract);

        let error = "mul".parse::<Operation>().unwrap_err();
        assert_eq!(error.to_string(), "Unknown operation: mul");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("confetti".parse::<Mode>().unwrap(), Mode::Confetti);
        assert_eq!(Mode::Off as u8, 4);
        assert!("disco".parse::<Mode>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let status = Status {
            head: 2,
            state: State(10),
            mode: Mode::Turing as u8,
            running: true,
            tape: Tape::from_str_lossy("1|1").to_values(),
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["head"], 2);
        assert_eq!(json["state"], 10);
        assert_eq!(json["running"], true);
        assert_eq!(json["tape"][1], 2);
    }
}
