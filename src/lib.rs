//! This crate provides the control logic for a physical Turing machine rig.
//! An LED strip shows the tape, and a carriage moved by a stepper reads cells back through
//! a color sensor. It includes modules for parsing and analyzing transition tables,
//! interpreting them one cycle at a time, driving the carriage and the strip, and a
//! simulated board that stands in for the hardware.

pub mod ambient;
pub mod analyzer;
pub mod axis;
pub mod config;
pub mod display;
pub mod hal;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod scheduler;
pub mod sensor;
pub mod sim;
pub mod types;
pub mod visualizer;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
/// Re-exports the configuration types and lookup.
pub use config::{load_config, RigConfig};
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
/// Re-exports the `Machine` struct from the machine module.
pub use machine::Machine;
/// Re-exports the `parse` function from the parser module.
pub use parser::parse;
/// Re-exports `ProgramInfo`, `ProgramManager`, and `PROGRAMS` from the programs module.
pub use programs::{ProgramInfo, ProgramManager, PROGRAMS};
/// Re-exports the main loop.
pub use scheduler::{Board, Rig, Tick};
/// Re-exports the simulated board.
pub use sim::{ScriptedService, SimBoard};
/// Re-exports the types shared across the crate.
pub use types::{
    Direction, LoadRequest, Mode, Operation, Request, RigError, State, Status, Step, Symbol,
    Tape, Transition, TransitionTable, CELL_COUNT, MAX_EXECUTION_STEPS, MAX_OPERAND,
};
