//! This module provides the `ProgramLoader`, which turns an operation request into the
//! initial tape and selects the matching transition table.

use tracing::info;

use crate::machine::Machine;
use crate::programs::ProgramManager;
use crate::types::{LoadRequest, RigError, Symbol, Tape, MAX_OPERAND};

/// `ProgramLoader` encodes operands in unary and loads them onto a machine.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Builds the initial tape `a` ones, a separator, `b` ones, blanks.
    ///
    /// Operands are clamped to `[0, MAX_OPERAND]`.
    pub fn encode(a: i64, b: i64) -> Tape {
        let a = a.clamp(0, MAX_OPERAND) as usize;
        let b = b.clamp(0, MAX_OPERAND) as usize;

        let mut tape = Tape::blank();
        for cell in 0..a {
            tape.set(cell, Symbol::One);
        }
        tape.set(a, Symbol::Separator);
        for cell in a + 1..a + 1 + b {
            tape.set(cell, Symbol::One);
        }

        tape
    }

    /// Loads `request` onto `machine`: fresh tape, head on cell 0, the operation's table
    /// and its start state, run flag off.
    pub fn load(machine: &mut Machine, request: LoadRequest) -> Result<(), RigError> {
        let table = ProgramManager::table_for(request.op)?;
        let tape = Self::encode(request.a, request.b);

        info!(tape = %tape, program = %table.name, start = %table.start, "program loaded");
        machine.load(tape, table.clone());

        Ok(())
    }

    /// A short human readable description such as `ADD 3 + 2`.
    pub fn describe(request: &LoadRequest) -> String {
        format!(
            "{} {} {} {}",
            request.op.to_string().to_uppercase(),
            request.a.clamp(0, MAX_OPERAND),
            request.op.operator(),
            request.b.clamp(0, MAX_OPERAND)
        )
    }
}
