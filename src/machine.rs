//! This module defines the `Machine` struct, the owned context of the rig's Turing machine:
//! tape, head, state, run flag and the selected transition table. Its `step` method is the
//! transition interpreter.

use tracing::trace;

use crate::types::{
    Mode, State, Status, Step, Symbol, Tape, TransitionTable, CELL_COUNT, MAX_EXECUTION_STEPS,
};

/// The machine context.
///
/// Every component operation receives this explicitly; nothing about the machine lives
/// in shared globals.
#[derive(Debug, Clone)]
pub struct Machine {
    tape: Tape,
    head: usize,
    state: State,
    running: bool,
    table: Option<TransitionTable>,
    step_count: usize,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// Creates an idle machine: blank tape, head on cell 0, `READY`, not running.
    pub fn new() -> Self {
        Self {
            tape: Tape::blank(),
            head: 0,
            state: State::READY,
            running: false,
            table: None,
            step_count: 0,
        }
    }

    /// Replaces the tape, selects `table` and moves to its start state.
    ///
    /// The run flag is forced off; execution needs an explicit run request.
    pub fn load(&mut self, tape: Tape, table: TransitionTable) {
        self.tape = tape;
        self.head = 0;
        self.state = table.start;
        self.table = Some(table);
        self.running = false;
        self.step_count = 0;
    }

    /// Executes a single interpreter step with `sensed` as the symbol under the head.
    ///
    /// * `Step::Idle` when no program is loaded. The run flag is forced off.
    /// * `Step::Halt` when the machine is, or has just become, terminal.
    /// * `Step::Hold` when no rule matches. Nothing changes.
    /// * `Step::Continue` after a rule was applied.
    pub fn step(&mut self, sensed: Symbol) -> Step {
        if self.state == State::READY {
            self.running = false;
            return Step::Idle;
        }

        if self.state.is_terminal() {
            return Step::Halt;
        }

        let Some(transition) = self
            .table
            .as_ref()
            .and_then(|table| table.lookup(self.state, sensed))
            .copied()
        else {
            trace!(state = %self.state, symbol = ?sensed, head = self.head, "no rule, holding");
            return Step::Hold;
        };

        self.tape.set(self.head, transition.write);
        self.head = clamp_cell(self.head as i64 + transition.direction.delta());
        self.state = transition.next_state;
        self.step_count += 1;

        if self.state.is_terminal() {
            Step::Halt
        } else {
            Step::Continue
        }
    }

    /// Runs the interpreter with the recorded tape symbol as the sensed symbol until it
    /// stops advancing or `MAX_EXECUTION_STEPS` is reached.
    pub fn run(&mut self) -> Step {
        for _ in 0..MAX_EXECUTION_STEPS {
            match self.step(self.tape.get(self.head)) {
                Step::Continue => continue,
                other => return other,
            }
        }

        Step::Hold
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn table(&self) -> Option<&TransitionTable> {
        self.table.as_ref()
    }

    /// Returns the total number of rules applied since the last load.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Sets the run flag. A machine that is idle or halted cannot run, so the flag
    /// stays off for those states.
    pub fn set_running(&mut self, running: bool) {
        self.running = running && self.can_run();
    }

    /// `true` when a program is loaded and has not reached a terminal state.
    pub fn can_run(&self) -> bool {
        self.state != State::READY && !self.state.is_terminal()
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn status(&self, mode: Mode) -> Status {
        Status {
            head: self.head,
            state: self.state,
            mode: mode as u8,
            running: self.running,
            tape: self.tape.to_values(),
        }
    }
}

/// Clamps a cell index to the tape.
pub fn clamp_cell(cell: i64) -> usize {
    cell.clamp(0, CELL_COUNT as i64 - 1) as usize
}
