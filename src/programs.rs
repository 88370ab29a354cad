//! The fixed programs the rig ships with, embedded at compile time and parsed once.

use crate::types::{Operation, RigError, TransitionTable};

// Embedded programs
const PROGRAM_TEXTS: [&str; 2] = [
    include_str!("../programs/addition.tm"),
    include_str!("../programs/subtraction.tm"),
];

lazy_static::lazy_static! {
    pub static ref PROGRAMS: Vec<TransitionTable> = PROGRAM_TEXTS
        .iter()
        .filter_map(|text| match crate::parser::parse(text) {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::error!(error = %e, "failed to parse embedded program");
                None
            }
        })
        .collect();
}

pub struct ProgramManager;

impl ProgramManager {
    /// Get the number of available programs
    pub fn count() -> usize {
        PROGRAMS.len()
    }

    /// Get the table implementing `operation`
    pub fn table_for(operation: Operation) -> Result<&'static TransitionTable, RigError> {
        PROGRAMS
            .iter()
            .find(|table| table.operation == operation)
            .ok_or(RigError::ProgramNotFound(operation))
    }

    /// Get a program by its index
    pub fn get_program_by_index(index: usize) -> Result<&'static TransitionTable, RigError> {
        PROGRAMS.get(index).ok_or_else(|| {
            RigError::ValidationError(format!("Program index {} out of range", index))
        })
    }

    /// List all program names
    pub fn list_program_names() -> Vec<String> {
        PROGRAMS.iter().map(|table| table.name.clone()).collect()
    }

    /// Get information about a program by its index
    pub fn get_program_info(index: usize) -> Result<ProgramInfo, RigError> {
        let table = Self::get_program_by_index(index)?;

        Ok(ProgramInfo {
            index,
            name: table.name.clone(),
            operation: table.operation,
            start_state: table.start.0,
            state_count: table.rules.len(),
            transition_count: table.transition_count(),
        })
    }

    /// Get the source text of a program by its index
    pub fn get_program_text_by_index(index: usize) -> Result<&'static str, RigError> {
        PROGRAM_TEXTS.get(index).copied().ok_or_else(|| {
            RigError::ValidationError(format!("Program text index {} out of range", index))
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub operation: Operation,
    pub start_state: u8,
    pub state_count: usize,
    pub transition_count: usize,
}
