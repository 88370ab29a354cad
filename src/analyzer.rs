//! This module provides functions for analyzing transition tables to detect common errors
//! before a table is offered to the machine. This includes checks for a usable start state,
//! defined next states, reachable states, and ambiguous rules.

use crate::types::{RigError, State, TransitionTable};
use std::collections::HashSet;

/// Represents the errors that can be found during the analysis of a transition table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The start state is reserved (`ready`, `halt`, `underflow`) or has no rules.
    InvalidStartState(State),
    /// Rules define behavior for a reserved state.
    ReservedStates(Vec<State>),
    /// Transitions reference states that are neither defined nor terminal.
    UndefinedNextStates(Vec<String>),
    /// States that are defined but cannot be reached from the start state.
    UnreachableStates(Vec<State>),
    /// A state has more than one rule for the same symbol.
    AmbiguousRules(Vec<String>),
}

impl From<AnalysisError> for RigError {
    /// Converts an `AnalysisError` into a `RigError::ValidationError`.
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::InvalidStartState(state) => {
                RigError::ValidationError(format!("Invalid start state: {}", state))
            }
            AnalysisError::ReservedStates(states) => RigError::ValidationError(format!(
                "Rules defined for reserved states: {:?}",
                states.iter().map(ToString::to_string).collect::<Vec<_>>()
            )),
            AnalysisError::UndefinedNextStates(transitions) => RigError::ValidationError(
                format!("Transitions reference undefined states: {:?}", transitions),
            ),
            AnalysisError::UnreachableStates(states) => RigError::ValidationError(format!(
                "Unreachable states detected: {:?}",
                states.iter().map(ToString::to_string).collect::<Vec<_>>()
            )),
            AnalysisError::AmbiguousRules(rules) => RigError::ValidationError(format!(
                "More than one rule reads the same symbol: {:?}",
                rules
            )),
        }
    }
}

/// Analyzes a `TransitionTable` for structural and logical errors.
///
/// Checks run in order and the first failure is returned.
pub fn analyze(table: &TransitionTable) -> Result<(), RigError> {
    let first_error = [
        check_valid_start_state,
        check_reserved_states,
        check_ambiguous_rules,
        check_undefined_next_states,
        check_unreachable_states,
    ]
    .iter()
    .find_map(|f| f(table).err());

    match first_error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Checks that the start state is an ordinary state with at least one rule.
fn check_valid_start_state(table: &TransitionTable) -> Result<(), AnalysisError> {
    let has_rules = table
        .rules
        .get(&table.start)
        .is_some_and(|transitions| !transitions.is_empty());

    if table.start.is_reserved() || !has_rules {
        return Err(AnalysisError::InvalidStartState(table.start));
    }

    Ok(())
}

fn check_reserved_states(table: &TransitionTable) -> Result<(), AnalysisError> {
    let mut reserved: Vec<State> = table
        .rules
        .keys()
        .copied()
        .filter(|state| state.is_reserved())
        .collect();

    if !reserved.is_empty() {
        reserved.sort();
        return Err(AnalysisError::ReservedStates(reserved));
    }

    Ok(())
}

/// Checks that no state carries two rules for the same read symbol. Lookup takes the
/// first match, so a second rule would be silently dead.
fn check_ambiguous_rules(table: &TransitionTable) -> Result<(), AnalysisError> {
    let mut ambiguous = Vec::new();

    for (state, transitions) in &table.rules {
        let mut seen = HashSet::new();
        for transition in transitions {
            if !seen.insert(transition.read) {
                ambiguous.push(format!("{} reading {}", state, transition.read.as_char()));
            }
        }
    }

    if !ambiguous.is_empty() {
        ambiguous.sort();
        return Err(AnalysisError::AmbiguousRules(ambiguous));
    }

    Ok(())
}

/// Checks that all `next_state` references point to defined states. Terminal states are
/// implicitly defined.
fn check_undefined_next_states(table: &TransitionTable) -> Result<(), AnalysisError> {
    let mut undefined = Vec::new();

    for (state, transitions) in &table.rules {
        for transition in transitions {
            let next = transition.next_state;
            if !next.is_terminal() && !table.rules.contains_key(&next) {
                undefined.push(format!(
                    "{} [{}] -> {}",
                    state,
                    transition.read.as_char(),
                    next
                ));
            }
        }
    }

    if !undefined.is_empty() {
        undefined.sort();
        return Err(AnalysisError::UndefinedNextStates(undefined));
    }

    Ok(())
}

/// Checks for unreachable states by traversing the rules from the start state.
fn check_unreachable_states(table: &TransitionTable) -> Result<(), AnalysisError> {
    let mut visited = HashSet::new();
    let mut queue = vec![table.start];

    while let Some(state) = queue.pop() {
        if !visited.insert(state) {
            continue;
        }

        if let Some(transitions) = table.rules.get(&state) {
            queue.extend(
                transitions
                    .iter()
                    .map(|transition| transition.next_state)
                    .filter(|next| !visited.contains(next)),
            );
        }
    }

    let mut unreachable: Vec<State> = table
        .rules
        .keys()
        .copied()
        .filter(|state| !visited.contains(state))
        .collect();

    if !unreachable.is_empty() {
        unreachable.sort();
        return Err(AnalysisError::UnreachableStates(unreachable));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Operation, Symbol, Transition};
    use std::collections::HashMap;

    fn rule(read: Symbol, write: Symbol, direction: Direction, next: u8) -> Transition {
        Transition {
            read,
            write,
            direction,
            next_state: State(next),
        }
    }

    fn table(start: u8, rules: Vec<(u8, Vec<Transition>)>) -> TransitionTable {
        TransitionTable {
            name: "test".to_string(),
            operation: Operation::Add,
            start: State(start),
            rules: rules
                .into_iter()
                .map(|(state, transitions)| (State(state), transitions))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_valid_table() {
        let table = table(
            10,
            vec![
                (10, vec![rule(Symbol::One, Symbol::One, Direction::Right, 11)]),
                (11, vec![rule(Symbol::Blank, Symbol::Blank, Direction::Stay, 99)]),
            ],
        );
        assert!(analyze(&table).is_ok());
    }

    #[test]
    fn test_start_state_without_rules() {
        let table = table(
            12,
            vec![(10, vec![rule(Symbol::One, Symbol::One, Direction::Right, 99)])],
        );
        assert_eq!(
            check_valid_start_state(&table),
            Err(AnalysisError::InvalidStartState(State(12)))
        );
    }

    #[test]
    fn test_reserved_start_state() {
        let table = table(
            0,
            vec![(0, vec![rule(Symbol::One, Symbol::One, Direction::Right, 99)])],
        );
        assert_eq!(
            check_valid_start_state(&table),
            Err(AnalysisError::InvalidStartState(State::READY))
        );
        assert_eq!(
            check_reserved_states(&table),
            Err(AnalysisError::ReservedStates(vec![State::READY]))
        );
    }

    #[test]
    fn test_undefined_next_state() {
        let table = table(
            10,
            vec![(10, vec![rule(Symbol::One, Symbol::One, Direction::Right, 42)])],
        );
        let error = analyze(&table).unwrap_err();
        assert!(error.to_string().contains("q10 [1] -> q42"));
    }

    #[test]
    fn test_unreachable_states() {
        let table = table(
            10,
            vec![
                (10, vec![rule(Symbol::One, Symbol::One, Direction::Right, 99)]),
                (30, vec![rule(Symbol::One, Symbol::One, Direction::Right, 99)]),
            ],
        );
        assert_eq!(
            check_unreachable_states(&table),
            Err(AnalysisError::UnreachableStates(vec![State(30)]))
        );
    }

    #[test]
    fn test_ambiguous_rules() {
        let table = table(
            10,
            vec![(
                10,
                vec![
                    rule(Symbol::One, Symbol::One, Direction::Right, 99),
                    rule(Symbol::One, Symbol::Blank, Direction::Left, 99),
                ],
            )],
        );
        assert_eq!(
            check_ambiguous_rules(&table),
            Err(AnalysisError::AmbiguousRules(vec!["q10 reading 1".to_string()]))
        );
    }
}
