//! This module provides the parser for rig program files, utilizing the `pest` crate.
//! It defines the grammar in `grammar.pest` and turns the parse tree into a `TransitionTable`.

use crate::{
    analyzer::analyze,
    types::{Direction, Operation, RigError, State, Symbol, Transition, TransitionTable},
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::{Pair, Pairs},
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::{HashMap, HashSet};

/// Derives a `PestParser` for the program grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct ProgramParser;

/// Parses the given input string into a `TransitionTable`.
///
/// The parsed table is validated with [`analyze`] before being returned.
///
/// # Returns
///
/// * `Ok(TransitionTable)` if the input is successfully parsed and validated.
/// * `Err(RigError::ParseError)` if there are any syntax errors.
/// * `Err(RigError::ValidationError)` if the table fails validation.
pub fn parse(input: &str) -> Result<TransitionTable, RigError> {
    let root = ProgramParser::parse(Rule::program, input.trim())
        .map_err(|e| RigError::ParseError(Box::new(e)))?
        .next()
        .ok_or_else(|| RigError::ValidationError("Empty program".to_string()))?;

    let table = parse_program(root)?;

    analyze(&table)?;

    Ok(table)
}

/// Parses the top-level sections of a program.
fn parse_program(pair: Pair<Rule>) -> Result<TransitionTable, RigError> {
    let mut name: Option<String> = None;
    let mut operation: Option<Operation> = None;
    let mut start: Option<State> = None;
    let mut rules: Option<HashMap<State, Vec<Transition>>> = None;
    let mut first_state: Option<State> = None;
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => name = Some(parse_inner_string(p).trim().to_string()),
            Rule::operation => {
                let word = parse_inner_string(p);
                operation = Some(
                    word.parse()
                        .map_err(|_| parse_error(&format!("Unknown operation: {word}"), span))?,
                );
            }
            Rule::start => start = Some(parse_state(next_pair(&mut p.into_inner(), span)?)),
            Rule::rules => rules = Some(parse_blocks(p, &mut first_state)?),
            _ => {} // EOI
        }
    }

    let name = check_required_rule(name, "name")?;
    let operation = check_required_rule(operation, "operation")?;
    let rules = check_required_rule(rules, "rules")?;
    let start = check_required_rule(start.or(first_state), "start")?;

    Ok(TransitionTable {
        name,
        operation,
        start,
        rules,
    })
}

/// Parses the `rules:` section. The first block's state is recorded so it can serve as
/// the start state when `start:` is omitted.
fn parse_blocks(
    pair: Pair<Rule>,
    first_state: &mut Option<State>,
) -> Result<HashMap<State, Vec<Transition>>, RigError> {
    let mut blocks = HashMap::new();

    for block in pair.into_inner() {
        let span = block.as_span();
        let mut pairs = block.into_inner();
        let state = parse_state(next_pair(&mut pairs, span)?);

        if first_state.is_none() {
            *first_state = Some(state);
        }

        // Prevent duplicated state block
        if blocks.contains_key(&state) {
            return Err(parse_error(&format!("Duplicate state block: {state}"), span));
        }

        let actions = pairs
            .map(parse_action)
            .collect::<Result<Vec<_>, _>>()?;
        blocks.insert(state, actions);
    }

    Ok(blocks)
}

/// Parses a single action line.
///
/// If the write symbol is omitted, the symbol read is written back.
fn parse_action(pair: Pair<Rule>) -> Result<Transition, RigError> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();
    let read = parse_symbol(next_pair(&mut pairs, span)?);

    let write = match pairs.peek().map(|p| p.as_rule()) {
        Some(Rule::symbol) => parse_symbol(next_pair(&mut pairs, span)?),
        _ => read,
    };

    let direction = parse_direction(next_pair(&mut pairs, span)?)?;
    let next_state = parse_state(next_pair(&mut pairs, span)?);

    Ok(Transition {
        read,
        write,
        direction,
        next_state,
    })
}

/// Parses a single direction.
///
/// Supports '<' or 'L' for Left, '>' or 'R' for Right, and '-' or 'S' for Stay.
fn parse_direction(pair: Pair<Rule>) -> Result<Direction, RigError> {
    let span = pair.as_span();
    match pair.as_str() {
        "<" | "L" => Ok(Direction::Left),
        ">" | "R" => Ok(Direction::Right),
        "-" | "S" => Ok(Direction::Stay),
        _ => Err(parse_error(
            &format!("Unsupported direction: {}", pair.as_str()),
            span,
        )),
    }
}

fn parse_symbol(pair: Pair<Rule>) -> Symbol {
    pair.as_str()
        .chars()
        .next()
        .and_then(Symbol::from_char)
        .unwrap_or_default()
}

/// Parses a state token. The grammar only admits `halt`, `underflow` and digits;
/// ids beyond `u8` saturate and are rejected by the analyzer as undefined.
fn parse_state(pair: Pair<Rule>) -> State {
    match pair.as_str() {
        "halt" => State::HALT,
        "underflow" => State::UNDERFLOW,
        digits => State(digits.parse().unwrap_or(u8::MAX)),
    }
}

/// Creates a `RigError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> RigError {
    RigError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Takes the next inner pair, reporting a parse error at `span` if the tree is short.
fn next_pair<'a>(pairs: &mut Pairs<'a, Rule>, span: Span) -> Result<Pair<'a, Rule>, RigError> {
    pairs
        .next()
        .ok_or_else(|| parse_error("Incomplete declaration", span))
}

/// Extracts the inner string content from a `Pair`.
fn parse_inner_string(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// Checks if a given section has already been declared.
fn check_unique_rule(
    rule: Rule,
    span: Span,
    seen: &mut HashSet<Rule>,
) -> Result<(), RigError> {
    if !matches!(
        rule,
        Rule::name | Rule::operation | Rule::start | Rule::rules
    ) {
        return Ok(());
    };

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{rule:?}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, RigError> {
    value.ok_or_else(|| RigError::ValidationError(format!("Missing '{name}' section")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_program() {
        let input = r#"
name: Simple Test
operation: add
rules:
  10:
    1 -> R, 10
    _ -> 1, S, halt
"#;

        let table = parse(input).unwrap();
        assert_eq!(table.name, "Simple Test");
        assert_eq!(table.operation, Operation::Add);
        assert_eq!(table.start, State(10));
        assert_eq!(
            table.lookup(State(10), Symbol::One),
            Some(&Transition {
                read: Symbol::One,
                write: Symbol::One,
                direction: Direction::Right,
                next_state: State(10),
            })
        );
        assert_eq!(
            table.lookup(State(10), Symbol::Blank).unwrap().next_state,
            State::HALT
        );
        assert_eq!(table.lookup(State(10), Symbol::Separator), None);
    }

    #[test]
    fn test_parse_comments_and_explicit_start() {
        let input = r#"
# leading comment
name: Commented   # trailing comment
operation: sub
start: 21
rules:
  20:
    | -> < , underflow
  21:
    # comment inside a block
    1 -> _, >, 20
"#;

        let table = parse(input).unwrap();
        assert_eq!(table.name, "Commented");
        assert_eq!(table.start, State(21));
        assert_eq!(
            table.lookup(State(20), Symbol::Separator).unwrap().direction,
            Direction::Left
        );
        assert_eq!(
            table.lookup(State(21), Symbol::One).unwrap().write,
            Symbol::Blank
        );
    }

    #[test]
    fn test_parse_duplicate_section() {
        let input = r#"
name: First Name
name: Second Name
operation: add
rules:
  10:
    1 -> R, halt
"#;
        let error = parse(input).unwrap_err();
        assert!(matches!(error, RigError::ParseError(_)));
        assert!(error
            .to_string()
            .contains("Duplicate \"name:\" declaration"));
    }

    #[test]
    fn test_parse_duplicate_state_block() {
        let input = r#"
name: Twice
operation: add
rules:
  10:
    1 -> R, 10
  10:
    _ -> R, halt
"#;
        let error = parse(input).unwrap_err();
        assert!(error.to_string().contains("Duplicate state block: q10"));
    }

    #[test]
    fn test_parse_missing_operation() {
        let input = r#"
name: No Operation
rules:
  10:
    1 -> R, halt
"#;
        let error = parse(input).unwrap_err();
        assert!(matches!(error, RigError::ValidationError(_)));
        assert_eq!(
            error.to_string(),
            "Program validation error: Missing 'operation' section"
        );
    }

    #[test]
    fn test_parse_unknown_operation() {
        let input = r#"
name: Multiply
operation: mul
rules:
  10:
    1 -> R, halt
"#;
        let error = parse(input).unwrap_err();
        assert!(matches!(error, RigError::ParseError(_)));
        assert!(error.to_string().contains("Unknown operation: mul"));
    }

    #[test]
    fn test_parse_invalid_symbol() {
        let input = r#"
name: Bad Symbol
operation: add
rules:
  10:
    x -> R, halt
"#;
        assert!(matches!(parse(input), Err(RigError::ParseError(_))));
    }

    #[test]
    fn test_parse_runs_analysis() {
        let input = r#"
name: Dangling
operation: add
rules:
  10:
    1 -> R, 11
"#;
        let error = parse(input).unwrap_err();
        assert!(matches!(error, RigError::ValidationError(_)));
        assert!(error.to_string().contains("undefined states"));
    }
}
