use thiserror::Error;

use crate::kernel::{Instruction, Operator};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

/// Parses program text, one instruction per line. Blank lines and `//`
/// comments are skipped.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        let instruction = parse_instruction(line).map_err(|reason| ParseError { line: idx + 1, reason })?;
        instructions.push(instruction);
    }

    Ok(instructions)
}

fn parse_instruction(line: &str) -> Result<Instruction, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (command, operands) = tokens.split_first().ok_or_else(|| "empty instruction".to_string())?;

    match command.to_ascii_uppercase().as_str() {
        "ASSIGN" => match operands {
            [target, source] if source.eq_ignore_ascii_case("input") => Ok(Instruction::assign_input(target)),
            [target, operator, lhs, rhs] => {
                let operator =
                    Operator::from_keyword(operator).ok_or_else(|| format!("invalid operation: {}", operator))?;
                Ok(Instruction::assign_expression(target, operator, lhs, rhs))
            }
            _ => Err(format!("malformed ASSIGN: {}", line)),
        },
        "PRINT" => match operands {
            [target] => Ok(Instruction::print(target)),
            _ => Err(format!("PRINT takes exactly one variable: {}", line)),
        },
        _ => Err(format!("unknown command: {}", command)),
    }
}
