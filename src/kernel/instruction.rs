use std::fmt;

/// Arithmetic operator of an `ASSIGN` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Multiply,
    Divide,
    Subtract,
}

impl Operator {
    pub fn from_keyword(keyword: &str) -> Option<Operator> {
        match keyword.to_ascii_lowercase().as_str() {
            "add" => Some(Operator::Add),
            "multiply" => Some(Operator::Multiply),
            "divide" => Some(Operator::Divide),
            "subtract" => Some(Operator::Subtract),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Multiply => "multiply",
            Operator::Divide => "divide",
            Operator::Subtract => "subtract",
        }
    }

    /// Plain IEEE-754 arithmetic. Division by zero gives an infinity or NaN.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => lhs / rhs,
            Operator::Subtract => lhs - rhs,
        }
    }
}

/// Right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Input,
    Expression {
        operator: Operator,
        lhs: String,
        rhs: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Assign { target: String, source: Source },
    Print { target: String },
}

impl Instruction {
    pub fn assign_input(target: &str) -> Instruction {
        Instruction::Assign {
            target: target.to_ascii_lowercase(),
            source: Source::Input,
        }
    }

    pub fn assign_expression(target: &str, operator: Operator, lhs: &str, rhs: &str) -> Instruction {
        Instruction::Assign {
            target: target.to_ascii_lowercase(),
            source: Source::Expression {
                operator,
                lhs: lhs.to_ascii_lowercase(),
                rhs: rhs.to_ascii_lowercase(),
            },
        }
    }

    pub fn print(target: &str) -> Instruction {
        Instruction::Print {
            target: target.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assign { target, source: Source::Input } => write!(f, "ASSIGN {} input", target),
            Instruction::Assign { target, source: Source::Expression { operator, lhs, rhs } } => {
                write!(f, "ASSIGN {} {} {} {}", target, operator.keyword(), lhs, rhs)
            }
            Instruction::Print { target } => write!(f, "PRINT {}", target),
        }
    }
}
