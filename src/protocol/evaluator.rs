//! Command grammar and evaluation
//!
//! Every request is one trimmed text line. The verb is matched
//! case-insensitively and operands are whitespace-separated tokens.

use std::fmt;

/// Reply sent to a client that ends its session with `exit` or `quit`
pub const FAREWELL: &str = "BYE";

/// Arithmetic operations understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `add a b`
    Add,
    /// `sub a b`
    Sub,
    /// `mul a b`
    Mul,
    /// `div a b`
    Div,
}

impl ArithmeticOp {
    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "add" => Some(ArithmeticOp::Add),
            "sub" => Some(ArithmeticOp::Sub),
            "mul" => Some(ArithmeticOp::Mul),
            "div" => Some(ArithmeticOp::Div),
            _ => None,
        }
    }

    /// Apply the operation to two operands
    pub fn apply(self, a: f64, b: f64) -> Result<f64, ProtocolError> {
        match self {
            ArithmeticOp::Add => Ok(a + b),
            ArithmeticOp::Sub => Ok(a - b),
            ArithmeticOp::Mul => Ok(a * b),
            ArithmeticOp::Div if b == 0.0 => Err(ProtocolError::DivisionByZero),
            ArithmeticOp::Div => Ok(a / b),
        }
    }
}

/// A parsed client request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Binary arithmetic on two numbers
    Arithmetic {
        /// Operation to apply
        op: ArithmeticOp,
        /// Left operand
        a: f64,
        /// Right operand
        b: f64,
    },
    /// Text analysis; tokens re-joined with single spaces
    Analyze(String),
}

/// Reasons a request is rejected. `Display` yields the exact wire text
/// that follows `ERROR: `.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Blank line
    EmptyRequest,
    /// Arithmetic verb without exactly two operands
    OperandCount,
    /// Operand that does not parse as a number
    NotANumber,
    /// `div` with a zero divisor
    DivisionByZero,
    /// `analyze` with nothing to analyze
    MissingText,
    /// Unrecognised verb
    UnknownCommand,
    /// Line exceeded the configured maximum length
    LineTooLong,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ProtocolError::EmptyRequest => "empty request",
            ProtocolError::OperandCount => "arithmetic requires 2 operands",
            ProtocolError::NotANumber => "operands must be numbers",
            ProtocolError::DivisionByZero => "division by zero",
            ProtocolError::MissingText => "analyze requires a string",
            ProtocolError::UnknownCommand => "unknown command",
            ProtocolError::LineTooLong => "line too long",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Render as a wire reply line
    pub fn to_reply(self) -> String {
        format!("ERROR: {}", self)
    }
}

/// Parse one line into a typed request
pub fn parse(line: &str) -> Result<Request, ProtocolError> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().ok_or(ProtocolError::EmptyRequest)?.to_lowercase();

    if let Some(op) = ArithmeticOp::from_verb(&verb) {
        let operands: Vec<&str> = tokens.collect();
        let [a, b] = operands.as_slice() else {
            return Err(ProtocolError::OperandCount);
        };
        let a = a.parse::<f64>().map_err(|_| ProtocolError::NotANumber)?;
        let b = b.parse::<f64>().map_err(|_| ProtocolError::NotANumber)?;
        return Ok(Request::Arithmetic { op, a, b });
    }

    if verb == "analyze" {
        let text = tokens.collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(ProtocolError::MissingText);
        }
        return Ok(Request::Analyze(text));
    }

    Err(ProtocolError::UnknownCommand)
}

/// Evaluate one command line and produce the reply text.
///
/// Pure and deterministic: the same line always yields the same reply.
pub fn evaluate(line: &str) -> String {
    match parse(line).and_then(execute) {
        Ok(reply) => reply,
        Err(e) => e.to_reply(),
    }
}

fn execute(request: Request) -> Result<String, ProtocolError> {
    match request {
        Request::Arithmetic { op, a, b } => {
            let value = op.apply(a, b)?;
            Ok(format!("RESULT: {}", format_number(value)))
        }
        Request::Analyze(text) => Ok(analyze(&text)),
    }
}

fn analyze(text: &str) -> String {
    let words = text.split_whitespace().count();
    let chars = text.chars().count();
    let non_space = text.chars().filter(|c| *c != ' ').count();
    format!(
        "ANALYSIS:\nUPPERCASE: {}\nWORDS: {}\nCHARS(including spaces): {}\nCHARS(excluding spaces): {}",
        text.to_uppercase(),
        words,
        chars,
        non_space
    )
}

/// Render a result: integral values without a decimal point, everything
/// else in shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value == 0.0 {
        // collapses -0
        return "0".to_string();
    }
    format!("{}", value)
}

/// True for `exit` / `quit` in any case
pub fn is_exit_directive(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}
