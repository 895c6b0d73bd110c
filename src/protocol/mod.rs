//! Wire protocol: command grammar and reply formatting

pub mod evaluator;

pub use evaluator::{
    evaluate, format_number, is_exit_directive, parse, ArithmeticOp, ProtocolError, Request,
    FAREWELL,
};
