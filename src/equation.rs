use std::str::FromStr;

use crate::error::CliError;
use crate::predicate::{Predicate, PredicateValue};

/// The one concrete `Predicate` this crate ships: `recordNumber OP N`,
/// where `OP` is one of `<`, `<=`, `>`, `>=`, `==`, `!=`. A general
/// expression language over arbitrary fields is out of scope (see
/// `crate::predicate`); `recordNumber` windows cover the common
/// `--where`/`--stopWhen` use (skip a header run, stop after N rows)
/// without pulling in an expression evaluator.
pub struct RecordNumberPredicate {
    op: Op,
    operand: u64,
}

#[derive(Clone, Copy)]
enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl FromStr for RecordNumberPredicate {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = trimmed.strip_prefix("recordNumber").ok_or_else(|| {
            CliError::Predicate(format!(
                "unsupported equation '{}': only 'recordNumber OP N' equations are implemented",
                s
            ))
        })?;
        let rest = rest.trim_start();

        let (op, rest) = if let Some(r) = rest.strip_prefix(">=") {
            (Op::Ge, r)
        } else if let Some(r) = rest.strip_prefix("<=") {
            (Op::Le, r)
        } else if let Some(r) = rest.strip_prefix("==") {
            (Op::Eq, r)
        } else if let Some(r) = rest.strip_prefix("!=") {
            (Op::Ne, r)
        } else if let Some(r) = rest.strip_prefix('>') {
            (Op::Gt, r)
        } else if let Some(r) = rest.strip_prefix('<') {
            (Op::Lt, r)
        } else {
            return Err(CliError::Predicate(format!(
                "unsupported operator in equation '{}' (expected one of < <= > >= == !=)",
                s
            )));
        };

        let operand: u64 = rest
            .trim()
            .parse()
            .map_err(|_| CliError::Predicate(format!("equation '{}' does not end in an integer", s)))?;

        Ok(RecordNumberPredicate { op, operand })
    }
}

impl Predicate for RecordNumberPredicate {
    fn evaluate(&self, record_number: u64) -> Result<PredicateValue, CliError> {
        let holds = match self.op {
            Op::Lt => record_number < self.operand,
            Op::Le => record_number <= self.operand,
            Op::Gt => record_number > self.operand,
            Op::Ge => record_number >= self.operand,
            Op::Eq => record_number == self.operand,
            Op::Ne => record_number != self.operand,
        };
        Ok(if holds { PredicateValue::True } else { PredicateValue::False })
    }
}
