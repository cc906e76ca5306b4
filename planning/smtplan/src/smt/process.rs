use crate::smt::expr::{Expr, Var};
use crate::smt::model::Model;
use crate::smt::sexpr::{self, SExpr};
use crate::smt::solver::{SatResult, Solver};
use crate::smt::value::{IntValue, RealValue, Sort, Value};
use anyhow::{bail, ensure, Context, Result};
use crossbeam_channel::select;
use hashbrown::HashSet;
use itertools::Itertools;
use num_traits::CheckedDiv;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

/// An SMT solver running as a child process, driven through the SMT-LIB2 language on its
/// standard input and output (e.g. `z3 -in -smt2`).
///
/// A check still running at the deadline kills the process, which cannot be used afterwards.
pub struct SmtLibProcess {
    command: String,
    /// Shared with the watchdog of a check with a deadline.
    child: Arc<Mutex<Child>>,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    declared: HashSet<Var>,
    /// Declared variables, in declaration order. All of them are part of the model.
    vars: Vec<Var>,
    assertions: usize,
    deadline: Option<Instant>,
    killed: bool,
}

impl SmtLibProcess {
    /// Starts the solver with the given command line, whose first word is the executable.
    pub fn spawn(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("Empty solver command")?;
        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Could not start the SMT solver `{command}`"))?;
        let stdin = child.stdin.take().context("No handle on the solver's input")?;
        let stdout = child.stdout.take().context("No handle on the solver's output")?;
        let mut solver = SmtLibProcess {
            command: command.to_string(),
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout: BufReader::new(stdout),
            declared: HashSet::new(),
            vars: Vec::new(),
            assertions: 0,
            deadline: None,
            killed: false,
        };
        solver.init()?;
        Ok(solver)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn init(&mut self) -> Result<()> {
        self.send("(set-option :produce-models true)")?;
        self.send("(set-logic ALL)")
    }

    fn send(&mut self, command: &str) -> Result<()> {
        ensure!(!self.killed, "The solver process was stopped at its deadline");
        tracing::trace!("> {command}");
        writeln!(self.stdin, "{command}")
            .and_then(|_| self.stdin.flush())
            .context("Could not write to the solver process")
    }

    /// Reads a complete response (an atom or a balanced s-expression) from the solver.
    fn read_response(&mut self) -> Result<String> {
        let mut response = String::new();
        loop {
            let read = self
                .stdout
                .read_line(&mut response)
                .context("Could not read from the solver process")?;
            ensure!(read > 0, "The solver process terminated unexpectedly");
            if !response.trim().is_empty() && sexpr::depth(&response) <= 0 {
                break;
            }
        }
        tracing::trace!("< {}", response.trim_end());
        Ok(response)
    }

    /// Reads the answer to a check, or `None` if the process had to be killed at the deadline.
    fn read_answer(&mut self) -> Result<Option<String>> {
        let Some(deadline) = self.deadline else {
            return self.read_response().map(Some);
        };
        let time_left = deadline.saturating_duration_since(Instant::now());
        // dropping the sender notifies the watchdog that the answer arrived
        let (answered, answer_rcv) = crossbeam_channel::bounded::<()>(0);
        let child = self.child.clone();
        let watchdog = thread::spawn(move || {
            select! {
                recv(answer_rcv) -> _ => false,
                default(time_left) => {
                    // the pending read fails once the process is gone
                    let mut child = child.lock().unwrap_or_else(|e| e.into_inner());
                    let _ = child.kill();
                    let _ = child.wait();
                    true
                }
            }
        });
        let answer = self.read_response();
        drop(answered);
        if watchdog.join().unwrap_or(false) {
            tracing::debug!("solver process killed at its deadline");
            self.killed = true;
            return Ok(None);
        }
        answer.map(Some)
    }

    fn declare(&mut self, var: &Var) -> Result<()> {
        if self.declared.insert(var.clone()) {
            self.vars.push(var.clone());
            self.send(&format!("(declare-const {} {})", var, var.sort()))?;
        }
        Ok(())
    }

    fn read_model(&mut self) -> Result<Model> {
        let mut model = Model::new();
        if self.vars.is_empty() {
            return Ok(model);
        }
        let request = format!("(get-value ({}))", self.vars.iter().format(" "));
        self.send(&request)?;
        let response = self.read_response()?;
        let parsed = sexpr::parse(&response)?;
        let pairs = parsed
            .as_list()
            .with_context(|| format!("Malformed model: {response}"))?;
        ensure!(
            pairs.len() == self.vars.len(),
            "Expected {} values from the solver but got {}",
            self.vars.len(),
            pairs.len()
        );
        for (var, pair) in self.vars.iter().zip(pairs) {
            let value = match pair.as_list() {
                Some([_, value]) => parse_value(value, var.sort())
                    .with_context(|| format!("Invalid value for {var}: {value}"))?,
                _ => bail!("Malformed model entry: {pair}"),
            };
            model.insert(var.name(), value);
        }
        Ok(model)
    }
}

/// Parses an integer (`3`, `-3`) or a decimal (`2.5`) number.
pub fn parse_number(s: &str) -> Result<Value> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    ensure!(
        digits.starts_with(|c: char| c.is_ascii_digit()) && digits.chars().all(|c| c.is_ascii_digit() || c == '.'),
        "Not a number: {s}"
    );
    let value = match digits.split_once('.') {
        None => Value::Int(digits.parse::<IntValue>()?),
        Some((int_part, frac_part)) => {
            let int_part: IntValue = int_part.parse()?;
            let denom = 10i64
                .checked_pow(frac_part.len() as u32)
                .context("Too many decimals")?;
            let frac: IntValue = if frac_part.is_empty() { 0 } else { frac_part.parse()? };
            let numer = int_part
                .checked_mul(denom)
                .and_then(|i| i.checked_add(frac))
                .context("Numeric overflow")?;
            Value::Real(RealValue::new(numer, denom))
        }
    };
    Ok(match value {
        Value::Int(i) if negative => Value::Int(-i),
        Value::Real(r) if negative => Value::Real(-r),
        v => v,
    })
}

/// Parses a value printed by the solver in SMT-LIB2 syntax (`true`, `3`, `(- 3)`, `(/ 1.0 2.0)`, ...).
pub fn parse_value(e: &SExpr, sort: Sort) -> Result<Value> {
    let value = match e {
        SExpr::Atom(a) if a == "true" => Value::TRUE,
        SExpr::Atom(a) if a == "false" => Value::FALSE,
        SExpr::Atom(a) => parse_number(a)?,
        _ => {
            if let Some([x]) = e.as_application_args("-") {
                match parse_value(x, sort)? {
                    Value::Int(i) => Value::Int(-i),
                    Value::Real(r) => Value::Real(-r),
                    Value::Bool(_) => bail!("Negation of a boolean"),
                }
            } else if let Some([num, denom]) = e.as_application_args("/") {
                let num = parse_value(num, Sort::Real)?.as_rational().context("Not a number")?;
                let denom = parse_value(denom, Sort::Real)?.as_rational().context("Not a number")?;
                ensure!(denom != RealValue::from_integer(0), "Division by zero");
                Value::Real(num.checked_div(&denom).context("Numeric overflow")?)
            } else {
                bail!("Unsupported value: {e}")
            }
        }
    };
    value
        .coerce(sort)
        .with_context(|| format!("Value {value} is not of sort {sort}"))
}

impl Solver for SmtLibProcess {
    fn assert(&mut self, constraint: &Expr) -> Result<()> {
        for var in constraint.vars() {
            self.declare(&var)?;
        }
        self.assertions += 1;
        self.send(&format!("(assert {constraint})"))
    }

    fn check(&mut self, assumptions: &[Var]) -> Result<SatResult> {
        for a in assumptions {
            self.declare(a)?;
        }
        if assumptions.is_empty() {
            self.send("(check-sat)")?;
        } else {
            self.send(&format!("(check-sat-assuming ({}))", assumptions.iter().format(" ")))?;
        }
        let Some(answer) = self.read_answer()? else {
            return Ok(SatResult::Timeout);
        };
        match answer.trim() {
            "sat" => Ok(SatResult::Sat(self.read_model()?)),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => {
                self.send("(get-info :reason-unknown)")?;
                let reason = self.read_response()?;
                Ok(SatResult::Unknown(reason.trim().to_string()))
            }
            other => bail!("Unexpected answer from the solver: {other}"),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.send("(reset)")?;
        self.declared.clear();
        self.vars.clear();
        self.assertions = 0;
        self.init()
    }

    fn num_assertions(&self) -> usize {
        self.assertions
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }
}

impl Drop for SmtLibProcess {
    fn drop(&mut self) {
        let _ = self.send("(exit)");
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str, sort: Sort) -> Value {
        parse_value(&sexpr::parse(s).unwrap(), sort).unwrap()
    }

    #[test]
    fn solver_values() {
        assert_eq!(value("true", Sort::Bool), Value::TRUE);
        assert_eq!(value("(- 3)", Sort::Int), Value::Int(-3));
        assert_eq!(value("2.5", Sort::Real), Value::Real(RealValue::new(5, 2)));
        assert_eq!(value("(/ 1.0 3.0)", Sort::Real), Value::Real(RealValue::new(1, 3)));
        assert_eq!(value("(- (/ 1 2))", Sort::Real), Value::Real(RealValue::new(-1, 2)));
        assert_eq!(value("4.0", Sort::Int), Value::Int(4));
        assert_eq!(value("4", Sort::Real), Value::Real(RealValue::from_integer(4)));
    }

    #[test]
    fn overflowing_division() {
        let big = format!("(/ {} 0.5)", i64::MAX);
        assert!(parse_value(&sexpr::parse(&big).unwrap(), Sort::Real).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn check_interrupted_at_deadline() {
        use std::time::Duration;

        // never answers
        let mut solver = SmtLibProcess::spawn("sleep 30").unwrap();
        let start = Instant::now();
        solver.set_deadline(Some(start + Duration::from_millis(100)));
        assert_eq!(solver.check(&[]).unwrap(), SatResult::Timeout);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(solver.check(&[]).is_err());
        assert!(solver.reset().is_err());
    }

    #[test]
    fn invalid_values() {
        assert!(parse_value(&sexpr::parse("(root-obj x 1)").unwrap(), Sort::Real).is_err());
        assert!(parse_value(&sexpr::parse("true").unwrap(), Sort::Int).is_err());
        assert!(parse_value(&sexpr::parse("1.5").unwrap(), Sort::Int).is_err());
    }
}
