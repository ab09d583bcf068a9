//! Hypothesis, goal and hint sections of a verification script.

use super::language::decimal;
use crate::ir::Format;
use std::fmt;

/// An expression of the script together with the format it is rounded to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofTerm {
    pub code: String,
    pub format: Format,
}

impl ProofTerm {
    pub fn new(code: impl Into<String>, format: Format) -> Self {
        Self { code: code.into(), format }
    }
}

/// Right-hand side of a hypothesis or goal.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofValue {
    /// The prover is asked to find the enclosure.
    Unknown,
    Interval(f64, f64),
    Exact(String),
}

impl fmt::Display for ProofValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofValue::Unknown => f.write_str("?"),
            ProofValue::Interval(lo, hi) => write!(f, "[{}, {}]", decimal(*lo), decimal(*hi)),
            ProofValue::Exact(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hint {
    pub hypothesis: String,
    pub goal: String,
    pub annotation: Option<String>,
    /// `~` (approximately equal) instead of `->`.
    pub approx: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProofSections {
    hypotheses: Vec<(ProofTerm, ProofValue)>,
    goals: Vec<(ProofTerm, ProofValue)>,
    hints: Vec<Hint>,
}

impl ProofSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hypothesis(&mut self, term: ProofTerm, value: ProofValue) {
        self.hypotheses.push((term, value));
    }

    pub fn add_goal(&mut self, term: ProofTerm, value: ProofValue) {
        self.goals.push((term, value));
    }

    pub fn add_hint(&mut self, hint: Hint) {
        self.hints.push(hint);
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty() && self.goals.is_empty() && self.hints.is_empty()
    }

    /// `{ hypotheses -> goals }` block. Every hypothesis on a fixed-point or
    /// floating-point term also states the term's precision.
    pub fn complete_goal(&self) -> String {
        let mut hypotheses = Vec::new();
        for (term, value) in &self.hypotheses {
            hypotheses.push(format!("{} in {}", term.code, value));
            match &term.format {
                Format::Fixed { frac, .. } => {
                    hypotheses.push(format!("@FIX({},-{})", term.code, frac));
                }
                format @ (Format::Binary16 | Format::Binary32 | Format::Binary64) => {
                    let precision = format.field_size().unwrap_or(0) + 1;
                    hypotheses.push(format!("@FLT({},{})", term.code, precision));
                }
                _ => {}
            }
        }
        let goals: Vec<String> = self
            .goals
            .iter()
            .map(|(term, value)| format!("{} in {}", term.code, value))
            .collect();
        format!("# goalee\n{{ {} -> {} }}\n\n", hypotheses.join(" /\\ "), goals.join(" /\\ "))
    }

    pub fn hint_section(&self) -> String {
        let mut result = String::from("#hints\n");
        for hint in &self.hints {
            let annotation = hint
                .annotation
                .as_ref()
                .map(|a| format!("{{{a}}}"))
                .unwrap_or_default();
            let symbol = if hint.approx { "~" } else { "->" };
            result.push_str(&format!("{} {} {} {};\n\n", hint.hypothesis, symbol, hint.goal, annotation));
        }
        result
    }
}
