use std::fmt::Display;
use std::ops::{BitAnd, BitXor, Not, Shr};

use ordered_float::NotNan;

use super::error::SolverError;

/// Representations for LBD, DL, etc. so I'm consistent
pub type LBD = u32;
pub type DecisionLevel = u32;

/// Let us use f64s as Ord
pub type F64 = NotNan<f64>;

/// Dense variable index; the first variable is 0.
pub type Var = usize;

/// Largest number of variables a solver can hold. Literal indices (2 * var + 1) and DIMACS
/// encodings (var + 1) both have to fit, so we stay well clear of the i64/usize limits.
pub const MAX_VARS: usize = (i32::MAX as usize) - 1;

/// How to compute n lits from v vars? Given v vars, n = v * 2. This works for indexing, since
/// our first variable starts at 0.
pub fn lits_from_vars(n_vars: usize) -> usize {
    n_vars * 2
}

/// Representation of a Literal, using the MiniSat convention: lit.v = 2 * var + sign
#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Lit {
    v: usize,
}

impl Lit {
    // Here, a TRUE sign == NEGATIVE
    pub fn new(v: Var, sign: bool) -> Lit {
        Lit {
            v: v + v + (sign as usize),
        }
    }

    pub fn positive(v: Var) -> Lit {
        Lit::new(v, false)
    }

    pub fn negative(v: Var) -> Lit {
        Lit::new(v, true)
    }

    /// Converts a DIMACS literal (`±(var + 1)`, never 0) into a solver literal.
    pub fn from_dimacs(l: i64) -> Result<Lit, SolverError> {
        if l == 0 {
            return Err(SolverError::InvalidLiteral(l));
        }
        let var = (l.unsigned_abs() - 1) as usize;
        if var >= MAX_VARS {
            return Err(SolverError::VariablesExhausted(MAX_VARS));
        }
        Ok(Lit::new(var, l < 0))
    }

    pub fn to_dimacs(&self) -> i64 {
        let v = self.var() as i64 + 1;
        if self.sign() {
            -v
        } else {
            v
        }
    }

    // Returns true if sign is negative.
    pub fn sign(&self) -> bool {
        self.v.bitand(1) != 0
    }

    pub fn var(&self) -> Var {
        self.v.shr(1)
    }

    // Get v as an index
    #[inline(always)]
    pub fn idx(&self) -> usize {
        self.v
    }
}

impl Not for Lit {
    type Output = Self;
    fn not(self) -> Lit {
        Self {
            v: self.v.bitxor(1),
        }
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

// Represent false, true, or UNDEF (i.e. not yet assigned). We prefer this over an Option<Bool>,
// since each option requires a pointer, whereas we only really have 3 values (i.e. u8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum LBool {
    True = 0,  // 0
    False = 1, // 1
    #[default]
    Undef = 2, // 2
}

impl LBool {
    /// Value a variable takes when the literal with this sign is made true.
    pub fn from_sign(s: bool) -> LBool {
        LBool::from(s as u8)
    }
}

impl From<LBool> for bool {
    #[inline(always)]
    fn from(value: LBool) -> Self {
        matches!(value, LBool::True)
    }
}

impl From<u8> for LBool {
    #[inline(always)]
    fn from(value: u8) -> Self {
        match value {
            0 => Self::True,
            1 => Self::False,
            _ => Self::Undef,
        }
    }
}

impl BitXor for LBool {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> LBool {
        LBool::from((self as u8).bitxor(rhs as u8))
    }
}

/// A satisfying assignment, indexed by variable. Variables that were never constrained are
/// reported as false; callers should treat them as don't-care.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: Vec<bool>,
}

impl Model {
    pub fn new(values: Vec<bool>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the variable, or None if the model does not mention it.
    pub fn value(&self, v: Var) -> Option<bool> {
        self.values.get(v).copied()
    }

    /// Whether the literal is true in this model.
    pub fn lit_value(&self, l: Lit) -> Option<bool> {
        self.value(l.var()).map(|b| b != l.sign())
    }

    /// Checks that at least one literal of the clause is true.
    pub fn satisfies(&self, clause: &[Lit]) -> bool {
        clause.iter().any(|l| self.lit_value(*l) == Some(true))
    }

    /// The model as true literals, one per variable.
    pub fn lits(&self) -> Vec<Lit> {
        self.values
            .iter()
            .enumerate()
            .map(|(v, b)| Lit::new(v, !*b))
            .collect()
    }

    pub fn to_dimacs(&self) -> Vec<i64> {
        self.lits().iter().map(Lit::to_dimacs).collect()
    }
}

/// Outcome of a call to solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    Satisfiable(Model),
    /// Carries the subset of the assumptions implicated in the final conflict; empty when the
    /// clauses are unsatisfiable on their own.
    Unsatisfiable(Vec<Lit>),
    /// The progress callback asked the solver to stop.
    Aborted,
}

impl SolveResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolveResult::Satisfiable(_))
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SolveResult::Unsatisfiable(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SolveResult::Aborted)
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            SolveResult::Satisfiable(m) => Some(m),
            _ => None,
        }
    }
}

impl Display for SolveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveResult::Satisfiable(_) => write!(f, "SATISFIABLE"),
            SolveResult::Unsatisfiable(_) => write!(f, "UNSATISFIABLE"),
            SolveResult::Aborted => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_encoding() {
        let l = Lit::new(3, true);
        assert_eq!(l.idx(), 7);
        assert_eq!(l.var(), 3);
        assert!(l.sign());
        assert_eq!(!l, Lit::positive(3));
        assert_eq!(!!l, l);
    }

    #[test]
    fn dimacs_conversion() {
        assert_eq!(Lit::from_dimacs(1).unwrap(), Lit::positive(0));
        assert_eq!(Lit::from_dimacs(-5).unwrap(), Lit::negative(4));
        assert_eq!(Lit::negative(4).to_dimacs(), -5);
        assert_eq!(Lit::negative(4).to_string(), "-5");
        assert_eq!(Lit::from_dimacs(0), Err(SolverError::InvalidLiteral(0)));
        assert!(matches!(
            Lit::from_dimacs(i64::MAX),
            Err(SolverError::VariablesExhausted(_))
        ));
    }

    #[test]
    fn lbool_xor_with_sign() {
        // value(lit) == assigned[var] ^ sign
        assert_eq!(LBool::True ^ LBool::from(1), LBool::False);
        assert_eq!(LBool::False ^ LBool::from(1), LBool::True);
        assert_eq!(LBool::Undef ^ LBool::from(1), LBool::Undef);
        assert_eq!(LBool::Undef ^ LBool::from(0), LBool::Undef);
        assert_eq!(LBool::from_sign(false), LBool::True);
        assert_eq!(LBool::from_sign(true), LBool::False);
    }

    #[test]
    fn model_queries() {
        let m = Model::new(vec![true, false]);
        assert_eq!(m.lit_value(Lit::positive(0)), Some(true));
        assert_eq!(m.lit_value(Lit::negative(1)), Some(true));
        assert_eq!(m.lit_value(Lit::positive(2)), None);
        assert!(m.satisfies(&[Lit::positive(1), Lit::positive(0)]));
        assert!(!m.satisfies(&[Lit::positive(1)]));
        assert_eq!(m.to_dimacs(), vec![1, -2]);
    }
}
