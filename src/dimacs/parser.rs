use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use anyhow::{bail, Context, Result};
use fxhash::FxHashSet;

use super::sat_instance::{Clause, Literal, SATInstance};

pub struct DimacsParser<R> {
    reader: BufReader<R>,
}

impl DimacsParser<File> {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> DimacsParser<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Reads a `p cnf` instance. Clauses may span lines; `c` lines are comments, and a `%`
    /// line ends the input.
    pub fn parse(self) -> Result<SATInstance> {
        let mut header: Option<(usize, usize)> = None;
        let mut clauses = vec![];
        let mut vars = FxHashSet::default();
        let mut lits: Vec<Literal> = vec![];

        for (i, line) in self.reader.lines().enumerate() {
            let line = line.with_context(|| format!("reading line {}", i + 1))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            if line.starts_with('%') {
                break;
            }
            if line.starts_with('p') {
                if header.is_some() {
                    bail!("line {}: duplicate problem line", i + 1);
                }
                header = Some(parse_header(line).with_context(|| format!("line {}", i + 1))?);
                continue;
            }
            let Some((n_vars, _)) = header else {
                bail!("line {}: clause before the problem line", i + 1);
            };

            for tok in line.split_whitespace() {
                let l: Literal = tok
                    .parse()
                    .with_context(|| format!("line {}: invalid literal {:?}", i + 1, tok))?;
                if l == 0 {
                    clauses.push(Clause {
                        lits: std::mem::take(&mut lits),
                    });
                    continue;
                }
                if l.unsigned_abs() as usize > n_vars {
                    bail!("line {}: literal {} exceeds {} variables", i + 1, l, n_vars);
                }
                vars.insert(l.unsigned_abs());
                lits.push(l);
            }
        }

        let Some((n_vars, n_clauses)) = header else {
            bail!("missing problem line");
        };
        // Tolerate a last clause without its terminating 0.
        if !lits.is_empty() {
            clauses.push(Clause { lits });
        }
        if clauses.len() != n_clauses {
            log::warn!(
                "Problem line declares {} clauses, found {}",
                n_clauses,
                clauses.len()
            );
        }
        Ok(SATInstance {
            n_vars,
            n_clauses: clauses.len(),
            clauses,
            vars,
        })
    }
}

/// Parses `p cnf <vars> <clauses>`.
fn parse_header(line: &str) -> Result<(usize, usize)> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    match parts.as_slice() {
        ["p", "cnf", v, c] => {
            let v = v.parse().with_context(|| format!("invalid variable count {:?}", v))?;
            let c = c.parse().with_context(|| format!("invalid clause count {:?}", c))?;
            Ok((v, c))
        }
        _ => bail!("malformed problem line {:?}", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<SATInstance> {
        DimacsParser::from_reader(s.as_bytes()).parse()
    }

    #[test]
    fn parses_comments_and_split_clauses() {
        let inst = parse(
            "c a comment\n\
             p cnf 3 3\n\
             1 -2 0\n\
             c between clauses\n\
             2 3\n\
             -1 0 -3 0\n",
        )
        .unwrap();
        assert_eq!(inst.n_vars, 3);
        assert_eq!(inst.n_clauses, 3);
        assert_eq!(inst.clauses[0].lits, vec![1, -2]);
        assert_eq!(inst.clauses[1].lits, vec![2, 3, -1]);
        assert_eq!(inst.clauses[2].lits, vec![-3]);
        assert_eq!(inst.vars.len(), 3);
    }

    #[test]
    fn stops_at_percent() {
        let inst = parse("p cnf 2 1\n1 2 0\n%\n0\n").unwrap();
        assert_eq!(inst.clauses.len(), 1);
    }

    #[test]
    fn empty_clause_is_kept() {
        let inst = parse("p cnf 1 2\n1 0\n0\n").unwrap();
        assert_eq!(inst.clauses.len(), 2);
        assert!(inst.clauses[1].lits.is_empty());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("1 2 0\n").is_err());
        assert!(parse("p cnf 2\n").is_err());
        assert!(parse("p cnf 2 1\n1 x 0\n").is_err());
        assert!(parse("p cnf 2 1\n1 3 0\n").is_err());
        assert!(parse("c only comments\n").is_err());
    }

    #[test]
    fn extreme_literals_within_a_huge_header() {
        let inst = parse(&format!("p cnf {} 1\n{} 1 0\n", usize::MAX, i64::MIN)).unwrap();
        assert_eq!(inst.clauses[0].lits, vec![i64::MIN, 1]);
        assert!(inst.vars.contains(&(1 << 63)));
        assert!(inst.vars.contains(&1));
    }
}
