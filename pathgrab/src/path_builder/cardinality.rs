use crate::error::{PathGrabError, Result};
use std::str::FromStr;

/// A bound on how many paths a template expansion must produce.
///
/// Accepted forms: `==n` (or `=n`, `n`), `>=n`, `<=n`, `>n`, `<n`, and
/// intervals `[a,b]`, `[a,b[`, `]a,b]`, `]a,b[` where `b` may be `inf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cardinality {
    expr: String,
    min: usize,
    max: Option<usize>,
}

impl Cardinality {
    pub fn any() -> Self {
        Cardinality {
            expr: ">=0".into(),
            min: 0,
            max: None,
        }
    }

    pub fn exactly(n: usize) -> Self {
        Cardinality {
            expr: format!("=={n}"),
            min: n,
            max: Some(n),
        }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Check a produced count, naming the expected and actual counts on failure.
    pub fn check(&self, count: usize) -> Result<()> {
        if self.contains(count) {
            Ok(())
        } else {
            Err(PathGrabError::Cardinality {
                expected: self.expr.clone(),
                actual: count,
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::any()
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expr)
    }
}

fn invalid(expr: &str) -> PathGrabError {
    PathGrabError::Configuration(format!("Invalid cardinality expression '{expr}'"))
}

fn parse_count(text: &str, expr: &str) -> Result<usize> {
    text.trim().parse().map_err(|_| invalid(expr))
}

fn successor(n: usize, expr: &str) -> Result<usize> {
    n.checked_add(1).ok_or_else(|| invalid(expr))
}

impl FromStr for Cardinality {
    type Err = PathGrabError;

    fn from_str(s: &str) -> Result<Self> {
        let expr = s.trim();
        let (min, max) = if let Some(n) = expr.strip_prefix("==") {
            let n = parse_count(n, expr)?;
            (n, Some(n))
        } else if let Some(n) = expr.strip_prefix(">=") {
            (parse_count(n, expr)?, None)
        } else if let Some(n) = expr.strip_prefix("<=") {
            (0, Some(parse_count(n, expr)?))
        } else if let Some(n) = expr.strip_prefix('>') {
            (successor(parse_count(n, expr)?, expr)?, None)
        } else if let Some(n) = expr.strip_prefix('<') {
            let n = parse_count(n, expr)?;
            if n == 0 {
                return Err(invalid(expr));
            }
            (0, Some(n - 1))
        } else if let Some(n) = expr.strip_prefix('=') {
            let n = parse_count(n, expr)?;
            (n, Some(n))
        } else if expr.starts_with('[') || expr.starts_with(']') {
            parse_interval(expr)?
        } else {
            let n = parse_count(expr, expr)?;
            (n, Some(n))
        };

        if let Some(max) = max {
            if max < min {
                return Err(invalid(expr));
            }
        }

        Ok(Cardinality {
            expr: expr.to_string(),
            min,
            max,
        })
    }
}

fn parse_interval(expr: &str) -> Result<(usize, Option<usize>)> {
    if expr.len() < 2 {
        return Err(invalid(expr));
    }
    let open_left = expr.starts_with(']');
    let open_right = expr.ends_with('[');
    if !open_right && !expr.ends_with(']') {
        return Err(invalid(expr));
    }
    let inner = &expr[1..expr.len() - 1];
    let (lo, hi) = inner.split_once(',').ok_or_else(|| invalid(expr))?;

    let lo = parse_count(lo, expr)?;
    let min = if open_left { successor(lo, expr)? } else { lo };

    let hi = hi.trim();
    let max = if hi.is_empty() || hi == "inf" {
        None
    } else {
        let hi = parse_count(hi, expr)?;
        if open_right {
            if hi == 0 {
                return Err(invalid(expr));
            }
            Some(hi - 1)
        } else {
            Some(hi)
        }
    };
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> Cardinality {
        s.parse().unwrap()
    }

    #[test]
    fn test_comparison_forms() {
        assert!(card("==2").contains(2));
        assert!(!card("==2").contains(1));
        assert!(card(">=1").contains(5));
        assert!(!card(">=1").contains(0));
        assert!(card("<=1").contains(0));
        assert!(!card("<=1").contains(2));
        assert!(card(">1").contains(2));
        assert!(!card(">1").contains(1));
        assert!(card("<2").contains(1));
        assert!(!card("<2").contains(2));
        assert!(card("3").contains(3));
        assert!(card("=3").contains(3));
    }

    #[test]
    fn test_interval_forms() {
        assert!(card("[1,3]").contains(1));
        assert!(card("[1,3]").contains(3));
        assert!(!card("[1,3[").contains(3));
        assert!(!card("]1,3]").contains(1));
        assert!(card("]1,3[").contains(2));
        assert!(card("[2,inf]").contains(1000));
        assert!(!card("[2,]").contains(1));
    }

    #[test]
    fn test_invalid_expressions() {
        let huge = usize::MAX.to_string();
        let open_huge = format!("]{huge},inf]");
        let above_huge = format!(">{huge}");
        for expr in [
            "",
            "~2",
            "[3,1]",
            "<0",
            "[1,2",
            "==x",
            "]0,1[",
            above_huge.as_str(),
            open_huge.as_str(),
        ] {
            let err = expr.parse::<Cardinality>().unwrap_err();
            assert!(err.is_configuration(), "{expr} should be rejected");
        }
    }

    #[test]
    fn test_check_reports_expected_and_actual() {
        let err = card("==1").check(2).unwrap_err();
        match err {
            PathGrabError::Cardinality { expected, actual } => {
                assert_eq!(expected, "==1");
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(Cardinality::default().check(0).is_ok());
    }
}
