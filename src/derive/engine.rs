//! @ai:module:intent Dependency-ordered evaluation of derived quantities
//! @ai:module:layer application
//! @ai:module:public_api DerivationEngine
//! @ai:module:stateless true

use crate::derive::spec::{DerivedSpec, Operand};
use crate::error::{Error, Result};
use crate::table::MetricFrame;

/// @ai:intent Evaluates derivation specs over a metric table
///
/// Specs run in declaration order; each appends one column, so later specs
/// can read earlier results. Rows are independent. Limit violations and
/// out-of-domain arithmetic fall back to the spec's default per row;
/// unresolvable names abort the whole pass.
pub struct DerivationEngine {
    specs: Vec<DerivedSpec>,
}

impl DerivationEngine {
    /// @ai:intent Create an engine over an ordered spec list
    /// @ai:effects pure
    pub fn new(specs: Vec<DerivedSpec>) -> Self {
        Self { specs }
    }

    /// @ai:intent Load the spec list from its CSV file
    /// @ai:effects fs:read
    pub fn load(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(DerivedSpec::load_list(path)?))
    }

    /// @ai:intent Augment the frame with one column per spec
    /// @ai:effects pure
    pub fn derive(&self, frame: &MetricFrame) -> Result<MetricFrame> {
        let mut out = frame.clone();

        for spec in &self.specs {
            if out.has_column(&spec.name) {
                return Err(Error::spec(
                    &spec.name,
                    "column already exists; choose a different name",
                ));
            }

            let v1 = resolve_operand(&out, &spec.name, &spec.operand1)?;
            let v2 = match &spec.operand2 {
                Some(operand) if !spec.operation.is_unary() => {
                    Some(resolve_operand(&out, &spec.name, operand)?)
                }
                _ => None,
            };

            let n_rows = out.n_rows();
            let mut column = Vec::with_capacity(n_rows);

            for row in 0..n_rows {
                let a = v1.value_at(row);

                if !spec.limits1.contains(a) {
                    column.push(spec.default);
                    continue;
                }

                let b = match &v2 {
                    Some(v2) => {
                        let b = v2.value_at(row);
                        if !spec.limits2.contains(b) {
                            column.push(spec.default);
                            continue;
                        }
                        b
                    }
                    None => f64::NAN,
                };

                let result = spec.operation.apply(a, b);

                // Division by zero, invalid log/root domains and overflow all
                // surface as non-finite results
                if result.is_finite() {
                    column.push(result);
                } else {
                    column.push(spec.default);
                }
            }

            out.push_column(spec.name.clone(), column)?;
        }

        Ok(out)
    }
}

/// @ai:intent A resolved operand: a broadcast literal or a borrowed column
enum Resolved<'a> {
    Literal(f64),
    Column(&'a [f64]),
}

impl Resolved<'_> {
    fn value_at(&self, row: usize) -> f64 {
        match self {
            Resolved::Literal(v) => *v,
            Resolved::Column(values) => values[row],
        }
    }
}

/// @ai:intent Resolve an operand against the frame built so far
///
/// Referencing a name that is neither an existing column nor an
/// earlier-derived column is fatal for the pass.
/// @ai:effects pure
fn resolve_operand<'a>(
    frame: &'a MetricFrame,
    spec_name: &str,
    operand: &Operand,
) -> Result<Resolved<'a>> {
    match operand {
        Operand::Literal(v) => Ok(Resolved::Literal(*v)),
        Operand::ColumnRef(name) => frame
            .column(name)
            .map(Resolved::Column)
            .ok_or_else(|| {
                Error::spec(
                    spec_name,
                    format!("operand '{}' is neither a column nor a constant", name),
                )
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::spec::{Operation, OperandLimits};

    fn frame() -> MetricFrame {
        let mut frame = MetricFrame::new();
        frame
            .push_column("successes", vec![8.0, 3.0, 0.0])
            .unwrap();
        frame
            .push_column("attempts", vec![10.0, 0.0, 4.0])
            .unwrap();
        frame
    }

    fn spec(
        name: &str,
        operand1: Operand,
        operand2: Option<Operand>,
        operation: Operation,
        default: f64,
    ) -> DerivedSpec {
        DerivedSpec {
            name: name.to_string(),
            operand1,
            limits1: OperandLimits::unbounded(),
            operand2,
            limits2: OperandLimits::unbounded(),
            operation,
            default,
        }
    }

    #[test]
    fn test_basic_arithmetic_per_row() {
        let engine = DerivationEngine::new(vec![spec(
            "total",
            Operand::ColumnRef("successes".to_string()),
            Some(Operand::ColumnRef("attempts".to_string())),
            Operation::Add,
            -1.0,
        )]);

        let out = engine.derive(&frame()).unwrap();
        assert_eq!(out.column("total").unwrap(), &[18.0, 3.0, 4.0]);
        // Input columns are preserved in the augmented frame
        assert!(out.has_column("successes"));
    }

    #[test]
    fn test_limit_violation_yields_default() {
        let mut s = spec(
            "efficiency",
            Operand::ColumnRef("successes".to_string()),
            Some(Operand::ColumnRef("attempts".to_string())),
            Operation::Div,
            0.0,
        );
        s.limits2 = OperandLimits {
            min: 1.0,
            max: f64::INFINITY,
        };

        let out = DerivationEngine::new(vec![s]).derive(&frame()).unwrap();
        // attempts = 0 violates min2 = 1, so the row takes the default
        assert_eq!(out.column("efficiency").unwrap(), &[0.8, 0.0, 0.0]);
    }

    #[test]
    fn test_division_by_zero_yields_default() {
        let engine = DerivationEngine::new(vec![spec(
            "rate",
            Operand::ColumnRef("successes".to_string()),
            Some(Operand::ColumnRef("attempts".to_string())),
            Operation::Div,
            -7.0,
        )]);

        let out = engine.derive(&frame()).unwrap();
        assert_eq!(out.column("rate").unwrap(), &[0.8, -7.0, 0.0]);
    }

    #[test]
    fn test_log_domain_failures_yield_default() {
        let mut frame = MetricFrame::new();
        frame
            .push_column("base", vec![2.0, 1.0, -2.0, 2.0])
            .unwrap();
        frame.push_column("arg", vec![8.0, 8.0, 8.0, -1.0]).unwrap();

        let engine = DerivationEngine::new(vec![spec(
            "lg",
            Operand::ColumnRef("base".to_string()),
            Some(Operand::ColumnRef("arg".to_string())),
            Operation::LogBase,
            99.0,
        )]);

        let out = engine.derive(&frame).unwrap();
        // base 1, base <= 0 and arg <= 0 all fail the domain
        assert_eq!(out.column("lg").unwrap(), &[3.0, 99.0, 99.0, 99.0]);
    }

    #[test]
    fn test_negative_radicand_with_fractional_root_yields_default() {
        let mut frame = MetricFrame::new();
        frame.push_column("x", vec![-8.0, 16.0]).unwrap();

        let engine = DerivationEngine::new(vec![spec(
            "r",
            Operand::Literal(2.0),
            Some(Operand::ColumnRef("x".to_string())),
            Operation::Root,
            0.5,
        )]);

        let out = engine.derive(&frame).unwrap();
        assert_eq!(out.column("r").unwrap(), &[0.5, 4.0]);
    }

    #[test]
    fn test_unary_operations_ignore_operand2_limits() {
        let mut frame = MetricFrame::new();
        frame.push_column("x", vec![1.0, 0.0]).unwrap();

        let mut s = spec(
            "lnx",
            Operand::ColumnRef("x".to_string()),
            None,
            Operation::Ln,
            -1.0,
        );
        // Deliberately impossible operand2 limits; unary must not consult them
        s.limits2 = OperandLimits { min: 5.0, max: 5.0 };

        let out = DerivationEngine::new(vec![s]).derive(&frame).unwrap();
        // ln(0) = -inf falls back to the default
        assert_eq!(out.column("lnx").unwrap(), &[0.0, -1.0]);
    }

    #[test]
    fn test_earlier_derived_column_resolves() {
        let engine = DerivationEngine::new(vec![
            spec(
                "ratio",
                Operand::ColumnRef("successes".to_string()),
                Some(Operand::ColumnRef("attempts".to_string())),
                Operation::Div,
                0.0,
            ),
            spec(
                "percent",
                Operand::ColumnRef("ratio".to_string()),
                Some(Operand::Literal(100.0)),
                Operation::Mul,
                0.0,
            ),
        ]);

        let out = engine.derive(&frame()).unwrap();
        assert_eq!(out.column("percent").unwrap(), &[80.0, 0.0, 0.0]);
    }

    #[test]
    fn test_forward_reference_is_fatal() {
        let engine = DerivationEngine::new(vec![
            spec(
                "uses_later",
                Operand::ColumnRef("later".to_string()),
                Some(Operand::Literal(1.0)),
                Operation::Add,
                0.0,
            ),
            spec(
                "later",
                Operand::ColumnRef("successes".to_string()),
                Some(Operand::Literal(1.0)),
                Operation::Add,
                0.0,
            ),
        ]);

        let err = engine.derive(&frame()).unwrap_err();
        assert!(matches!(err, Error::Spec { .. }));
    }

    #[test]
    fn test_name_collision_is_fatal() {
        let engine = DerivationEngine::new(vec![spec(
            "successes",
            Operand::Literal(1.0),
            Some(Operand::Literal(1.0)),
            Operation::Add,
            0.0,
        )]);

        assert!(engine.derive(&frame()).is_err());
    }

    #[test]
    fn test_nan_operand_yields_default() {
        let mut frame = MetricFrame::new();
        frame.push_column("x", vec![f64::NAN, 2.0]).unwrap();

        let engine = DerivationEngine::new(vec![spec(
            "y",
            Operand::ColumnRef("x".to_string()),
            Some(Operand::Literal(1.0)),
            Operation::Add,
            -3.0,
        )]);

        let out = engine.derive(&frame).unwrap();
        assert_eq!(out.column("y").unwrap(), &[-3.0, 3.0]);
    }
}
