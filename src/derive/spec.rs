//! @ai:module:intent Declarative specs for derived quantities
//! @ai:module:layer domain
//! @ai:module:public_api Operand, Operation, OperandLimits, DerivedSpec
//! @ai:module:stateless true

use crate::error::{Error, Result};
use crate::table::Table;
use std::collections::HashSet;
use std::path::Path;

const SPEC_COLS: [&str; 9] = [
    "name", "name1", "name2", "operation", "min1", "max1", "min2", "max2", "default",
];

/// @ai:intent An operand: a literal constant or a column reference
///
/// Column references may name an originally collected column or a column
/// produced by an earlier spec in the same pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    ColumnRef(String),
    Literal(f64),
}

impl Operand {
    /// @ai:intent Numeric cells are literals, anything else is a column name
    /// @ai:effects pure
    pub fn parse(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        match cell.parse::<f64>() {
            Ok(n) => Some(Operand::Literal(n)),
            Err(_) => Some(Operand::ColumnRef(cell.to_string())),
        }
    }
}

/// @ai:intent Arithmetic applied to resolved operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    /// operand1 is the root degree, operand2 the radicand: b^(1/a)
    Root,
    /// operand1 is the base: log(b) / log(a)
    LogBase,
    Ln,
    Exp,
}

impl Operation {
    /// @ai:intent Parse the spec-file spelling of an operation
    /// @ai:effects pure
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Operation::Add),
            "-" => Some(Operation::Sub),
            "*" => Some(Operation::Mul),
            "/" => Some(Operation::Div),
            "**" => Some(Operation::Pow),
            "root" => Some(Operation::Root),
            "log_base" => Some(Operation::LogBase),
            "ln" => Some(Operation::Ln),
            "exp" => Some(Operation::Exp),
            _ => None,
        }
    }

    /// @ai:intent Whether only operand1 participates
    /// @ai:effects pure
    pub fn is_unary(&self) -> bool {
        matches!(self, Operation::Ln | Operation::Exp)
    }

    /// @ai:intent Apply the operation; out-of-domain inputs yield non-finite results
    /// @ai:effects pure
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Operation::Add => a + b,
            Operation::Sub => a - b,
            Operation::Mul => a * b,
            Operation::Div => a / b,
            Operation::Pow => a.powf(b),
            Operation::Root => b.powf(1.0 / a),
            Operation::LogBase => b.ln() / a.ln(),
            Operation::Ln => a.ln(),
            Operation::Exp => a.exp(),
        }
    }
}

/// @ai:intent Inclusive clamp range for one operand
///
/// An operand outside its range makes the derived value fall back to the
/// spec's default for that row. Infinite bounds disable the check on that
/// side; a NaN operand never satisfies the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperandLimits {
    pub min: f64,
    pub max: f64,
}

impl OperandLimits {
    /// @ai:intent Unbounded limits
    /// @ai:effects pure
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// @ai:intent Whether a value passes the clamp
    /// @ai:effects pure
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// @ai:intent One derived quantity: operands, limits, operation, fallback
#[derive(Debug, Clone)]
pub struct DerivedSpec {
    pub name: String,
    pub operand1: Operand,
    pub limits1: OperandLimits,
    pub operand2: Option<Operand>,
    pub limits2: OperandLimits,
    pub operation: Operation,
    pub default: f64,
}

impl DerivedSpec {
    /// @ai:intent Load the ordered derivation spec list from CSV
    ///
    /// Evaluation order is declaration order; specs may reference the
    /// columns of earlier specs but never later ones.
    /// @ai:effects fs:read
    pub fn load_list(path: &Path) -> Result<Vec<DerivedSpec>> {
        let table = Table::read_csv(path)?;

        for col in SPEC_COLS {
            if table.column_index(col).is_none() {
                return Err(Error::schema(format!(
                    "the derivation spec file must contain the columns {}",
                    SPEC_COLS.join(", ")
                )));
            }
        }

        let idx = |name: &str| table.column_index(name).unwrap();
        let (name_i, name1_i, name2_i, op_i) =
            (idx("name"), idx("name1"), idx("name2"), idx("operation"));
        let (min1_i, max1_i, min2_i, max2_i, default_i) = (
            idx("min1"),
            idx("max1"),
            idx("min2"),
            idx("max2"),
            idx("default"),
        );

        let mut specs = Vec::with_capacity(table.rows.len());
        let mut seen = HashSet::new();

        for row in &table.rows {
            let name = row[name_i].trim().to_string();

            if name.is_empty() {
                return Err(Error::schema("derivation spec with empty name"));
            }
            if !seen.insert(name.clone()) {
                return Err(Error::spec(&name, "duplicate derived quantity name"));
            }

            let op_raw = row[op_i].trim();
            let operation = Operation::parse(op_raw).ok_or_else(|| {
                Error::spec(
                    &name,
                    format!(
                        "invalid operation '{}'; valid operations are +, -, *, /, **, root, log_base, ln, exp",
                        op_raw
                    ),
                )
            })?;

            let operand1 = Operand::parse(&row[name1_i])
                .ok_or_else(|| Error::spec(&name, "name1 must not be empty"))?;
            let operand2 = Operand::parse(&row[name2_i]);

            if !operation.is_unary() && operand2.is_none() {
                return Err(Error::spec(
                    &name,
                    format!("operation '{}' needs a second operand", op_raw),
                ));
            }

            let limits1 = parse_limits(&name, &row[min1_i], &row[max1_i], "1")?;
            let limits2 = parse_limits(&name, &row[min2_i], &row[max2_i], "2")?;

            let default_raw = row[default_i].trim();
            let default = default_raw.parse::<f64>().map_err(|_| {
                Error::spec(
                    &name,
                    format!("invalid default value '{}'", default_raw),
                )
            })?;

            specs.push(DerivedSpec {
                name,
                operand1,
                limits1,
                operand2,
                limits2,
                operation,
                default,
            });
        }

        Ok(specs)
    }
}

/// @ai:intent Parse one operand's min/max cells; empty or "inf" disables a side
/// @ai:effects pure
fn parse_limits(spec_name: &str, min_cell: &str, max_cell: &str, which: &str) -> Result<OperandLimits> {
    let min = parse_bound(min_cell, true)
        .ok_or_else(|| Error::spec(spec_name, format!("invalid min{} value '{}'", which, min_cell.trim())))?;
    let max = parse_bound(max_cell, false)
        .ok_or_else(|| Error::spec(spec_name, format!("invalid max{} value '{}'", which, max_cell.trim())))?;

    if min > max {
        return Err(Error::spec(
            spec_name,
            format!("min{} ({}) must be less than or equal to max{} ({})", which, min, which, max),
        ));
    }

    Ok(OperandLimits { min, max })
}

/// @ai:intent Bound cell: number, "inf" (directional), or empty (no limit)
/// @ai:effects pure
fn parse_bound(cell: &str, is_min: bool) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(if is_min {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    if cell.eq_ignore_ascii_case("inf") {
        return Some(if is_min {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    if cell.eq_ignore_ascii_case("-inf") {
        return Some(f64::NEG_INFINITY);
    }
    cell.parse::<f64>().ok()
}
