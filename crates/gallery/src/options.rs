//! Engine configuration.

use gallery_core::{Decimal, DEFAULT_PRECISION, MAX_PRECISION};
use leq::{Tolerance, DEFAULT_MAX_EQUATIONS};

/// Options that control the engine.
///
/// With the `serde` feature the options can be read from a JSON file;
///     missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Number of significant digits kept by division.
    pub precision_digits: u32,

    /// Relative magnitude below which coefficients are treated as zero.
    ///
    /// A coefficient is dropped when its magnitude is at most
    ///     `zap_epsilon * max(1, largest magnitude involved)`.
    pub zap_epsilon: Decimal,

    /// Soft cap on the number of live equations; exceeding it raises a warning.
    pub max_equations: usize,

    /// Whether referencing a variable of an enclosing group without saving it is an error.
    pub strict_scopes: bool,

    /// Trace every equation accepted by the solver.
    pub tracing_equations: bool,

    /// Trace capsule creation and reclamation.
    pub tracing_capsules: bool,

    /// Echo traces and diagnostics to the terminal, not only to the log file.
    pub tracing_online: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            precision_digits: DEFAULT_PRECISION,
            zap_epsilon: Decimal::new(1, -9),
            max_equations: DEFAULT_MAX_EQUATIONS,
            strict_scopes: false,
            tracing_equations: false,
            tracing_capsules: false,
            tracing_online: false,
        }
    }
}

impl Options {
    /// The rounding parameters handed to the solver and the expression stack.
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            precision: self.precision_digits.clamp(1, MAX_PRECISION),
            epsilon: self.zap_epsilon.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_is_clamped() {
        let options = Options {
            precision_digits: 40,
            ..Default::default()
        };
        assert_eq!(options.tolerance().precision, MAX_PRECISION);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_fields_take_defaults() {
        let options: Options =
            serde_json::from_str(r#"{"strict_scopes": true, "zap_epsilon": "1e-6"}"#).unwrap();
        assert_eq!(
            options,
            Options {
                strict_scopes: true,
                zap_epsilon: Decimal::new(1, -6),
                ..Default::default()
            }
        );
    }
}
