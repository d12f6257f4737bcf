//! Per-class trust exemptions.

use probe_frontend::ast::{Modifiers, Span};
use probe_frontend::{AnnotationArg, Expr, Literal};

/// Annotation argument names that carry a trust value.
pub const TRUST_KEYS: [&str; 2] = ["unsafe", "trusted"];

/// Outcome of matching a single trust argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustValue {
    /// `unsafe = true` or `trusted = true`: skip verification.
    Exempt,
    /// Literal `false`.
    NotExempt,
    /// Any other value. Ignored for exemption, with a warning at `span`.
    Malformed { span: Span },
}

impl TrustValue {
    pub fn of_value(value: &Expr) -> Self {
        match value.as_literal() {
            Some(Literal::Bool(true)) => Self::Exempt,
            Some(Literal::Bool(false)) => Self::NotExempt,
            _ => Self::Malformed { span: value.span },
        }
    }

    pub fn is_exempt(self) -> bool {
        self == Self::Exempt
    }
}

/// Trust arguments of one declaration, scanned across every annotation.
///
/// The scan stops at the first literal `true`; malformed values seen
/// before it are kept for reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trust {
    exempt: bool,
    malformed: Vec<Span>,
}

impl Trust {
    pub fn of(modifiers: &Modifiers) -> Self {
        let mut trust = Self::default();
        let values = modifiers
            .annotations
            .iter()
            .flat_map(|annotation| annotation.args.iter())
            .filter_map(|arg| match arg {
                AnnotationArg::Assign { name, value } if TRUST_KEYS.contains(&name.name.as_str()) => {
                    Some(TrustValue::of_value(value))
                }
                _ => None,
            });
        for value in values {
            match value {
                TrustValue::Exempt => {
                    trust.exempt = true;
                    break;
                }
                TrustValue::NotExempt => {}
                TrustValue::Malformed { span } => trust.malformed.push(span),
            }
        }
        trust
    }

    pub fn is_exempt(&self) -> bool {
        self.exempt
    }

    /// Positions of non-literal trust values, in declaration order.
    pub fn malformed(&self) -> &[Span] {
        &self.malformed
    }
}
