//! Type and range checks for user-supplied scalars.
//!
//! All checks are pure: they never panic and report failures as
//! [`ValidationError`] values whose `Display` text is shown to the user.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::FieldValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    Integer,
    Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Number {
    Integer(i64),
    Decimal(Decimal),
}

impl Number {
    pub fn as_decimal(self) -> Decimal {
        match self {
            Self::Integer(value) => Decimal::from(value),
            Self::Decimal(value) => value,
        }
    }
}

impl From<Number> for FieldValue {
    fn from(value: Number) -> Self {
        match value {
            Number::Integer(value) => FieldValue::Integer(value),
            Number::Decimal(value) => FieldValue::Decimal(value),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No recibí ningún valor.")]
    Empty,
    #[error("«{raw}» no es un número válido.")]
    NotNumeric { raw: String },
    #[error("Se esperaba un número entero y recibí «{raw}».")]
    NotInteger { raw: String },
    #[error("El valor debe estar entre {min} y {max}.")]
    OutOfRange { value: Decimal, min: Decimal, max: Decimal },
    #[error("El texto debe tener entre {min} y {max} caracteres.")]
    TextLength { min: usize, max: usize },
    #[error("Opción no reconocida. Opciones válidas: {options}.")]
    UnknownOption { options: String },
    #[error("Esta etapa se completa con el formulario de riesgos.")]
    StructuredInputRequired,
}

/// Normalizes `,` to `.` and checks the `[+-]digits[.digits]` shape.
pub fn normalize_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let normalized = unsigned.replace(',', ".");

    let digits = normalized.strip_prefix('-').unwrap_or(&normalized);
    let mut parts = digits.split('.');
    let integral = parts.next().unwrap_or_default();
    let fractional = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let all_digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    if !all_digits(integral) || fractional.is_some_and(|part| !all_digits(part)) {
        return None;
    }

    Some(normalized)
}

pub fn validate(
    raw: &str,
    kind: NumberKind,
    min: Decimal,
    max: Decimal,
) -> Result<Number, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let parsed = normalize_number(raw)
        .and_then(|normalized| Decimal::from_str(&normalized).ok())
        .ok_or_else(|| ValidationError::NotNumeric { raw: raw.trim().to_string() })?;

    if parsed < min || parsed > max {
        return Err(ValidationError::OutOfRange { value: parsed, min, max });
    }

    match kind {
        NumberKind::Decimal => Ok(Number::Decimal(parsed)),
        NumberKind::Integer => {
            if !parsed.fract().is_zero() {
                return Err(ValidationError::NotInteger { raw: raw.trim().to_string() });
            }
            parsed
                .to_i64()
                .map(Number::Integer)
                .ok_or_else(|| ValidationError::NotNumeric { raw: raw.trim().to_string() })
        }
    }
}

pub fn validate_integer(raw: &str, min: i64, max: i64) -> Result<i64, ValidationError> {
    match validate(raw, NumberKind::Integer, Decimal::from(min), Decimal::from(max))? {
        Number::Integer(value) => Ok(value),
        Number::Decimal(value) => {
            value.to_i64().ok_or_else(|| ValidationError::NotInteger { raw: raw.to_string() })
        }
    }
}

pub fn validate_text(raw: &str, min_len: usize, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();
    if length == 0 && min_len > 0 {
        return Err(ValidationError::Empty);
    }
    if length < min_len || length > max_len {
        return Err(ValidationError::TextLength { min: min_len, max: max_len });
    }
    Ok(trimmed.to_string())
}

/// Trimmed, lowercased and stripped of Spanish diacritics, with `_` read as a space.
pub fn fold_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            '_' => ' ',
            other => other,
        })
        .collect()
}

/// Matches `raw` against `(code, label)` pairs with [`fold_label`]. Returns the code.
pub fn validate_choice<'a, I>(raw: &str, options: I) -> Result<String, ValidationError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let wanted = fold_label(raw);
    if wanted.is_empty() {
        return Err(ValidationError::Empty);
    }

    let options = options.into_iter().collect::<Vec<_>>();
    options
        .iter()
        .find(|(code, label)| fold_label(code) == wanted || fold_label(label) == wanted)
        .map(|(code, _)| (*code).to_string())
        .ok_or_else(|| ValidationError::UnknownOption {
            options: options.iter().map(|(_, label)| *label).collect::<Vec<_>>().join(", "),
        })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{
        fold_label, normalize_number, validate, validate_choice, validate_integer, validate_text,
        Number, NumberKind, ValidationError,
    };

    #[test]
    fn accepts_comma_and_dot_separators() {
        let min = Decimal::ZERO;
        let max = Decimal::from(1000);
        assert_eq!(
            validate("120,5", NumberKind::Decimal, min, max),
            Ok(Number::Decimal(Decimal::new(1205, 1)))
        );
        assert_eq!(
            validate(" 120.5 ", NumberKind::Decimal, min, max),
            Ok(Number::Decimal(Decimal::new(1205, 1)))
        );
    }

    #[test]
    fn rejects_non_numeric_and_malformed_input() {
        let min = Decimal::ZERO;
        let max = Decimal::from(1000);
        for raw in ["abc", "1,2,3", "1.2.3", "12a", "-", ".5", "5.", "1 000"] {
            assert!(
                matches!(
                    validate(raw, NumberKind::Decimal, min, max),
                    Err(ValidationError::NotNumeric { .. })
                ),
                "`{raw}` should be rejected as non numeric"
            );
        }
        assert_eq!(validate("   ", NumberKind::Integer, min, max), Err(ValidationError::Empty));
    }

    #[test]
    fn integer_kind_rejects_fractions_but_accepts_integral_decimals() {
        assert!(matches!(validate_integer("2,5", 0, 10), Err(ValidationError::NotInteger { .. })));
        assert_eq!(validate_integer("2,0", 0, 10), Ok(2));
        assert_eq!(validate_integer("+7", 0, 10), Ok(7));
    }

    #[test]
    fn range_is_inclusive() {
        assert_eq!(validate_integer("1", 1, 5), Ok(1));
        assert_eq!(validate_integer("5", 1, 5), Ok(5));
        let error = validate_integer("6", 1, 5).expect_err("above max");
        assert_eq!(error.to_string(), "El valor debe estar entre 1 y 5.");
        assert!(validate_integer("-1", 0, 5).is_err());
    }

    #[test]
    fn normalization_keeps_sign() {
        assert_eq!(normalize_number("-3,25").as_deref(), Some("-3.25"));
        assert_eq!(normalize_number("+4").as_deref(), Some("4"));
        assert_eq!(normalize_number(""), None);
    }

    #[test]
    fn text_length_is_checked_in_characters() {
        assert_eq!(validate_text("  Planta Ñaña  ", 3, 20), Ok("Planta Ñaña".to_string()));
        assert_eq!(validate_text("ab", 3, 20), Err(ValidationError::TextLength { min: 3, max: 20 }));
        assert_eq!(validate_text("", 3, 20), Err(ValidationError::Empty));
    }

    #[test]
    fn choice_matches_code_or_label_case_insensitively() {
        let options = [("ARENOSO", "Suelo arenoso"), ("ROCOSO", "Suelo rocoso")];
        assert_eq!(validate_choice("arenoso", options), Ok("ARENOSO".to_string()));
        assert_eq!(validate_choice("SUELO ROCOSO", options), Ok("ROCOSO".to_string()));

        let error = validate_choice("lodo", options).expect_err("unknown option");
        assert_eq!(
            error.to_string(),
            "Opción no reconocida. Opciones válidas: Suelo arenoso, Suelo rocoso."
        );
    }

    #[test]
    fn folding_ignores_accents_case_and_underscores() {
        assert_eq!(fold_label("  Construcción "), "construccion");
        assert_eq!(fold_label("MUY_ALTO"), "muy alto");
        assert_eq!(fold_label("Ñaña"), "ñaña");
        assert_eq!(
            validate_choice("muy alto", [("ALTO", "Riesgo alto"), ("MUY_ALTO", "Riesgo muy alto")]),
            Ok("MUY_ALTO".to_string())
        );
        assert_eq!(
            validate_choice("tecnología", [("TECNOLOGIA", "Tecnología")]),
            Ok("TECNOLOGIA".to_string())
        );
    }

    proptest! {
        #[test]
        fn every_in_range_integer_is_accepted(
            (min, max, x) in (-10_000i64..10_000, 0i64..10_000)
                .prop_flat_map(|(min, span)| (Just(min), Just(min + span), min..=min + span))
        ) {
            prop_assert_eq!(
                validate(&x.to_string(), NumberKind::Integer, Decimal::from(min), Decimal::from(max)),
                Ok(Number::Integer(x))
            );
        }

        #[test]
        fn every_out_of_range_integer_is_rejected(
            min in -10_000i64..10_000,
            span in 0i64..10_000,
            offset in 1i64..10_000,
            below in any::<bool>(),
        ) {
            let max = min + span;
            let x = if below { min - offset } else { max + offset };
            let result =
                validate(&x.to_string(), NumberKind::Integer, Decimal::from(min), Decimal::from(max));
            let is_out_of_range = matches!(result, Err(ValidationError::OutOfRange { .. }));
            prop_assert!(is_out_of_range);
        }

        #[test]
        fn alphabetic_input_is_never_accepted(raw in "[a-zA-Z ]{1,12}") {
            prop_assert!(validate(&raw, NumberKind::Decimal, Decimal::MIN, Decimal::MAX).is_err());
        }
    }
}
