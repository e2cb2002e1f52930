//! Typed reading and writing of attribute values and text content.

/// How integer values are read from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Only integer literals are accepted.
    #[default]
    Strict,
    /// Decimal literals are also accepted and truncated toward zero.
    Lenient,
}

/// A value that can be read from attribute or text content.
pub trait ParseValue: Sized + Copy {
    /// Parses `text`, returning `None` when it does not hold a valid value.
    fn parse_value(text: &str, mode: ParseMode) -> Option<Self>;
}

/// Parses a decimal literal and truncates it to an integer within
/// `min..=max`.
fn truncate_decimal(text: &str, min: f64, max: f64) -> Option<f64> {
    let value: f64 = text.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    (min..=max).contains(&truncated).then_some(truncated)
}

macro_rules! impl_parse_integer {
    ($($ty:ty),*) => {
        $(
            impl ParseValue for $ty {
                fn parse_value(text: &str, mode: ParseMode) -> Option<Self> {
                    match text.parse::<$ty>() {
                        Ok(value) => Some(value),
                        Err(_) if mode == ParseMode::Lenient => {
                            truncate_decimal(text, <$ty>::MIN as f64, <$ty>::MAX as f64)
                                .map(|v| v as $ty)
                        }
                        Err(_) => None,
                    }
                }
            }
        )*
    };
}

impl_parse_integer!(i8, i16, i32, i64);

impl ParseValue for f32 {
    fn parse_value(text: &str, _mode: ParseMode) -> Option<Self> {
        text.parse().ok()
    }
}

impl ParseValue for f64 {
    fn parse_value(text: &str, _mode: ParseMode) -> Option<Self> {
        text.parse().ok()
    }
}

impl ParseValue for bool {
    fn parse_value(text: &str, _mode: ParseMode) -> Option<Self> {
        match text {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

/// Characters are written as their integer code point, limited to the
/// 16-bit range.
impl ParseValue for char {
    fn parse_value(text: &str, mode: ParseMode) -> Option<Self> {
        let code = i32::parse_value(text, mode)?;
        let code = u16::try_from(code).ok()?;
        char::from_u32(u32::from(code))
    }
}

/// A value that can be written as attribute or text content.
pub trait FormatValue {
    fn format_value(&self) -> String;
}

macro_rules! impl_format_display {
    ($($ty:ty),*) => {
        $(
            impl FormatValue for $ty {
                fn format_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_format_display!(i8, i16, i32, i64, f32, f64, bool);

/// Written as the integer code point.
impl FormatValue for char {
    fn format_value(&self) -> String {
        u32::from(*self).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_integers() {
        assert_eq!(i32::parse_value("12", ParseMode::Strict), Some(12));
        assert_eq!(i32::parse_value("-7", ParseMode::Strict), Some(-7));
        assert_eq!(i32::parse_value("12.5", ParseMode::Strict), None);
        assert_eq!(i8::parse_value("300", ParseMode::Strict), None);
        assert_eq!(i64::parse_value("abc", ParseMode::Strict), None);
    }

    #[test]
    fn test_lenient_integers_truncate() {
        assert_eq!(i32::parse_value("12.9", ParseMode::Lenient), Some(12));
        assert_eq!(i32::parse_value("-3.7", ParseMode::Lenient), Some(-3));
        assert_eq!(i16::parse_value("40000.5", ParseMode::Lenient), None);
        assert_eq!(i64::parse_value("1e3", ParseMode::Lenient), Some(1000));
        assert_eq!(i32::parse_value("NaN", ParseMode::Lenient), None);
    }

    #[test]
    fn test_floats() {
        assert_eq!(f32::parse_value("2.5", ParseMode::Strict), Some(2.5));
        assert_eq!(f64::parse_value("3", ParseMode::Strict), Some(3.0));
        assert_eq!(f64::parse_value("three", ParseMode::Strict), None);
    }

    #[test]
    fn test_booleans_are_exact() {
        assert_eq!(bool::parse_value("true", ParseMode::Strict), Some(true));
        assert_eq!(bool::parse_value("false", ParseMode::Strict), Some(false));
        assert_eq!(bool::parse_value("TRUE", ParseMode::Strict), None);
        assert_eq!(bool::parse_value("1", ParseMode::Strict), None);
    }

    #[test]
    fn test_chars_from_code_points() {
        assert_eq!(char::parse_value("65", ParseMode::Strict), Some('A'));
        assert_eq!(char::parse_value("70000", ParseMode::Strict), None);
        assert_eq!(char::parse_value("-1", ParseMode::Strict), None);
        assert_eq!(char::parse_value("A", ParseMode::Strict), None);
    }

    #[test]
    fn test_format_values() {
        assert_eq!('A'.format_value(), "65");
        assert_eq!('é'.format_value(), "233");
        assert_eq!((-12i16).format_value(), "-12");
        assert_eq!(2.5f64.format_value(), "2.5");
        assert_eq!(true.format_value(), "true");
        assert_eq!(char::parse_value(&'é'.format_value(), ParseMode::Strict), Some('é'));
    }
}
