//! FILENAME: core/pivot-table/src/number_format.rs
//! PURPOSE: Number formatting utilities for pivot table cells.
//! CONTEXT: Raw response values are turned into display strings here. Data
//! cells keep the value the server sent; computed totals are rounded to the
//! display precision. Digit grouping follows the layout's separator option.

use crate::definition::DigitGroupSeparator;
use crate::response::ResponseValue;

/// Number of digits after the decimal point in the shortest display form.
pub fn number_of_decimals(value: f64) -> usize {
    let text = value.to_string();
    match text.find('.') {
        Some(pos) => text.len() - pos - 1,
        None => 0,
    }
}

/// Folds negative zero into zero so it never displays as "-0".
fn unsigned_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Rounds only when the value carries more decimals than `precision`.
/// Exact ties round to even.
pub fn round_if(value: f64, precision: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let rounded = if number_of_decimals(value) > precision as usize {
        format!("{:.prec$}", value, prec = precision as usize)
            .parse()
            .unwrap_or(value)
    } else {
        value
    };
    unsigned_zero(rounded)
}

/// Parses a string that is entirely a finite number ("10", "-3.5", " 7 ").
/// Partial numbers such as "12abc" are rejected.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

/// Numeric contribution of a response value to sums.
/// Booleans count as 1, anything non-numeric counts as 0.
pub fn response_number(value: &ResponseValue) -> f64 {
    match value {
        ResponseValue::Null => 0.0,
        ResponseValue::Bool(_) => 1.0,
        ResponseValue::Number(n) if n.is_finite() => *n,
        ResponseValue::Number(_) => 0.0,
        ResponseValue::Text(s) => parse_numeric(s).unwrap_or(0.0),
    }
}

/// Display text of a data cell: numeric strings are normalized, other text is kept.
pub fn value_display(value: &ResponseValue) -> String {
    match value {
        ResponseValue::Null => String::new(),
        ResponseValue::Bool(b) => b.to_string(),
        ResponseValue::Number(n) => unsigned_zero(*n).to_string(),
        ResponseValue::Text(s) => match parse_numeric(s) {
            Some(n) => unsigned_zero(n).to_string(),
            None => s.clone(),
        },
    }
}

/// Display text of a computed total.
pub fn rounded_display(value: f64, precision: u32) -> String {
    round_if(value, precision).to_string()
}

/// Inserts the group separator every three digits of the integer part.
/// Text that is not a plain number is returned unchanged.
pub fn pretty_print(text: &str, separator: DigitGroupSeparator) -> String {
    let sep = separator.symbol();
    if sep.is_empty() {
        return text.to_string();
    }

    let (integer_part, decimal_part) = match text.find('.') {
        Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
        None => (text, None),
    };

    let (sign, digits) = match integer_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer_part),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return text.to_string();
    }
    if let Some(decimal) = decimal_part {
        if !decimal.chars().all(|c| c.is_ascii_digit()) {
            return text.to_string();
        }
    }

    let mut result = String::with_capacity(text.len() + digits.len() / 3);
    result.push_str(sign);

    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push_str(sep);
        }
        result.push(c);
    }

    if let Some(decimal) = decimal_part {
        result.push('.');
        result.push_str(decimal);
    }

    result
}
