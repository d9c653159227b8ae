//! Value coercion: raw field value -> rendered text -> translated text -> classified cell.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::conf::N_DECIMAL_SCALE;
use crate::error::ExportError;
use crate::spec::{
    EnumCellValue, EnumNumericRule, EnumRawValue, SpecColumnPlan, SpecFieldDescriptor,
};

static RE_NUMERIC_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("numeric text pattern is valid")
});

////////////////////////////////////////////////////////////////////////////////
// #region DatePattern

/// Translate a `yyyy-MM-dd HH:mm:ss` style pattern into a chrono strftime string.
///
/// Letters are counted in runs (`MM` vs `MMM`); text inside single quotes is
/// literal and `''` is a literal quote. Unknown pattern letters are rejected.
pub fn convert_date_pattern(pattern: &str) -> Result<String, String> {
    let l_chars: Vec<char> = pattern.chars().collect();
    let mut c_fmt = String::with_capacity(pattern.len() * 2);
    let mut n_idx = 0;

    while n_idx < l_chars.len() {
        let chr = l_chars[n_idx];

        if chr == '\'' {
            if l_chars.get(n_idx + 1) == Some(&'\'') {
                c_fmt.push('\'');
                n_idx += 2;
                continue;
            }
            let Some(n_len_quoted) = l_chars[n_idx + 1..].iter().position(|c| *c == '\'') else {
                return Err("unterminated quote".to_string());
            };
            for lit in &l_chars[n_idx + 1..n_idx + 1 + n_len_quoted] {
                push_literal(&mut c_fmt, *lit);
            }
            n_idx += n_len_quoted + 2;
            continue;
        }

        if !chr.is_ascii_alphabetic() {
            push_literal(&mut c_fmt, chr);
            n_idx += 1;
            continue;
        }

        let n_run = l_chars[n_idx..].iter().take_while(|c| **c == chr).count();
        let c_spec = match (chr, n_run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('D', 1 | 2) => "%-j",
            ('D', _) => "%j",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            _ => return Err(format!("unsupported pattern letter {chr:?}")),
        };
        c_fmt.push_str(c_spec);
        n_idx += n_run;
    }

    if StrftimeItems::new(&c_fmt).any(|item| matches!(item, Item::Error)) {
        return Err(format!("translated format {c_fmt:?} is not renderable"));
    }
    Ok(c_fmt)
}

fn push_literal(fmt: &mut String, chr: char) {
    if chr == '%' {
        fmt.push_str("%%");
    } else {
        fmt.push(chr);
    }
}

fn format_date_time(value: &NaiveDateTime, strftime: &str) -> Result<String, String> {
    let mut c_txt = String::new();
    write!(c_txt, "{}", value.format(strftime))
        .map_err(|_| format!("format {strftime:?} failed for {value}"))?;
    Ok(c_txt)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Rendering

/// Round half-to-even to two fractional digits, keeping exactly two digits.
pub fn round_decimal(value: Decimal) -> Decimal {
    let mut d_rounded =
        value.round_dp_with_strategy(N_DECIMAL_SCALE, RoundingStrategy::MidpointNearestEven);
    d_rounded.rescale(N_DECIMAL_SCALE);
    d_rounded
}

/// Classify rendered text as numeric or text.
pub fn classify_text(text: String, rule_numeric: EnumNumericRule) -> EnumCellValue {
    if rule_numeric == EnumNumericRule::Pattern
        && RE_NUMERIC_TEXT.is_match(&text)
        && let Ok(val) = text.parse::<f64>()
        && val.is_finite()
    {
        return EnumCellValue::Numeric(val);
    }
    EnumCellValue::Text(text)
}

/// Date pattern of one column, translated once per export call.
#[derive(Debug, Clone)]
struct SpecDatePattern {
    pattern: String,
    strftime: Result<String, String>,
}

impl SpecDatePattern {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            strftime: convert_date_pattern(pattern),
        }
    }

    fn render(&self, value: &NaiveDateTime) -> Result<String, ExportError> {
        let strftime = self
            .strftime
            .as_ref()
            .map_err(|msg| ExportError::InvalidDateFormat {
                pattern: self.pattern.clone(),
                message: msg.clone(),
            })?;
        format_date_time(value, strftime).map_err(|message| ExportError::InvalidDateFormat {
            pattern: self.pattern.clone(),
            message,
        })
    }
}

/// Render a raw value as text before translation.
fn render_raw_value(
    value: &EnumRawValue,
    field: &SpecFieldDescriptor,
    date_pattern: &SpecDatePattern,
) -> Result<String, ExportError> {
    match value {
        EnumRawValue::Null => Ok(String::new()),
        EnumRawValue::Date(val) => date_pattern.render(&val.and_time(NaiveTime::MIN)),
        EnumRawValue::DateTime(val) => date_pattern.render(val),
        EnumRawValue::Decimal(val) => Ok(round_decimal(*val).to_string()),
        EnumRawValue::Integer(val) => Ok(val.to_string()),
        EnumRawValue::Float(val) => Ok(val.to_string()),
        EnumRawValue::Boolean(val) => Ok(val.to_string()),
        EnumRawValue::Text(val) => Ok(val.clone()),
        EnumRawValue::Binary(_) => Err(ExportError::UnsupportedValueType {
            field: field.name.clone(),
            kind: value.kind(),
        }),
    }
}

fn coerce_with_pattern(
    value: &EnumRawValue,
    field: &SpecFieldDescriptor,
    date_pattern: &SpecDatePattern,
    rule_numeric: EnumNumericRule,
) -> Result<EnumCellValue, ExportError> {
    let c_rendered = render_raw_value(value, field, date_pattern)?;
    let c_display = match field.translate_text(&c_rendered) {
        Some(val) => val.to_string(),
        None => c_rendered,
    };
    Ok(classify_text(c_display, rule_numeric))
}

/// Coerce one raw value of `field` into a cell value.
///
/// `date_format_override` takes precedence over the field's own date pattern.
pub fn coerce_value(
    value: &EnumRawValue,
    field: &SpecFieldDescriptor,
    date_format_override: Option<&str>,
    rule_numeric: EnumNumericRule,
) -> Result<EnumCellValue, ExportError> {
    let date_pattern = SpecDatePattern::new(date_format_override.unwrap_or(&field.format));
    coerce_with_pattern(value, field, &date_pattern, rule_numeric)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnCoercer

/// Per-export coercer holding one translated date pattern per planned column.
#[derive(Debug, Clone)]
pub struct ValueCoercer {
    l_date_patterns: Vec<SpecDatePattern>,
    rule_numeric: EnumNumericRule,
}

impl ValueCoercer {
    pub fn new(
        plan: &SpecColumnPlan,
        date_format_override: Option<&str>,
        rule_numeric: EnumNumericRule,
    ) -> Self {
        let l_date_patterns = plan
            .columns
            .iter()
            .map(|c| SpecDatePattern::new(date_format_override.unwrap_or(&c.field.format)))
            .collect();
        Self {
            l_date_patterns,
            rule_numeric,
        }
    }

    pub fn rule_numeric(&self) -> EnumNumericRule {
        self.rule_numeric
    }

    /// Coerce a value of the field planned at `col_idx`.
    pub fn coerce(
        &self,
        col_idx: usize,
        field: &SpecFieldDescriptor,
        value: &EnumRawValue,
    ) -> Result<EnumCellValue, ExportError> {
        match self.l_date_patterns.get(col_idx) {
            Some(date_pattern) => coerce_with_pattern(value, field, date_pattern, self.rule_numeric),
            None => coerce_value(value, field, None, self.rule_numeric),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
