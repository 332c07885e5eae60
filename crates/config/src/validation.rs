//! Field validators shared by the config sections

pub use crate::error::ValidationError;

/// A named table of the config file that can check itself
pub trait ConfigSection: Default {
    /// Returns every problem found in this section
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Table name in `config.toml`
    fn section_name(&self) -> &'static str;
}

/// Field validators; each returns one error naming the offending field
pub struct Validator;

impl Validator {
    /// Inclusive range check
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Accepts `http://` and `https://` URLs only
    pub fn http_url(value: &str, field: &str) -> Result<(), ValidationError> {
        Self::not_empty(value, field)?;

        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));
        match rest {
            Some(host) if !host.trim_start_matches('/').is_empty() => Ok(()),
            _ => Err(ValidationError::with_value(field, "must be an http(s) URL", value)),
        }
    }

    /// Requires `lower <= upper`; the error is reported on `lower_field`
    pub fn ordered<T>(
        lower: T,
        upper: T,
        lower_field: &str,
        upper_field: &str,
    ) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if lower > upper {
            Err(ValidationError::with_value(
                lower_field,
                format!("must not exceed {}", upper_field),
                lower,
            ))
        } else {
            Ok(())
        }
    }

    /// An unset optional limit is fine; a set one must be at least `min`
    pub fn optional_at_least<T>(value: Option<T>, min: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        match value {
            Some(v) if v < min => Err(ValidationError::with_value(
                field,
                format!("must be at least {} when set", min),
                v,
            )),
            _ => Ok(()),
        }
    }

    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
