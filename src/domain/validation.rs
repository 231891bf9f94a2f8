//! Input format checks shared by the request schemas.
//!
//! Person and organisation numbers follow the Swedish registry formats;
//! ownership percentages must sum to 100 per deed.

/// Tolerance for the ownership percentage sum, to absorb floating point
/// representation of values like 33.33 + 33.33 + 33.34.
pub const OWNERSHIP_SUM_TOLERANCE: f64 = 0.01;

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Borrower person number: exactly 12 digits (YYYYMMDDXXXX).
pub fn is_valid_person_number(value: &str) -> bool {
    value.len() == 12 && all_digits(value)
}

/// Administrator person number: YYYYMMDDXXXX or YYYYMMDD-XXXX.
pub fn is_valid_admin_person_number(value: &str) -> bool {
    match value.len() {
        12 => all_digits(value),
        13 => {
            let (date, rest) = value.split_at(8);
            all_digits(date) && rest.starts_with('-') && all_digits(&rest[1..])
        }
        _ => false,
    }
}

/// Organisation number: NNNNNN-NNNN.
pub fn is_valid_organisation_number(value: &str) -> bool {
    value.len() == 11 && {
        let (head, rest) = value.split_at(6);
        all_digits(head) && rest.starts_with('-') && all_digits(&rest[1..])
    }
}

/// Postal code: 5 digits, optionally separated by a space ("123 45").
pub fn is_valid_postal_code(value: &str) -> bool {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned.len() == 5 && all_digits(&cleaned)
}

/// Minimal shape check for email addresses; full validation is the email
/// provider's problem.
pub fn is_valid_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// Each percentage must be in (0, 100] and the sum must equal 100 within
/// the tolerance.
pub fn validate_ownership_percentages(percentages: &[f64]) -> Result<(), String> {
    for pct in percentages {
        if *pct <= 0.0 || *pct > 100.0 {
            return Err(format!(
                "Ownership percentage must be greater than 0 and at most 100, got {}",
                pct
            ));
        }
    }

    let total: f64 = percentages.iter().sum();
    if (total - 100.0).abs() > OWNERSHIP_SUM_TOLERANCE {
        return Err(format!(
            "Total ownership percentage must equal 100, got {}",
            total
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_number() {
        assert!(is_valid_person_number("198001011234"));
        assert!(!is_valid_person_number("19800101-1234"));
        assert!(!is_valid_person_number("1980010112"));
        assert!(!is_valid_person_number("19800101123a"));
    }

    #[test]
    fn test_admin_person_number_accepts_both_formats() {
        assert!(is_valid_admin_person_number("198001011234"));
        assert!(is_valid_admin_person_number("19800101-1234"));
        assert!(!is_valid_admin_person_number("1980-01011234"));
        assert!(!is_valid_admin_person_number("198001011"));
    }

    #[test]
    fn test_organisation_number() {
        assert!(is_valid_organisation_number("123456-7890"));
        assert!(!is_valid_organisation_number("1234567890"));
        assert!(!is_valid_organisation_number("12345-67890"));
    }

    #[test]
    fn test_postal_code() {
        assert!(is_valid_postal_code("12345"));
        assert!(is_valid_postal_code("123 45"));
        assert!(!is_valid_postal_code("1234"));
        assert!(!is_valid_postal_code("12a45"));
    }

    #[test]
    fn test_ownership_sum() {
        assert!(validate_ownership_percentages(&[50.0, 50.0]).is_ok());
        assert!(validate_ownership_percentages(&[33.33, 33.33, 33.34]).is_ok());
        assert!(validate_ownership_percentages(&[60.0, 50.0]).is_err());
        assert!(validate_ownership_percentages(&[100.0, 0.0]).is_err());
        assert!(validate_ownership_percentages(&[101.0]).is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("anna@example.com"));
        assert!(!is_valid_email("anna.example.com"));
        assert!(!is_valid_email("anna@nodot"));
    }
}
