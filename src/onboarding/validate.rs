use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("full name is empty")]
    Empty,
    #[error("full name needs at least a first and a last name")]
    TooShort,
    #[error("full name may contain only letters, apostrophes and hyphens")]
    InvalidCharacters,
    #[error("full name is longer than 255 characters")]
    TooLong,
}

/// Matches the `VARCHAR(255)` name columns.
pub const MAX_FULL_NAME_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not a Ukrainian phone number")]
pub struct PhoneError;

const APOSTROPHES: [char; 3] = ['\'', '’', 'ʼ'];

fn is_name_word(word: &str) -> bool {
    let mut letters = 0usize;
    for ch in word.chars() {
        if ch.is_alphabetic() {
            letters += 1;
        } else if ch != '-' && !APOSTROPHES.contains(&ch) {
            return false;
        }
    }
    letters > 0
}

/// Returns the trimmed name on success.
pub fn validate_full_name(input: &str) -> Result<String, NameError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < 2 {
        return Err(NameError::TooShort);
    }
    if !words.iter().all(|word| is_name_word(word)) {
        return Err(NameError::InvalidCharacters);
    }

    let full_name = words.join(" ");
    if full_name.chars().count() > MAX_FULL_NAME_CHARS {
        return Err(NameError::TooLong);
    }
    Ok(full_name)
}

/// Canonical `+380XXXXXXXXX` form of a Ukrainian number.
pub fn normalize_phone(input: &str) -> Result<String, PhoneError> {
    let digits: String = input.chars().filter(|ch| ch.is_ascii_digit()).collect();

    let national = if digits.len() == 12 && digits.starts_with("380") {
        &digits[3..]
    } else if digits.len() == 11 && digits.starts_with("80") {
        &digits[2..]
    } else if digits.len() == 10 && digits.starts_with('0') {
        &digits[1..]
    } else {
        return Err(PhoneError);
    };

    Ok(format!("+380{national}"))
}

/// Phone digits as the CRM matches them: no plus sign, no separators.
pub fn crm_phone(normalized: &str) -> String {
    normalized.chars().filter(|ch| ch.is_ascii_digit()).collect()
}

pub fn sanitize_folder_name(name: &str) -> String {
    name.replace(' ', "_")
        .chars()
        .filter(|ch| !matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_multi_word_names() {
        assert_eq!(
            validate_full_name("  Іван   Петренко "),
            Ok("Іван Петренко".to_string())
        );
        assert!(validate_full_name("Марія-Олена Д'Арк").is_ok());
        assert!(validate_full_name("Ольга Мар’янівна Коваль").is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(validate_full_name("   "), Err(NameError::Empty));
        assert_eq!(validate_full_name("Іван"), Err(NameError::TooShort));
        assert_eq!(
            validate_full_name("Іван Петренко2"),
            Err(NameError::InvalidCharacters)
        );
        assert_eq!(validate_full_name("Іван -"), Err(NameError::InvalidCharacters));
    }

    #[test]
    fn caps_name_length_in_characters() {
        let long = format!("{} Петренко", "Іван".repeat(70));
        assert_eq!(validate_full_name(&long), Err(NameError::TooLong));

        let last = "Я".repeat(MAX_FULL_NAME_CHARS - 5);
        let fits = format!("Іван {last}");
        assert_eq!(fits.chars().count(), MAX_FULL_NAME_CHARS);
        assert_eq!(validate_full_name(&fits), Ok(fits.clone()));
    }

    #[test]
    fn normalizes_accepted_shapes() {
        for input in [
            "0501234567",
            "380501234567",
            "80501234567",
            "+38 (050) 123-45-67",
            "+380501234567",
        ] {
            assert_eq!(normalize_phone(input), Ok("+380501234567".to_string()), "{input}");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in ["0671112233", "380671112233", "80671112233"] {
            let once = normalize_phone(input).unwrap();
            assert_eq!(normalize_phone(&once).unwrap(), once);
        }
    }

    #[test]
    fn rejects_other_patterns() {
        for input in ["", "12345", "050123456", "1501234567", "3805012345678", "+48501234567"] {
            assert_eq!(normalize_phone(input), Err(PhoneError), "{input}");
        }
    }

    #[test]
    fn crm_phone_drops_plus() {
        assert_eq!(crm_phone("+380501234567"), "380501234567");
    }

    #[test]
    fn sanitizes_folder_names() {
        assert_eq!(sanitize_folder_name("Іван Петренко"), "Іван_Петренко");
        assert_eq!(sanitize_folder_name("a/b:c*d?"), "abcd");
    }
}
