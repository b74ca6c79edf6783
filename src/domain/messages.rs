//! Message composition rules.

use super::validation::FieldErrors;

pub const MAX_MESSAGE_LEN: usize = 140;

#[derive(Debug, Clone, Default)]
pub struct MessageInput {
    pub text: String,
}

impl MessageInput {
    /// Trims surrounding whitespace; length is counted in characters, as the column is.
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.push("text", "This field is required.");
        } else if text.chars().count() > MAX_MESSAGE_LEN {
            errors.push(
                "text",
                format!("Messages are limited to {MAX_MESSAGE_LEN} characters."),
            );
        }
        errors.into_result(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text_up_to_the_limit() {
        let text = "é".repeat(MAX_MESSAGE_LEN);
        let valid = MessageInput { text: text.clone() }
            .validate()
            .expect("multibyte text within limit");
        assert_eq!(valid, text);
    }

    #[test]
    fn rejects_blank_and_overlong_text() {
        assert!(MessageInput { text: "  \n".into() }.validate().is_err());
        assert!(
            MessageInput {
                text: "a".repeat(MAX_MESSAGE_LEN + 1)
            }
            .validate()
            .is_err()
        );
    }
}
