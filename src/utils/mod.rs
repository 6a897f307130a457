const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of identity tokens handed to new visitors.
pub const OWNER_TOKEN_LENGTH: usize = 32;

pub fn generate_random_code(length: usize) -> String {
    use std::iter;

    iter::repeat_with(|| ALPHANUMERIC[rand::random_range(0..ALPHANUMERIC.len())] as char)
        .take(length)
        .collect()
}

/// Fresh opaque owner token for a visitor without one.
pub fn generate_owner_token() -> String {
    generate_random_code(OWNER_TOKEN_LENGTH)
}

/// Source of short identifiers.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, length: usize) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, length: usize) -> String {
        generate_random_code(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_length_and_charset() {
        for len in [1, 6, 10, 64] {
            let code = generate_random_code(len);
            assert_eq!(code.len(), len);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_owner_tokens_differ() {
        let a = generate_owner_token();
        let b = generate_owner_token();
        assert_eq!(a.len(), OWNER_TOKEN_LENGTH);
        assert_ne!(a, b);
    }
}
