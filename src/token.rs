use diesel::pg::PgConnection;
use diesel::prelude::*;
use rand::Rng;
use thiserror::Error;

use crate::schema::tickets;

/// Uppercase letters and digits minus the visually ambiguous ones
/// (I, O, 0, 1).
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GROUP_LEN: usize = 4;
const GROUP_COUNT: usize = 3;
const SEPARATOR: char = '-';

/// Upper bound on uniqueness retries; an adversarial table state must not
/// spin the generator forever.
const MAX_GENERATION_ATTEMPTS: u32 = 16;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("could not produce a unique token after {0} attempts")]
    Exhausted(u32),
}

pub type TokenResult<T> = Result<T, TokenError>;

/// One candidate token, format `XXXX-XXXX-XXXX`. No uniqueness guarantee.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(GROUP_COUNT * GROUP_LEN + GROUP_COUNT - 1);
    for group in 0..GROUP_COUNT {
        if group > 0 {
            out.push(SEPARATOR);
        }
        for _ in 0..GROUP_LEN {
            let idx = rng.gen_range(0..TOKEN_ALPHABET.len());
            out.push(TOKEN_ALPHABET[idx] as char);
        }
    }
    out
}

/// Structural check only; uniqueness is the generator's concern.
pub fn validate_format(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() != GROUP_COUNT * GROUP_LEN + GROUP_COUNT - 1 {
        return false;
    }
    for (i, byte) in bytes.iter().enumerate() {
        if i % (GROUP_LEN + 1) == GROUP_LEN {
            if *byte != SEPARATOR as u8 {
                return false;
            }
        } else if !TOKEN_ALPHABET.contains(byte) {
            return false;
        }
    }
    true
}

/// Generates a token not yet present among existing tickets. Tokens are
/// write-once: the caller assigns the result exactly once and never
/// regenerates it.
pub fn generate_unique(conn: &mut PgConnection) -> TokenResult<String> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let candidate = generate();
        let taken = diesel::select(diesel::dsl::exists(
            tickets::table.filter(tickets::token.eq(&candidate)),
        ))
        .get_result::<bool>(conn)?;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(TokenError::Exhausted(MAX_GENERATION_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_match_format() {
        for _ in 0..100 {
            let token = generate();
            assert!(validate_format(&token), "bad token {token}");
        }
    }

    #[test]
    fn alphabet_excludes_ambiguous_characters() {
        for banned in [b'I', b'O', b'0', b'1'] {
            assert!(!TOKEN_ALPHABET.contains(&banned));
        }
    }

    #[test]
    fn format_rejects_wrong_shapes() {
        assert!(validate_format("ABCD-EFGH-JKLM"));
        assert!(!validate_format("ABCD-EFGH-JKL"));
        assert!(!validate_format("ABCD-EFGH-JKLMN"));
        assert!(!validate_format("ABCDEFGH-JKLM-"));
        assert!(!validate_format("abcd-efgh-jklm"));
        assert!(!validate_format("ABC0-EFGH-JKLM"));
        assert!(!validate_format("ABCD EFGH JKLM"));
        assert!(!validate_format(""));
    }

    #[test]
    fn separator_positions_are_fixed() {
        assert!(!validate_format("ABCDE-FGH-JKLM"));
        assert!(!validate_format("-ABCD-EFGH-JKL"));
    }
}
