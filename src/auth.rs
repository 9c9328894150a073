/*!
Password hashing and the credentials used by the account lifecycle:
verification codes and password-reset tokens.
*/
use rand::Rng;
use tokio::task;

const SALT_LENGTH: usize = 16;
const RESET_TOKEN_BYTES: usize = 20;

/// How long a password-reset token stays redeemable.
pub const RESET_TOKEN_TTL: time::Duration = time::Duration::hours(1);

/// Produce an encoded argon2 hash of `password`.
///
/// Hashing is deliberately slow, so it runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, String> {
    task::spawn_blocking(move || {
        let salt: [u8; SALT_LENGTH] = rand::thread_rng().gen();
        argon2::hash_encoded(
            password.as_bytes(),
            &salt,
            &argon2::Config::default()
        ).map_err(|e| format!("Error hashing password: {}", &e))
    }).await
        .map_err(|e| format!("Hashing task failed: {}", &e))?
}

/// Check `password` against a stored encoded hash.
pub async fn verify_password(
    encoded: String,
    password: String
) -> Result<bool, String> {
    task::spawn_blocking(move || {
        argon2::verify_encoded(&encoded, password.as_bytes())
            .map_err(|e| format!("Error verifying password: {}", &e))
    }).await
        .map_err(|e| format!("Verification task failed: {}", &e))?
}

/// Random 6-digit code proving email ownership at signup.
pub fn generate_verification_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    n.to_string()
}

/// Random hex token for password reset links.
pub fn generate_reset_token() -> String {
    use std::fmt::Write;

    let bytes: [u8; RESET_TOKEN_BYTES] = rand::thread_rng().gen();
    let mut token = String::with_capacity(2 * RESET_TOKEN_BYTES);
    for b in bytes.iter() {
        write!(&mut token, "{:02x}", b).unwrap();
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[tokio::test]
    async fn hash_and_verify() {
        ensure_logging();

        let hash = hash_password("hunter2".to_owned()).await.unwrap();
        assert!(verify_password(hash.clone(), "hunter2".to_owned()).await.unwrap());
        assert!(!verify_password(hash, "hunter3".to_owned()).await.unwrap());
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let a = hash_password("hunter2".to_owned()).await.unwrap();
        let b = hash_password("hunter2".to_owned()).await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verification_code_shape() {
        for _ in 0..64 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn reset_token_shape() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 2 * RESET_TOKEN_BYTES);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
    }
}
