//! State-nonce generation for the authorization redirect.
//!
//! The nonce is round-tripped through the provider redirect and validated
//! on callback so a forged callback cannot complete a login the service
//! never started. Validation is mandatory; a missing or mismatched nonce
//! is a hard failure.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Generate a random state nonce for callback forgery protection.
///
/// Returns a URL-safe base64-encoded string of 32 random bytes (43
/// characters), comfortably above the 16-byte entropy floor the callback
/// validation relies on. Each call produces a fresh value.
#[must_use]
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Validate that the callback state matches the nonce issued at login
/// start.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected == actual
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_states_are_unique() {
        let state1 = generate_state();
        let state2 = generate_state();

        assert_ne!(state1, state2);
    }

    #[test]
    fn generated_state_has_enough_entropy() {
        let state = generate_state();

        // 32 bytes base64url-encoded without padding
        assert!(state.len() >= 43);
    }

    #[test]
    fn generated_state_is_url_safe() {
        let state = generate_state();

        assert!(!state.contains('='));
        assert!(!state.contains('+'));
        assert!(!state.contains('/'));
    }

    #[test]
    fn validation_is_exact_match_only() {
        let state = generate_state();

        assert!(validate_state(&state, &state));
        assert!(!validate_state(&state, "forged"));
        assert!(!validate_state(&state, ""));
    }
}
