//! Guess evaluation
//!
//! Classic bulls-and-cows scoring with duplicate-aware counting: exact
//! matches are settled first, then leftover secret digits are handed out to
//! the remaining guess positions from left to right.

use crate::models::{Code, Feedback, Status, CODE_LENGTH};

/// Score `guess` against `secret`
pub fn evaluate(secret: &Code, guess: &Code) -> Feedback {
    let secret = secret.digits();
    let guess = guess.digits();

    let mut statuses = [Status::Absent; CODE_LENGTH];
    // Unmatched secret digits, indexed by digit value
    let mut remaining = [0u8; 10];

    for i in 0..CODE_LENGTH {
        if guess[i] == secret[i] {
            statuses[i] = Status::Correct;
        } else {
            remaining[secret[i] as usize] += 1;
        }
    }

    for i in 0..CODE_LENGTH {
        if statuses[i] == Status::Correct {
            continue;
        }
        let slot = &mut remaining[guess[i] as usize];
        if *slot > 0 {
            statuses[i] = Status::Present;
            *slot -= 1;
        }
    }

    Feedback(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::{Absent, Correct, Present};

    fn score(secret: &str, guess: &str) -> [Status; CODE_LENGTH] {
        evaluate(&secret.parse().unwrap(), &guess.parse().unwrap()).0
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(score("4271", "4271"), [Correct; 4]);
        assert!(evaluate(&"4271".parse().unwrap(), &"4271".parse().unwrap()).is_solved());
    }

    #[test]
    fn test_no_overlap() {
        assert_eq!(score("1234", "5678"), [Absent; 4]);
    }

    #[test]
    fn test_repeated_guess_digits_bounded_by_secret() {
        assert_eq!(score("1123", "1111"), [Correct, Correct, Absent, Absent]);
    }

    #[test]
    fn test_all_present() {
        assert_eq!(score("1234", "4321"), [Present; 4]);
    }

    #[test]
    fn test_present_consumed_left_to_right() {
        // Secret has a single unmatched 1; only the first stray 1 earns it
        assert_eq!(score("2221", "1112"), [Present, Absent, Absent, Present]);
    }

    #[test]
    fn test_correct_takes_priority_over_present() {
        // The 3 at position 2 is correct, so the earlier 3 has nothing left
        assert_eq!(score("4532", "3535"), [Absent, Correct, Correct, Absent]);
    }

    #[test]
    fn test_repeated_secret_digits() {
        assert_eq!(score("7700", "0077"), [Present; 4]);
        assert_eq!(score("7700", "7007"), [Correct, Present, Correct, Present]);
    }

    #[test]
    fn test_statuses_always_sum_to_length() {
        let codes = ["0000", "1123", "1234", "4321", "9999", "0909", "1111", "2211"];
        for secret in codes {
            for guess in codes {
                let feedback = evaluate(&secret.parse().unwrap(), &guess.parse().unwrap());
                let total = feedback.count(Correct)
                    + feedback.count(Present)
                    + feedback.count(Absent);
                assert_eq!(total, CODE_LENGTH, "{} vs {}", secret, guess);
            }
        }
    }
}
