use std::collections::HashMap;

use error_stack::{Report, Result};
use rand::{Rng, seq::IndexedRandom};

use crate::generator::Error;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// Replacement options keyed by pattern character.
pub type Choices = HashMap<char, Vec<String>>;

/// `c` letters, `d` digits, `l` lowercase, `U` uppercase, `p` punctuation,
/// `s` a space, and every punctuation character stands for itself.
#[must_use]
pub fn default_choices() -> Choices {
    let chars = |s: &str| s.chars().map(String::from).collect::<Vec<_>>();
    let mut choices = Choices::from([
        ('c', chars(&format!("{LOWERCASE}{UPPERCASE}"))),
        ('d', chars(DIGITS)),
        ('l', chars(LOWERCASE)),
        ('U', chars(UPPERCASE)),
        ('p', chars(PUNCTUATION)),
        ('s', vec![" ".to_string()]),
    ]);
    choices.extend(PUNCTUATION.chars().map(|c| (c, vec![c.to_string()])));
    choices
}

/// Builds `size` strings by replacing each pattern character with a random
/// option for it.
///
/// Characters without options are copied as is, or dropped with
/// `choice_only`.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(choices, rng)))]
pub fn sample_pattern<R: Rng + ?Sized>(
    pattern: &str,
    choices: &Choices,
    choice_only: bool,
    size: usize,
    rng: &mut R,
) -> Result<Vec<String>, Error> {
    if size == 0 {
        return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
    }
    if let Some((key, _)) = choices.iter().find(|(_, options)| options.is_empty()) {
        return Err(Report::new(Error::InvalidParameter)
            .attach_printable(format!("The choice {key:?} has no options")));
    }

    let mut out = vec![String::with_capacity(pattern.len()); size];
    for c in pattern.chars() {
        match choices.get(&c) {
            Some(options) => {
                for s in &mut out {
                    if let Some(option) = options.choose(rng) {
                        s.push_str(option);
                    }
                }
            }
            None if choice_only => {}
            None => {
                for s in &mut out {
                    s.push(c);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::utils::seed::rng;

    #[test]
    fn codes_follow_the_pattern() {
        let out = sample_pattern("UUdd-l", &default_choices(), false, 50, &mut rng(3)).unwrap();
        assert_eq!(out.len(), 50);
        for s in out {
            let chars = s.chars().collect::<Vec<_>>();
            assert_eq!(chars.len(), 6);
            assert!(chars[0].is_ascii_uppercase() && chars[1].is_ascii_uppercase());
            assert!(chars[2].is_ascii_digit() && chars[3].is_ascii_digit());
            assert_eq!(chars[4], '-');
            assert!(chars[5].is_ascii_lowercase());
        }
    }

    #[rstest]
    #[case(false, "x1y")]
    #[case(true, "1")]
    fn unknown_characters(#[case] choice_only: bool, #[case] expected: &str) {
        let choices = Choices::from([('n', vec!["1".to_string()])]);
        let out = sample_pattern("xny", &choices, choice_only, 3, &mut rng(0)).unwrap();
        assert_eq!(out, vec![expected; 3]);
    }

    #[test]
    fn multi_character_options() {
        let choices = Choices::from([('w', vec!["ab".to_string(), "cd".to_string()])]);
        let out = sample_pattern("ww", &choices, false, 20, &mut rng(9)).unwrap();
        for s in out {
            assert_eq!(s.len(), 4);
            assert!(["abab", "abcd", "cdab", "cdcd"].contains(&s.as_str()));
        }
    }

    #[test]
    fn same_seed_same_strings() {
        let a = sample_pattern("cccc", &default_choices(), false, 10, &mut rng(5)).unwrap();
        let b = sample_pattern("cccc", &default_choices(), false, 10, &mut rng(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_options_are_rejected() {
        let choices = Choices::from([('z', Vec::new())]);
        let e = sample_pattern("z", &choices, false, 1, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));

        let e = sample_pattern("z", &default_choices(), false, 0, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidSize));
    }
}
