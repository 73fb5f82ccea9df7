//! Open-mode truth table

use test_case::test_case;
use unifs::stream::StreamMode;

/// (read, write, open existing, create new, truncate, position at end)
type Expected = (bool, bool, bool, bool, bool, bool);

#[test_case("r",  (true,  false, true,  false, false, false) ; "r")]
#[test_case("r+", (true,  true,  true,  false, false, false) ; "r plus")]
#[test_case("w",  (false, true,  true,  true,  true,  false) ; "w")]
#[test_case("w+", (true,  true,  true,  true,  true,  false) ; "w plus")]
#[test_case("a",  (false, true,  true,  true,  false, true)  ; "a")]
#[test_case("a+", (true,  true,  true,  true,  false, true)  ; "a plus")]
#[test_case("x",  (false, true,  false, true,  false, false) ; "x")]
#[test_case("x+", (true,  true,  false, true,  false, false) ; "x plus")]
fn test_predicates(base: &str, expected: Expected) {
    for suffix in ["", "b"] {
        let raw = format!("{}{}", base, suffix);
        let mode: StreamMode = raw.parse().unwrap();
        let actual = (
            mode.allows_read(),
            mode.allows_write(),
            mode.allows_existing(),
            mode.allows_new(),
            mode.implies_truncate(),
            mode.implies_position_at_end(),
        );
        assert_eq!(actual, expected, "mode {:?}", raw);
        assert_eq!(mode.is_binary(), suffix == "b", "mode {:?}", raw);
    }
}

#[test_case("rb+" ; "flag before plus")]
#[test_case("wt" ; "text flag")]
#[test_case("a+b" ; "plus before flag")]
fn test_accepted_spellings(raw: &str) {
    assert!(raw.parse::<StreamMode>().is_ok());
}

#[test_case("" ; "empty")]
#[test_case("z" ; "unknown base")]
#[test_case("r+x" ; "two bases")]
#[test_case("w++" ; "double plus")]
fn test_rejected_spellings(raw: &str) {
    assert!(raw.parse::<StreamMode>().is_err());
}
