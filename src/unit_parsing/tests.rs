// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

use approx::assert_abs_diff_eq;

#[test]
fn test_parse_time_str_without_units() {
    for input in ["1", "1.0", " 1.0 "] {
        let result = parse_time(input);
        assert!(result.is_ok(), "{:?}", result.unwrap_err());
        let pair = result.unwrap();
        assert_abs_diff_eq!(pair.0, 1.0);
        assert_eq!(pair.1, None);
    }
}

#[test]
fn test_parse_time_str_with_units() {
    // Iterate over all possible units.
    for time_format in TimeFormat::iter() {
        let time_format_str: &'static str = time_format.into();
        for time_format_str in [
            time_format_str.to_lowercase(),
            time_format_str.to_uppercase(),
        ] {
            for input in [
                format!("1{time_format_str}"),
                format!("1.0{time_format_str}"),
                format!(" 1.0{time_format_str} "),
                format!(" 1.0 {time_format_str} "),
            ] {
                let result = parse_time(&input);
                assert!(result.is_ok(), "{:?}", result.unwrap_err());
                let pair = result.unwrap();
                assert_abs_diff_eq!(pair.0, 1.0);
                assert_eq!(pair.1, Some(time_format));
            }
        }
    }
}

#[test]
fn test_parse_time_str_bad() {
    assert!(matches!(
        parse_time("1.0.0s"),
        Err(UnitParseError::GotTimeUnitButCantParse(_))
    ));
    assert!(matches!(
        parse_time("10 fortnights"),
        Err(UnitParseError::Unknown { .. })
    ));
}

#[test]
fn test_parse_duration() {
    assert_abs_diff_eq!(parse_duration("30").unwrap().to_seconds(), 30.0);
    assert_abs_diff_eq!(parse_duration("500ms").unwrap().to_seconds(), 0.5);
    assert_abs_diff_eq!(parse_duration("2min").unwrap().to_seconds(), 120.0);
    assert_abs_diff_eq!(parse_duration("1.5 h").unwrap().to_seconds(), 5400.0);
    assert!(matches!(
        parse_duration("-3s"),
        Err(UnitParseError::NotPositive(_))
    ));
}

#[test]
fn test_parse_freq_str_with_units() {
    // Iterate over all possible units.
    for freq_format in FreqFormat::iter() {
        let freq_format_str: &'static str = freq_format.into();
        for input in [
            format!("20{freq_format_str}"),
            format!(" 20.0{freq_format_str} "),
            format!(" 20.0 {freq_format_str} "),
        ] {
            let result = parse_freq(&input);
            assert!(result.is_ok(), "{:?}", result.unwrap_err());
            let pair = result.unwrap();
            assert_abs_diff_eq!(pair.0, 20.0);
            assert_eq!(pair.1, Some(freq_format));
        }
    }
}

#[test]
fn test_parse_freq_hz() {
    assert_abs_diff_eq!(parse_freq_hz("70MHz").unwrap(), 70e6);
    assert_abs_diff_eq!(parse_freq_hz("8e6").unwrap(), 8e6);
    assert_abs_diff_eq!(parse_freq_hz("2.5 kHz").unwrap(), 2500.0);
    assert!(parse_freq_hz("0").is_err());
}
