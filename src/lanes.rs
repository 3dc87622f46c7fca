//! Parse the compact lane-selection notation operators send with a start
//! request into the tile-filter pattern `bcl-convert` understands. Valid
//! lanes are 1-8.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Runs of lane digits joined by single hyphens, e.g. "1", "13", "2-6",
    // "1-46-7". Anything else (other characters, lane 0 or 9, leading or
    // trailing or doubled hyphens, commas) is rejected.
    static ref LANE_SPEC_REGEX: Regex = Regex::new(r"^[1-8]+(-[1-8]+)*$").unwrap();
    static ref LANE_RANGE_REGEX: Regex = Regex::new(r"^([1-8])-([1-8])$").unwrap();
}

/// Translate a lane selection into a tile filter: a single lane maps to
/// `s_<d>`, several lanes to `s_[<digits>]`, and a range `a-b` (a < b) to
/// `s_[a-b]`. Chained ranges are passed through verbatim inside the brackets.
pub fn parse_lane_spec(spec: Option<&str>) -> Result<String> {
    let fail = || Error::LaneSpec {
        spec: spec.unwrap_or("<missing>").to_string(),
    };

    let spec = spec.ok_or_else(fail)?;
    if !LANE_SPEC_REGEX.is_match(spec) {
        return Err(fail());
    }

    if let Some(cap) = LANE_RANGE_REGEX.captures(spec) {
        // Two-element ranges must be ascending. Caps are single digits 1-8,
        // so a byte comparison of the capture text is enough.
        if cap[1].as_bytes()[0] >= cap[2].as_bytes()[0] {
            return Err(fail());
        }
        return Ok(format!("s_[{spec}]"));
    }

    if spec.len() == 1 {
        Ok(format!("s_{spec}"))
    } else {
        Ok(format!("s_[{spec}]"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_lane() {
        for lane in 1..=8 {
            let spec = lane.to_string();
            assert_eq!(parse_lane_spec(Some(&spec)).unwrap(), format!("s_{lane}"));
        }
    }

    #[test]
    fn test_multiple_lanes() {
        assert_eq!(parse_lane_spec(Some("13")).unwrap(), "s_[13]");
        assert_eq!(parse_lane_spec(Some("1234")).unwrap(), "s_[1234]");
    }

    #[test]
    fn test_lane_range() {
        assert_eq!(parse_lane_spec(Some("2-6")).unwrap(), "s_[2-6]");
        assert_eq!(parse_lane_spec(Some("1-8")).unwrap(), "s_[1-8]");
    }

    #[test]
    fn test_mixed_lanes_and_ranges_pass_through() {
        assert_eq!(parse_lane_spec(Some("13-5")).unwrap(), "s_[13-5]");
        assert_eq!(parse_lane_spec(Some("1-46-7")).unwrap(), "s_[1-46-7]");
    }

    #[test]
    fn test_invalid_specs() {
        for spec in [
            "abc", "1,3", "6-2", "3-3", "0", "9", "", "-13", "13-", "1--3", "1 3",
        ] {
            match parse_lane_spec(Some(spec)) {
                Err(Error::LaneSpec { spec: s }) => assert_eq!(s, spec),
                other => panic!("expected lane spec error for '{spec}', got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_spec() {
        assert!(matches!(
            parse_lane_spec(None),
            Err(Error::LaneSpec { .. })
        ));
    }
}
