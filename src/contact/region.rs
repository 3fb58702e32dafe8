//! Area code (DDD) to state lookup used to fill in a missing region.

/// Return the state abbreviation served by a Brazilian area code.
///
/// Accepts two digits (`"11"`) or three with the trunk prefix (`"011"`).
pub fn region_for_area_code(area_code: &str) -> Option<&'static str> {
    let code = match area_code.len() {
        2 => area_code,
        3 => area_code.strip_prefix('0')?,
        _ => return None,
    };
    let ddd: u8 = code.parse().ok()?;

    let state = match ddd {
        11..=19 => "SP",
        21 | 22 | 24 => "RJ",
        27 | 28 => "ES",
        31..=35 | 37 | 38 => "MG",
        41..=46 => "PR",
        47..=49 => "SC",
        51 | 53..=55 => "RS",
        61 => "DF",
        62 | 64 => "GO",
        63 => "TO",
        65 | 66 => "MT",
        67 => "MS",
        68 => "AC",
        69 => "RO",
        71 | 73..=75 | 77 => "BA",
        79 => "SE",
        81 | 87 => "PE",
        82 => "AL",
        83 => "PB",
        84 => "RN",
        85 | 88 => "CE",
        86 | 89 => "PI",
        91 | 93 | 94 => "PA",
        92 | 97 => "AM",
        95 => "RR",
        96 => "AP",
        98 | 99 => "MA",
        _ => return None,
    };
    Some(state)
}
