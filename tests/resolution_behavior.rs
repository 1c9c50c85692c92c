//! Identifier validation, fallback keys and normalization behavior.

use std::collections::HashSet;

use lookthru_core::normalize::{detect_format, normalize_name, parse_ticker, ticker_variants};
use lookthru_core::{is_placeholder, FallbackKey, Identifier, SecurityKey, ValidationError};

const KNOWN_VALID: &[&str] = &[
    "US0378331005", // Apple
    "US5949181045", // Microsoft
    "US02079K3059", // Alphabet Class A
    "US02079K1079", // Alphabet Class C
    "US0231351067", // Amazon
    "US88160R1014", // Tesla
    "US67066G1040", // NVIDIA
    "US30303M1027", // Meta
    "US4581401001", // Intel
    "US68389X1054", // Oracle
    "US17275R1023", // Cisco
    "US46625H1005", // JPMorgan Chase
    "US0605051046", // Bank of America
    "US5801351017", // McDonald's
    "DE0007164600", // SAP
    "DE0007236101", // Siemens
    "DE0008404005", // Allianz
    "FR0000120271", // TotalEnergies
    "FR0000121014", // LVMH
    "NL0000235190", // Airbus
    "GB0002374006", // Diageo
    "GB0005405286", // HSBC
    "CH0038863350", // Nestle
    "JP3633400001", // Toyota
    "IE00B4L5Y983", // iShares Core MSCI World
    "US78462F1030", // SPDR S&P 500
];

#[test]
fn known_valid_identifiers_parse() {
    for candidate in KNOWN_VALID {
        let parsed = Identifier::parse(candidate)
            .unwrap_or_else(|error| panic!("{candidate} should parse: {error}"));
        assert_eq!(parsed.as_str(), *candidate);
    }
}

#[test]
fn flipping_the_check_digit_invalidates_every_identifier() {
    for candidate in KNOWN_VALID {
        let (body, check) = candidate.split_at(candidate.len() - 1);
        let digit: u32 = check.parse().expect("check digit is numeric");
        let flipped = format!("{body}{}", (digit + 1) % 10);
        assert!(
            !Identifier::is_valid(&flipped),
            "{flipped} must fail the checksum"
        );
    }
}

#[test]
fn structural_rejections_are_classified() {
    assert!(matches!(
        Identifier::parse(""),
        Err(ValidationError::EmptyIdentifier)
    ));
    assert!(matches!(
        Identifier::parse("US037833100"),
        Err(ValidationError::IdentifierLength { .. })
    ));
    assert!(matches!(
        Identifier::parse("1S0378331005"),
        Err(ValidationError::IdentifierCountryCode { .. })
    ));
    assert!(matches!(
        Identifier::parse("US037833100X"),
        Err(ValidationError::IdentifierCheckDigit { .. })
    ));
    assert!(matches!(
        Identifier::parse("US0378331006"),
        Err(ValidationError::ChecksumMismatch { .. })
    ));
}

#[test]
fn placeholder_identifiers_are_rejected() {
    for placeholder in ["N/A", "NA", "NULL", "NONE", "  n/a  "] {
        assert!(is_placeholder(placeholder), "{placeholder}");
        assert!(Identifier::parse(placeholder).is_err());
    }
    assert!(is_placeholder("UNRESOLVED:MYST:0000000001"));
    assert!(is_placeholder("FALLBACK_SOMETHING"));
    assert!(!is_placeholder("US0378331005"));
}

#[test]
fn fallback_keys_are_deterministic() {
    let a = FallbackKey::derive("MYST", "Mystery Corp");
    let b = FallbackKey::derive("MYST", "Mystery Corp");
    assert_eq!(a, b);
    assert_ne!(a, FallbackKey::derive("MYST", "Mystery Corporation Two"));
    assert_ne!(a, FallbackKey::derive("MYS2", "Mystery Corp"));
}

#[test]
fn fallback_keys_have_the_documented_shape() {
    let key = FallbackKey::derive("myst", "Mystery Corp");
    let parts: Vec<&str> = key.as_str().splitn(3, ':').collect();
    assert_eq!(parts[0], "UNRESOLVED");
    assert_eq!(parts[1], "MYST");
    assert_eq!(parts[2].len(), 10);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn fallback_keys_do_not_collide_over_many_inputs() {
    let mut seen = HashSet::new();
    for index in 0..10_000 {
        let key = FallbackKey::derive(&format!("TK{index}"), &format!("Company {index}"));
        assert!(seen.insert(key.as_str().to_string()), "collision at {index}");
    }
}

#[test]
fn security_keys_order_resolved_before_reporting() {
    let resolved = SecurityKey::Resolved(Identifier::parse("US0378331005").unwrap());
    let fallback = SecurityKey::Fallback(FallbackKey::derive("MYST", "Mystery Corp"));
    assert!(resolved.is_resolved());
    assert!(!fallback.is_resolved());
    assert_eq!(resolved.as_str(), "US0378331005");
}

#[test]
fn ticker_format_classification_matches_market_conventions() {
    use lookthru_core::normalize::TickerFormat;

    assert_eq!(detect_format("NVDA US"), TickerFormat::Bloomberg);
    assert_eq!(detect_format("2330 TT"), TickerFormat::Bloomberg);
    assert_eq!(detect_format("NVDA.OQ"), TickerFormat::Reuters);
    assert_eq!(detect_format("VOD.L"), TickerFormat::Reuters);
    assert_eq!(detect_format("BRK-B"), TickerFormat::YahooDash);
    assert_eq!(detect_format("0700"), TickerFormat::Numeric);
    assert_eq!(detect_format("AAPL"), TickerFormat::Plain);
}

#[test]
fn parsing_strips_exchange_suffixes_but_keeps_share_classes() {
    assert_eq!(
        parse_ticker("NVDA US"),
        ("NVDA".to_string(), Some("US".to_string()))
    );
    assert_eq!(
        parse_ticker("VOD.L"),
        ("VOD".to_string(), Some("LSE".to_string()))
    );
    assert_eq!(parse_ticker("BRK.B"), ("BRK.B".to_string(), None));
    assert_eq!(parse_ticker("BRK-B"), ("BRK-B".to_string(), None));
}

#[test]
fn ticker_variants_start_with_the_original() {
    let variants = ticker_variants("brk/b");
    assert_eq!(variants[0], "BRK/B");
    assert!(variants.contains(&"BRKB".to_string()));
    assert!(variants.contains(&"BRK.B".to_string()));
    assert!(variants.iter().collect::<HashSet<_>>().len() == variants.len());
}

#[test]
fn name_normalization_strips_legal_suffixes() {
    assert_eq!(normalize_name("Apple Inc."), "APPLE");
    assert_eq!(normalize_name("Samsung Electronics Co Ltd"), "SAMSUNG ELECTRONICS");
    assert_eq!(normalize_name("JPMorgan Chase & Co"), "JPMORGAN CHASE & CO");
    assert_eq!(normalize_name("Alphabet Inc Class A"), "ALPHABET");
}
