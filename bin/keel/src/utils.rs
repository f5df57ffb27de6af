use alloy_chains::NamedChain;
use ethers::types::{Address, Bytes, U256};
use keel_pipeline::SponsorshipMode;
use keel_primitives::{constants::supported_chains::CHAINS, EntryPointVersion, UserOperationHash};
use std::{str::FromStr, time::Duration};

/// Parses address from string
pub fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s).map_err(|_| format!("String {s} is not a valid address"))
}

/// Parses U256 from a decimal or `0x`-prefixed hex string
pub fn parse_u256(s: &str) -> Result<U256, String> {
    match s.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    }
    .map_err(|_| format!("String {s} is not a valid U256"))
}

/// Parses hex encoded bytes
pub fn parse_bytes(s: &str) -> Result<Bytes, String> {
    Bytes::from_str(s).map_err(|_| format!("String {s} is not valid hex"))
}

/// Parses a duration given in milliseconds
pub fn parse_duration(duration: &str) -> Result<Duration, String> {
    let millis: u64 = duration.parse().map_err(|_| format!("{duration} must be unsigned int"))?;
    Ok(Duration::from_millis(millis))
}

/// Parses a `name:value` header
pub fn parse_header(header: &str) -> Result<(String, String), String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("Header {header} is not a valid name:value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Header {header} has an empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parses a non-negative multiplier such as `1.25`
pub fn parse_multiplier(s: &str) -> Result<f64, String> {
    let multiplier: f64 = s.parse().map_err(|_| format!("{s} is not a valid multiplier"))?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(format!("{s} is not a valid multiplier"));
    }
    Ok(multiplier)
}

/// Parses a chain id or the name of a supported chain
pub fn parse_chain(s: &str) -> Result<u64, String> {
    if let Ok(id) = s.parse::<u64>() {
        return Ok(id);
    }
    NamedChain::from_str(s)
        .ok()
        .filter(|chain| CHAINS.contains(chain))
        .map(|chain| chain as u64)
        .ok_or_else(|| format!("Chain {s} is not supported"))
}

pub fn parse_entry_point_version(s: &str) -> Result<EntryPointVersion, String> {
    EntryPointVersion::from_str(s).map_err(|_| format!("String {s} is not a valid EntryPoint version"))
}

pub fn parse_sponsorship_mode(s: &str) -> Result<SponsorshipMode, String> {
    match s {
        "two-phase" => Ok(SponsorshipMode::TwoPhase),
        "combined" => Ok(SponsorshipMode::Combined),
        "legacy" => Ok(SponsorshipMode::Legacy),
        _ => Err(format!("String {s} is not a valid sponsorship mode")),
    }
}

pub fn parse_user_operation_hash(s: &str) -> Result<UserOperationHash, String> {
    UserOperationHash::from_str(s).map_err(|_| format!("String {s} is not a valid user operation hash"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u256_decimal_and_hex() {
        assert_eq!(parse_u256("100").unwrap(), U256::from(100));
        assert_eq!(parse_u256("0x64").unwrap(), U256::from(100));
        assert!(parse_u256("0xzz").is_err());
        assert!(parse_u256("-1").is_err());
    }

    #[test]
    fn headers() {
        assert_eq!(
            parse_header("x-api-key: secret").unwrap(),
            ("x-api-key".to_string(), "secret".to_string())
        );
        assert_eq!(
            parse_header("authorization:Bearer a:b").unwrap(),
            ("authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header(":value").is_err());
    }

    #[test]
    fn multipliers() {
        assert_eq!(parse_multiplier("1.5").unwrap(), 1.5);
        assert!(parse_multiplier("-1").is_err());
        assert!(parse_multiplier("inf").is_err());
        assert!(parse_multiplier("abc").is_err());
    }

    #[test]
    fn chains() {
        assert_eq!(parse_chain("11155111").unwrap(), 11_155_111);
        assert_eq!(parse_chain("sepolia").unwrap(), 11_155_111);
        assert_eq!(parse_chain("mainnet").unwrap(), 1);
        assert!(parse_chain("goerli").is_err());
    }

    #[test]
    fn sponsorship_modes() {
        assert_eq!(parse_sponsorship_mode("combined").unwrap(), SponsorshipMode::Combined);
        assert!(parse_sponsorship_mode("eager").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("1s").is_err());
    }
}
