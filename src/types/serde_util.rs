//! Serde helpers for identifiers the backend sends either as JSON numbers or
//! as decimal strings.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn parse<T, E>(value: NumberOrString) -> Result<T, E>
where
    T: std::str::FromStr + From<u64>,
    E: serde::de::Error,
{
    match value {
        NumberOrString::Number(n) => Ok(T::from(n)),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid integer id: {:?}", s))),
    }
}

/// `u64` from a number or a string.
pub mod u64_lenient {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse(NumberOrString::deserialize(deserializer)?)
    }
}

/// Optional `u64` from a number, a string, or null / missing.
pub mod opt_u64_lenient {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            Some(value) => parse(value).map(Some),
            None => Ok(None),
        }
    }
}

/// `u128` from a number or a string. Values above `u64::MAX` must be strings.
pub mod u128_lenient {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse(NumberOrString::deserialize(deserializer)?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Ids {
        #[serde(with = "super::u64_lenient")]
        market_id: u64,
        #[serde(with = "super::u128_lenient")]
        order_id: u128,
        #[serde(default, with = "super::opt_u64_lenient")]
        custodian_id: Option<u64>,
    }

    #[test]
    fn test_numbers_and_strings() {
        let ids: Ids =
            serde_json::from_str(r#"{"market_id": 3, "order_id": "340282366920938463463374607431768211455"}"#)
                .unwrap();
        assert_eq!(ids.market_id, 3);
        assert_eq!(ids.order_id, u128::MAX);
        assert_eq!(ids.custodian_id, None);

        let ids: Ids =
            serde_json::from_str(r#"{"market_id": "7", "order_id": 42, "custodian_id": "1"}"#).unwrap();
        assert_eq!(ids.market_id, 7);
        assert_eq!(ids.order_id, 42);
        assert_eq!(ids.custodian_id, Some(1));
    }

    #[test]
    fn test_rejects_garbage() {
        let result = serde_json::from_str::<Ids>(r#"{"market_id": "x", "order_id": 1}"#);
        assert!(result.is_err());
    }
}
