//! Composite ordering key for stages.
//!
//! Main stages use `(main, 0)`. Sub-stage `n` of main step `m` is `(m, n)`
//! with `n >= 1`, so it always sorts after its parent and before the next
//! main step.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepKey {
    pub main: i64,
    pub sub: u32,
}

impl StepKey {
    pub const fn main(step: i64) -> Self {
        Self { main: step, sub: 0 }
    }

    /// Sub-stage key. `ordinal` starts at 1; 0 would collide with the parent.
    pub const fn sub(parent: i64, ordinal: u32) -> Self {
        Self {
            main: parent,
            sub: ordinal,
        }
    }

    pub fn is_sub(&self) -> bool {
        self.sub > 0
    }

    /// The owning main step for sub-stage keys.
    pub fn parent(&self) -> Option<i64> {
        self.is_sub().then_some(self.main)
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sub() {
            write!(f, "{}.{}", self.main, self.sub)
        } else {
            write!(f, "{}", self.main)
        }
    }
}

impl FromStr for StepKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (main, sub) = match raw.split_once('.') {
            Some((main, sub)) => (main, Some(sub)),
            None => (raw, None),
        };
        let main = main
            .parse::<i64>()
            .map_err(|_| format!("invalid step `{raw}`"))?;
        match sub {
            None => Ok(Self::main(main)),
            Some(sub) => {
                let ordinal = sub
                    .parse::<u32>()
                    .map_err(|_| format!("invalid sub-step ordinal in `{raw}`"))?;
                if ordinal == 0 {
                    return Err(format!("sub-step ordinal must be at least 1 in `{raw}`"));
                }
                Ok(Self::sub(main, ordinal))
            }
        }
    }
}

impl Serialize for StepKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepKeyVisitor;

        impl Visitor<'_> for StepKeyVisitor {
            type Value = StepKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a step such as 2 or \"2.1\"")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<StepKey, E> {
                Ok(StepKey::main(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<StepKey, E> {
                i64::try_from(value)
                    .map(StepKey::main)
                    .map_err(|_| E::custom(format!("step {value} out of range")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<StepKey, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(StepKeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_steps_sort_between_parent_and_next_main() {
        let mut keys = vec![
            StepKey::main(3),
            StepKey::sub(2, 2),
            StepKey::main(2),
            StepKey::sub(2, 10),
            StepKey::sub(2, 1),
            StepKey::main(1),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["1", "2", "2.1", "2.2", "2.10", "3"]);
    }

    #[test]
    fn parses_text_and_rejects_zero_ordinal() {
        assert_eq!("2.1".parse::<StepKey>().unwrap(), StepKey::sub(2, 1));
        assert_eq!("4".parse::<StepKey>().unwrap(), StepKey::main(4));
        assert!("2.0".parse::<StepKey>().is_err());
        assert!("two".parse::<StepKey>().is_err());
    }

    #[test]
    fn deserializes_from_integer_or_string() {
        let from_int: StepKey = serde_json::from_str("5").unwrap();
        let from_text: StepKey = serde_json::from_str("\"5.3\"").unwrap();
        assert_eq!(from_int, StepKey::main(5));
        assert_eq!(from_text.parent(), Some(5));
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"5.3\"");
    }
}
