use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical data source; selects the `dataset=` segment of every destination key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Dataset {
    Winistry,
    Sparkloft,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Winistry, Dataset::Sparkloft];

    /// Path segment label, as it appears in `dataset=<label>`.
    pub fn label(self) -> &'static str {
        match self {
            Dataset::Winistry => "winistry",
            Dataset::Sparkloft => "sparkloft",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDataset(pub String);

impl fmt::Display for UnknownDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected: Vec<&str> = Dataset::ALL.iter().map(|d| d.label()).collect();
        write!(
            f,
            "unknown dataset '{}', expected one of: {}",
            self.0,
            expected.join(", ")
        )
    }
}

impl std::error::Error for UnknownDataset {}

impl FromStr for Dataset {
    type Err = UnknownDataset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Dataset::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownDataset(s.to_string()))
    }
}

impl TryFrom<String> for Dataset {
    type Error = UnknownDataset;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.label().parse::<Dataset>(), Ok(dataset));
        }
        assert_eq!("Sparkloft".parse::<Dataset>(), Ok(Dataset::Sparkloft));
    }

    #[test]
    fn unknown_label_lists_the_valid_ones() {
        let err = "facebook".parse::<Dataset>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown dataset 'facebook', expected one of: winistry, sparkloft"
        );
    }
}
