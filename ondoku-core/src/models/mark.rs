use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-step evaluation stamp used by `select` columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    #[serde(rename = "◎")]
    Excellent,
    #[default]
    #[serde(rename = "〇")]
    Good,
    #[serde(rename = "△")]
    NeedsWork,
}

impl Mark {
    pub const ALL: [Mark; 3] = [Mark::Excellent, Mark::Good, Mark::NeedsWork];

    pub fn symbol(&self) -> &'static str {
        match self {
            Mark::Excellent => "◎",
            Mark::Good => "〇",
            Mark::NeedsWork => "△",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Mark {
    type Err = String;

    /// Accepts the stamp itself or an ASCII alias, so marks can be typed on
    /// a plain keyboard.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "◎" | "excellent" | "great" => Ok(Mark::Excellent),
            "〇" | "○" | "good" | "ok" => Ok(Mark::Good),
            "△" | "fair" | "needs-work" => Ok(Mark::NeedsWork),
            other => Err(format!(
                "Invalid mark '{}'. Valid options: ◎ (great), 〇 (good), △ (fair)",
                other
            )),
        }
    }
}
