use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a trade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Import,
    Export,
}

impl Flow {
    pub const ALL: [Flow; 2] = [Flow::Import, Flow::Export];

    /// The lowercase label used in the store (`"import"` / `"export"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Import => "import",
            Flow::Export => "export",
        }
    }

    /// Returns the opposite flow.
    pub fn opposite(&self) -> Self {
        match self {
            Flow::Import => Flow::Export,
            Flow::Export => Flow::Import,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "import" | "imports" | "importaciones" => Ok(Flow::Import),
            "export" | "exports" | "exportaciones" => Ok(Flow::Export),
            _ => Err(CoreError::InvalidInput("flow".to_string(), s.to_string())),
        }
    }
}

/// A calendar month, labelled the way the source workbooks label it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Month number in 1..=12.
    pub fn number(&self) -> u32 {
        *self as u32 + 1
    }

    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1..=12 => Some(Self::ALL[(number - 1) as usize]),
            _ => None,
        }
    }

    /// The Spanish label stored in the `month` column.
    pub fn label(&self) -> &'static str {
        match self {
            Month::January => "Enero",
            Month::February => "Febrero",
            Month::March => "Marzo",
            Month::April => "Abril",
            Month::May => "Mayo",
            Month::June => "Junio",
            Month::July => "Julio",
            Month::August => "Agosto",
            Month::September => "Septiembre",
            Month::October => "Octubre",
            Month::November => "Noviembre",
            Month::December => "Diciembre",
        }
    }

    /// Three letter English abbreviation, used in short narratives.
    pub fn short_name(&self) -> &'static str {
        match self {
            Month::January => "Jan",
            Month::February => "Feb",
            Month::March => "Mar",
            Month::April => "Apr",
            Month::May => "May",
            Month::June => "Jun",
            Month::July => "Jul",
            Month::August => "Aug",
            Month::September => "Sep",
            Month::October => "Oct",
            Month::November => "Nov",
            Month::December => "Dec",
        }
    }

    /// Matches a header cell against the month labels.
    ///
    /// Case, surrounding whitespace and accents are ignored, and the Peruvian
    /// spelling "Setiembre" is accepted for September.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = normalize_label(label);
        if normalized == "setiembre" {
            return Some(Month::September);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.label().to_lowercase() == normalized)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The `month` column of the long-format table: a calendar month or the
/// annual "Total" sentinel kept only for QA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradeMonth {
    Month(Month),
    Total,
}

impl TradeMonth {
    pub const TOTAL_LABEL: &'static str = "Total";

    pub fn label(&self) -> &'static str {
        match self {
            TradeMonth::Month(m) => m.label(),
            TradeMonth::Total => Self::TOTAL_LABEL,
        }
    }

    /// Month number, or `None` for the annual sentinel.
    pub fn number(&self) -> Option<u32> {
        match self {
            TradeMonth::Month(m) => Some(m.number()),
            TradeMonth::Total => None,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, TradeMonth::Total)
    }

    /// Sort key placing the sentinel after December.
    pub fn sort_key(&self) -> u32 {
        self.number().unwrap_or(13)
    }
}

impl fmt::Display for TradeMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TradeMonth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if normalize_label(s) == "total" {
            return Ok(TradeMonth::Total);
        }
        Month::from_label(s)
            .map(TradeMonth::Month)
            .ok_or_else(|| CoreError::InvalidInput("month".to_string(), s.to_string()))
    }
}

/// Lowercases, trims, collapses inner whitespace and strips Spanish accents.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}
