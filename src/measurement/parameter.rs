//! Impedance parameter kinds understood by the meter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One impedance-related quantity the meter can report.
///
/// The meter addresses these by short mnemonics (`FUNC:IMP:A Z`, `FUNC:IMP:B THR`);
/// `Display` renders the mnemonic and `FromStr` accepts it case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Impedance magnitude |Z|
    Z,
    /// Admittance magnitude |Y|
    Y,
    /// Resistance
    R,
    /// Reactance
    X,
    /// Conductance
    G,
    /// Susceptance
    B,
    /// Capacitance
    C,
    /// Inductance
    L,
    /// Dissipation factor
    D,
    /// Quality factor
    Q,
    /// Phase angle in radians
    ThetaRad,
    /// Phase angle in degrees
    ThetaDeg,
    /// Equivalent series resistance
    Esr,
}

impl ParameterKind {
    /// Every kind, in the order they are listed to users.
    pub const ALL: [ParameterKind; 13] = [
        ParameterKind::Z,
        ParameterKind::Y,
        ParameterKind::R,
        ParameterKind::X,
        ParameterKind::G,
        ParameterKind::B,
        ParameterKind::C,
        ParameterKind::L,
        ParameterKind::D,
        ParameterKind::Q,
        ParameterKind::ThetaRad,
        ParameterKind::ThetaDeg,
        ParameterKind::Esr,
    ];

    /// Mnemonic sent on the wire.
    pub fn mnemonic(self) -> &'static str {
        match self {
            ParameterKind::Z => "Z",
            ParameterKind::Y => "Y",
            ParameterKind::R => "R",
            ParameterKind::X => "X",
            ParameterKind::G => "G",
            ParameterKind::B => "B",
            ParameterKind::C => "C",
            ParameterKind::L => "L",
            ParameterKind::D => "D",
            ParameterKind::Q => "Q",
            ParameterKind::ThetaRad => "THR",
            ParameterKind::ThetaDeg => "THD",
            ParameterKind::Esr => "ESR",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for ParameterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ParameterKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.mnemonic().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = ParameterKind::ALL.iter().map(|k| k.mnemonic()).collect();
                format!(
                    "Unknown parameter kind '{}'. Must be one of: {}",
                    wanted,
                    known.join(", ")
                )
            })
    }
}

/// A (major, minor) selection that configures one meter measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterPair {
    pub major: ParameterKind,
    pub minor: ParameterKind,
}

impl ParameterPair {
    pub fn new(major: ParameterKind, minor: ParameterKind) -> Self {
        Self { major, minor }
    }

    /// Label used for the minor columns, e.g. `Z-THR`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.major, self.minor)
    }
}

impl fmt::Display for ParameterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.major, self.minor)
    }
}
