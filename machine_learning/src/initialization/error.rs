use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::uniform::Error as UniformError;

/// Why a `RandParamGen` couldn't be built.
#[derive(Debug)]
pub enum RandErr {
    /// A layer without inputs has no initialization range.
    ZeroFanIn,
    /// The distribution rejected its parameters.
    Distribution(String),
}

impl From<UniformError> for RandErr {
    fn from(value: UniformError) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl Display for RandErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandErr::ZeroFanIn => f.write_str("a layer needs at least one input"),
            RandErr::Distribution(msg) => write!(f, "invalid distribution: {msg}"),
        }
    }
}

impl Error for RandErr {}
