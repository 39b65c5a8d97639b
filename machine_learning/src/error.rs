use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::initialization::RandErr;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// The dataset file is missing or its contents can't be turned into samples.
    DataFormat {
        line: Option<usize>,
        msg: String,
    },
    Io(io::Error),
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The loss stopped being a finite number during training.
    NonFiniteLoss {
        epoch: usize,
        loss: f32,
    },
    Init(RandErr),
    /// The persisted parameters are unreadable or don't describe a valid model.
    Storage(String),
}

impl MlErr {
    pub(crate) fn data_format<S: Into<String>>(line: Option<usize>, msg: S) -> Self {
        Self::DataFormat {
            line,
            msg: msg.into(),
        }
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::DataFormat {
                line: Some(line),
                msg,
            } => write!(f, "invalid dataset at line {line}: {msg}"),
            MlErr::DataFormat { line: None, msg } => write!(f, "invalid dataset: {msg}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::NonFiniteLoss { epoch, loss } => {
                write!(f, "the loss became non-finite ({loss}) at epoch {epoch}")
            }
            MlErr::Init(e) => write!(f, "failed to initialize parameters: {e}"),
            MlErr::Storage(msg) => write!(f, "invalid weights file: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            MlErr::Init(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RandErr> for MlErr {
    fn from(value: RandErr) -> Self {
        Self::Init(value)
    }
}

impl From<safetensors::SafeTensorError> for MlErr {
    fn from(value: safetensors::SafeTensorError) -> Self {
        Self::Storage(value.to_string())
    }
}
