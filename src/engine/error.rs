use crate::model::MonthId;

#[derive(Debug)]
pub enum EngineError {
    InvalidTimeZone(String),
    InvalidMonth(String),
    InvalidConfig(String),
    LimitExceeded(&'static str),
    Fetch { month: MonthId, message: String },
    Io(std::io::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidTimeZone(tz) => write!(f, "unknown IANA time zone: {tz}"),
            EngineError::InvalidMonth(msg) => write!(f, "invalid month: {msg}"),
            EngineError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Fetch { month, message } => {
                write!(f, "fetching time slots for {month} failed: {message}")
            }
            EngineError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}
