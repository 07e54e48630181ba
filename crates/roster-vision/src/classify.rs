use roster_state::CellDebug;

/// Result of running one classifier on one cell
#[derive(Debug, Clone, PartialEq)]
pub enum Classification<T> {
    Found(T),
    /// Ran fine but nothing passed the acceptance threshold
    NotFound,
    Failed(String),
}

impl<T> Classification<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Classification::Found(v) => Some(v),
            Classification::NotFound | Classification::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Classification::Found(_))
    }
}

/// Classification plus whatever diagnostics the classifier gathered on the way
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub result: Classification<T>,
    pub debug: Option<CellDebug>,
}

impl<T> Outcome<T> {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            result: Classification::Failed(reason.into()),
            debug: None,
        }
    }
}
