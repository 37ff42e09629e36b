use std::fmt::Display;
use std::path::PathBuf;

pub trait ErrorType: Display + PartialEq + std::fmt::Debug {}

// A place in a grammar file. Line 0 means the file as a whole
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Location {
            file: file.into(),
            line,
        }
    }

    pub fn file(file: impl Into<PathBuf>) -> Self {
        Location::new(file, 0)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}", self.file.display(), self.line)
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Error<T: ErrorType> {
    pub location: Location,
    pub error: T,
}

impl<T: ErrorType> Error<T> {
    // Colored form for terminals
    pub fn highlighted(&self) -> String {
        format!("\x1b[31;49;1m[{}]\x1b[39;49;1m  {}\x1b[0m", self.location, self.error)
    }
}

impl<T: ErrorType> Display for Error<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]  {}", self.location, self.error)
    }
}

impl<T: ErrorType> std::error::Error for Error<T> {}

pub type Errors<T> = Vec<Error<T>>;
