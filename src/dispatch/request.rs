//! Line parsing and argument conversion.

/// One parsed protocol line.
///
/// Keywords are case-insensitive, so the whole line is upper-cased before
/// splitting. `A:RANGE 2.5` parses to subject `A`, command `RANGE`, one
/// argument; `TRIG:EDGE:DIR RISING` to subject `TRIG`, command `EDGE:DIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Text before the first `:` of the head token, if any
    pub subject: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    /// Command was suffixed with `?`
    pub is_query: bool,
}

impl Request {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim().to_ascii_uppercase();
        let mut tokens = line.splitn(2, char::is_whitespace);
        let head = tokens.next().filter(|h| !h.is_empty())?;
        let args = tokens
            .next()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        let (subject, command) = match head.split_once(':') {
            Some((subject, command)) => (Some(subject.to_string()), command),
            None => (None, head),
        };
        let (command, is_query) = match command.strip_suffix('?') {
            Some(stripped) => (stripped, true),
            None => (command, false),
        };
        if command.is_empty() {
            return None;
        }

        Some(Self {
            subject,
            command: command.to_string(),
            args,
            is_query,
        })
    }

    /// Single argument, if exactly one was given.
    pub fn single_arg(&self) -> Option<&str> {
        match self.args.as_slice() {
            [arg] => Some(arg.as_str()),
            _ => None,
        }
    }

    /// No arguments were given.
    pub fn no_args(&self) -> bool {
        self.args.is_empty()
    }
}

/// Parse a finite decimal number.
pub fn number(arg: &str) -> Option<f64> {
    arg.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a non-negative integer, also accepting float notation (`1e9`).
pub fn unsigned(arg: &str) -> Option<u64> {
    if let Ok(value) = arg.parse::<u64>() {
        return Some(value);
    }
    number(arg)
        .filter(|v| *v >= 0.0 && *v <= u64::MAX as f64)
        .map(|v| v.round() as u64)
}

/// Parse a signed integer, also accepting float notation.
pub fn signed(arg: &str) -> Option<i64> {
    if let Ok(value) = arg.parse::<i64>() {
        return Some(value);
    }
    number(arg)
        .filter(|v| v.abs() <= i64::MAX as f64)
        .map(|v| v.round() as i64)
}
