//! Router commands: method, controller, stack address and attributes

use crate::frame::FrameError;
use std::fmt;
use std::str::FromStr;

/// Action code placed in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Set,
    Delete,
    GetList,
    GetSet,
    Cgi,
}

impl Method {
    pub fn code(self) -> u8 {
        match self {
            Method::Get => 1,
            Method::Set => 2,
            Method::Delete => 4,
            Method::GetList => 5,
            Method::GetSet => 6,
            Method::Cgi => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Method::Get),
            2 => Some(Method::Set),
            4 => Some(Method::Delete),
            5 => Some(Method::GetList),
            6 => Some(Method::GetSet),
            8 => Some(Method::Cgi),
            _ => None,
        }
    }
}

/// Six positional integers addressing an object under a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Stack(pub [u32; 6]);

impl Stack {
    pub const ZERO: Stack = Stack([0; 6]);

    /// `n,0,0,0,0,0`, the form used to address the n-th list entry
    pub fn entry(n: u32) -> Self {
        Stack([n, 0, 0, 0, 0, 0])
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{},{},{},{},{},{}", a, b, c, d, e, g)
    }
}

impl FromStr for Stack {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u32; 6];
        let mut parts = s.split(',');
        for slot in out.iter_mut() {
            *slot = parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(|| FrameError::InvalidStack(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(FrameError::InvalidStack(s.to_string()));
        }
        Ok(Stack(out))
    }
}

/// Attribute payload of a command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attributes {
    /// No attribute lines
    #[default]
    None,
    /// Pre-rendered attribute text, sent unchanged
    Raw(String),
    /// Attribute names only, one per line (what to fetch)
    Names(Vec<String>),
    /// `key=value` lines; a `None` or empty value renders as a bare `key`
    Pairs(Vec<(String, Option<String>)>),
}

/// One logical request to a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub method: Method,
    pub controller: String,
    pub stack: Stack,
    pub attributes: Attributes,
}

impl Command {
    pub fn new(method: Method, controller: impl Into<String>) -> Self {
        Self {
            method,
            controller: controller.into(),
            stack: Stack::ZERO,
            attributes: Attributes::None,
        }
    }

    pub fn with_stack(mut self, stack: Stack) -> Self {
        self.stack = stack;
        self
    }

    /// Append a `key=value` attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs_mut().push((key.into(), Some(value.to_string())));
        self
    }

    /// Append a bare `key` attribute
    pub fn with_flag(mut self, key: impl Into<String>) -> Self {
        self.pairs_mut().push((key.into(), None));
        self
    }

    /// Request the given attribute names
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Attributes::Names(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.attributes = Attributes::Raw(raw.into());
        self
    }

    fn pairs_mut(&mut self) -> &mut Vec<(String, Option<String>)> {
        if !matches!(self.attributes, Attributes::Pairs(_)) {
            self.attributes = Attributes::Pairs(Vec::new());
        }
        match &mut self.attributes {
            Attributes::Pairs(pairs) => pairs,
            _ => unreachable!("attributes were just set to pairs"),
        }
    }
}

/// Ordered sequence of commands sent in one frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch(pub Vec<Command>);

impl Batch {
    pub fn commands(&self) -> &[Command] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Command> for Batch {
    fn from(command: Command) -> Self {
        Batch(vec![command])
    }
}

impl From<Vec<Command>> for Batch {
    fn from(commands: Vec<Command>) -> Self {
        Batch(commands)
    }
}

impl<const N: usize> From<[Command; N]> for Batch {
    fn from(commands: [Command; N]) -> Self {
        Batch(commands.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_codes() {
        for method in [
            Method::Get,
            Method::Set,
            Method::Delete,
            Method::GetList,
            Method::GetSet,
            Method::Cgi,
        ] {
            assert_eq!(Method::from_code(method.code()), Some(method));
        }
        assert_eq!(Method::Cgi.code(), 8);
        assert_eq!(Method::from_code(3), None);
    }

    #[test]
    fn test_stack_display_and_parse() {
        assert_eq!(Stack::ZERO.to_string(), "0,0,0,0,0,0");
        assert_eq!(Stack::entry(3).to_string(), "3,0,0,0,0,0");
        assert_eq!("3,0,0,0,0,0".parse::<Stack>().unwrap(), Stack::entry(3));
        assert!("1,2,3".parse::<Stack>().is_err());
        assert!("1,2,3,4,5,6,7".parse::<Stack>().is_err());
        assert!("a,0,0,0,0,0".parse::<Stack>().is_err());
    }

    #[test]
    fn test_builder() {
        let command = Command::new(Method::Set, "LTE_SMS_SENDNEWMSG")
            .with_attr("index", 1)
            .with_attr("to", "+33123456789")
            .with_flag("dryRun");

        assert_eq!(command.stack, Stack::ZERO);
        assert_eq!(
            command.attributes,
            Attributes::Pairs(vec![
                ("index".to_string(), Some("1".to_string())),
                ("to".to_string(), Some("+33123456789".to_string())),
                ("dryRun".to_string(), None),
            ])
        );

        let names = Command::new(Method::GetList, "X").with_names(["index", "from"]);
        assert_eq!(
            names.attributes,
            Attributes::Names(vec!["index".to_string(), "from".to_string()])
        );
    }

    #[test]
    fn test_batch_from() {
        let one: Batch = Command::new(Method::Get, "A").into();
        assert_eq!(one.len(), 1);

        let two: Batch = [Command::new(Method::Get, "A"), Command::new(Method::Set, "B")].into();
        assert_eq!(two.commands()[1].controller, "B");
    }
}
