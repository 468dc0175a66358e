//! Grouping and ordering keys of grouped operator inputs.
//!
//! Grouping terms are plain property names. Ordering terms accept:
//!
//!   name | +name | -name | name ASC | name DESC
//!
//! Keywords are case-insensitive. Example:
//!   Group::parse(&["store"], &["+date", "amount DESC"])
//!   => Group{grouping=[store], ordering=[+date, -amount]}

use crate::{Error, Result};

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascendant,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ordering {
    pub property: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Group {
    pub grouping: Vec<String>,
    pub ordering: Vec<Ordering>,
}

fn property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+$").expect("valid property pattern"))
}

fn ordering_re() -> &'static Regex {
    // Capture groups, in order of precedence:
    // 1) bare name (asc)
    // 3) +name (asc)
    // 5) -name (desc)
    // 7) name ASC
    // 9) name DESC
    const ORDER_RE: &str = r"(?i)^(?:(\w+)|(\+\s*(\w+))|(-\s*(\w+))|((\w+)\s+ASC)|((\w+)\s+DESC))$";
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ORDER_RE).expect("valid ordering pattern"))
}

impl Ordering {
    pub fn parse(term: &str) -> Result<Self> {
        let trimmed = term.trim();
        let caps = ordering_re()
            .captures(trimmed)
            .ok_or_else(|| Error::InvalidKey {
                term: term.to_string(),
                reason: "expected `name`, `+name`, `-name`, `name ASC` or `name DESC`".into(),
            })?;

        const GROUP_DIRECTIONS: [(usize, Direction); 5] = [
            (1, Direction::Ascendant),
            (3, Direction::Ascendant),
            (5, Direction::Descendant),
            (7, Direction::Ascendant),
            (9, Direction::Descendant),
        ];
        for (index, direction) in GROUP_DIRECTIONS {
            if let Some(m) = caps.get(index) {
                return Ok(Ordering {
                    property: m.as_str().to_string(),
                    direction,
                });
            }
        }

        Err(Error::InvalidKey {
            term: term.to_string(),
            reason: "missing property name".into(),
        })
    }
}

impl Group {
    pub fn parse<G, O>(grouping: &[G], ordering: &[O]) -> Result<Self>
    where
        G: AsRef<str>,
        O: AsRef<str>,
    {
        let mut group = Group::default();
        for term in grouping {
            let name = term.as_ref().trim();
            if !property_re().is_match(name) {
                return Err(Error::InvalidKey {
                    term: term.as_ref().to_string(),
                    reason: "grouping term must be a property name".into(),
                });
            }
            group.grouping.push(name.to_string());
        }
        for term in ordering {
            group.ordering.push(Ordering::parse(term.as_ref())?);
        }
        Ok(group)
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Ascendant => write!(f, "+{}", self.property),
            Direction::Descendant => write!(f, "-{}", self.property),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use itertools::Itertools;

        write!(
            f,
            "Group{{grouping=[{}], ordering=[{}]}}",
            self.grouping.iter().format(", "),
            self.ordering.iter().format(", ")
        )
    }
}
