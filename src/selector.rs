use std::str::FromStr;

use crate::error::VdbError;

/// `field:value1,value2`, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub field: String,
    pub values: Vec<String>,
}

impl Selection {
    pub fn allows(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.values.iter().any(|allowed| *allowed == value)
    }
}

impl FromStr for Selection {
    type Err = VdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (field, values) = split_selector(value)?;
        Ok(Self {
            field,
            values: values.split(',').map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSelector {
    pub field: String,
    pub start: String,
    pub end: String,
}

impl FromStr for IntervalSelector {
    type Err = VdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (field, bounds) = split_selector(value)?;
        let Some((start, end)) = bounds.split_once(',') else {
            return Err(VdbError::InvalidSelector(format!(
                "interval needs start,end: {value}"
            )));
        };
        if end.contains(',') {
            return Err(VdbError::InvalidSelector(format!(
                "interval needs start,end: {value}"
            )));
        }
        Ok(Self {
            field,
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

pub fn parse_selections(raw: &[String]) -> Result<Vec<Selection>, VdbError> {
    raw.iter().map(|item| item.parse()).collect()
}

pub fn parse_intervals(raw: &[String]) -> Result<Vec<IntervalSelector>, VdbError> {
    raw.iter().map(|item| item.parse()).collect()
}

fn split_selector(value: &str) -> Result<(String, String), VdbError> {
    let lowered = value.trim().to_lowercase();
    match lowered.split_once(':') {
        Some((field, rest)) if !field.is_empty() => Ok((field.to_string(), rest.to_string())),
        _ => Err(VdbError::InvalidSelector(value.to_string())),
    }
}
