//! Interactive collection of the field set

use crate::error::PipelineError;
use std::io::{BufRead, Write};

/// Name that ends field entry (compared case-insensitively)
pub const SENTINEL: &str = "done";

/// Ordered name/value pairs with unique names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    entries: Vec<(String, String)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. An existing name keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Lines as they are printed on the data page
    pub fn lines(&self) -> Vec<String> {
        self.iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = FieldSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Prompt for field names and values until the sentinel name or end of input.
pub fn collect_fields<R, W>(mut input: R, mut out: W) -> Result<FieldSet, PipelineError>
where
    R: BufRead,
    W: Write,
{
    let mut fields = FieldSet::new();

    loop {
        prompt(&mut out, "Enter field name (e.g., Name, Date): ")?;
        let Some(name) = read_line(&mut input)? else {
            tracing::debug!("Input closed, ending field entry");
            break;
        };
        if name.trim().eq_ignore_ascii_case(SENTINEL) {
            break;
        }

        prompt(&mut out, &format!("Enter value for '{}': ", name))?;
        let value = read_line(&mut input)?.unwrap_or_default();
        fields.insert(name, value);
    }

    if fields.is_empty() {
        tracing::info!("No fields entered, the data page will only carry its header");
    } else {
        tracing::info!("Collected {} field(s)", fields.len());
    }
    Ok(fields)
}

fn prompt<W: Write>(out: &mut W, text: &str) -> Result<(), PipelineError> {
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| PipelineError::io("<stdout>", e))
}

/// One line without its terminator, or `None` at end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>, PipelineError> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|e| PipelineError::io("<stdin>", e))?;
    if read == 0 {
        return Ok(None);
    }

    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}
