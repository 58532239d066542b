//! Reader for the KEGG flat-file layout: records end with a `///` line, and
//! every line carries a field tag in its first twelve columns. A blank tag
//! continues the most recent tagged field, so a multi-line `ORTHOLOGY` or
//! `PATHWAY` block yields one field entry per line under the same tag.

pub const RECORD_SEPARATOR: &str = "///";
pub const TAG_WIDTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    tag: String,
    value: String,
    continuation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn parse(text: &str) -> Self {
        let mut fields = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            let (tag, value) = split_tag(line);
            let continuation = tag.is_empty();
            if !continuation {
                current = tag.to_string();
            }
            if current.is_empty() || value.is_empty() {
                continue;
            }
            fields.push(Field {
                tag: current.clone(),
                value: value.to_string(),
                continuation,
            });
        }
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every line filed under `tag`, continuations included.
    pub fn values<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.tag == tag)
            .map(|field| field.value.as_str())
    }

    /// The line that opened `tag`, ignoring continuations.
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.tag == tag && !field.continuation)
            .map(|field| field.value.as_str())
    }

    /// First token of `ENTRY`.
    pub fn entry_id(&self) -> Option<&str> {
        self.first("ENTRY")
            .and_then(|value| value.split_whitespace().next())
    }

    /// First whitespace-separated token of every line under `tag`.
    pub fn leading_tokens<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values(tag)
            .filter_map(|value| value.split_whitespace().next())
    }
}

/// Splits on the twelfth character, never inside a code point.
pub fn split_tag(line: &str) -> (&str, &str) {
    match line.char_indices().nth(TAG_WIDTH) {
        Some((idx, _)) => (line[..idx].trim(), line[idx..].trim()),
        None => (line.trim(), ""),
    }
}

/// Iterates the records of a flat file, skipping empty ones.
pub fn records(text: &str) -> impl Iterator<Item = Record> + '_ {
    RecordChunks { rest: text }
        .map(Record::parse)
        .filter(|record| !record.is_empty())
}

struct RecordChunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for RecordChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let mut offset = 0;
        for line in self.rest.split_inclusive('\n') {
            if line.trim() == RECORD_SEPARATOR {
                let chunk = &self.rest[..offset];
                self.rest = &self.rest[offset + line.len()..];
                return Some(chunk);
            }
            offset += line.len();
        }
        let chunk = self.rest;
        self.rest = "";
        Some(chunk)
    }
}
