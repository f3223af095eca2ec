//! Note frontmatter parsing and note type classification.
//!
//! Frontmatter is the YAML block delimited by `---` lines at the very top of a
//! markdown note. Parsing never fails with an error: the outcome is one of
//! [`ParseOutcome::Parsed`], [`ParseOutcome::NoFrontmatter`] or
//! [`ParseOutcome::Malformed`].

use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const DELIMITER: &str = "---";

/// Classification of a note by its `type` frontmatter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Permanent,
    Literature,
    Fleeting,
    Unknown,
}

impl NoteType {
    /// Parses a `type` value, ignoring case and surrounding whitespace.
    ///
    /// ```
    /// use vault_organizer::frontmatter::NoteType;
    ///
    /// assert_eq!(NoteType::from_value(" Permanent "), NoteType::Permanent);
    /// assert_eq!(NoteType::from_value("draft"), NoteType::Unknown);
    /// ```
    pub fn from_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "permanent" => NoteType::Permanent,
            "literature" => NoteType::Literature,
            "fleeting" => NoteType::Fleeting,
            _ => NoteType::Unknown,
        }
    }

    /// Directory (relative to the vault root) that notes of this type belong in.
    pub fn target_dir(&self) -> Option<&'static str> {
        match self {
            NoteType::Permanent => Some("Permanent Notes"),
            NoteType::Literature => Some("Literature Notes"),
            NoteType::Fleeting => Some("Fleeting Notes"),
            NoteType::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Permanent => "permanent",
            NoteType::Literature => "literature",
            NoteType::Fleeting => "fleeting",
            NoteType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup result for a single frontmatter key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<T> {
    Present(T),
    Missing,
    /// The key exists but holds a value of another kind.
    WrongType { found: &'static str },
}

/// Parsed frontmatter: string keys mapped to YAML values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: BTreeMap<String, Value>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a string-valued key.
    pub fn str_field(&self, key: &str) -> Field<&str> {
        match self.fields.get(key) {
            None => Field::Missing,
            Some(Value::String(s)) => Field::Present(s.as_str()),
            Some(other) => Field::WrongType {
                found: value_kind(other),
            },
        }
    }

    /// The note type declared by the `type` key.
    pub fn note_type(&self) -> NoteType {
        match self.str_field("type") {
            Field::Present(value) => NoteType::from_value(value),
            Field::Missing | Field::WrongType { .. } => NoteType::Unknown,
        }
    }

    fn from_mapping(mapping: serde_yaml_ng::Mapping) -> Self {
        let fields = mapping
            .into_iter()
            .filter_map(|(key, value)| match key {
                Value::String(key) => Some((key, value)),
                _ => None,
            })
            .collect();
        Self { fields }
    }
}

/// Outcome of parsing the leading frontmatter block of a note.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A well-formed block. `body_start` is the byte offset of the text after it.
    Parsed {
        frontmatter: Frontmatter,
        body_start: usize,
    },
    /// The note does not start with a `---` line.
    NoFrontmatter,
    /// The note starts a block that cannot be parsed.
    Malformed(String),
}

/// Parses the frontmatter block at the top of `content`.
pub fn parse_frontmatter(content: &str) -> ParseOutcome {
    let bom_len = if content.starts_with('\u{feff}') { '\u{feff}'.len_utf8() } else { 0 };
    let text = &content[bom_len..];

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return ParseOutcome::NoFrontmatter;
    };
    if first.trim_end_matches(['\r', '\n']) != DELIMITER {
        return ParseOutcome::NoFrontmatter;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    let mut block_end = None;
    for line in lines {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            block_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((yaml_end, body_start)) = block_end else {
        return ParseOutcome::Malformed("frontmatter block is never closed".to_string());
    };

    let yaml = &text[yaml_start..yaml_end];
    let body_start = bom_len + body_start;
    if yaml.trim().is_empty() {
        return ParseOutcome::Parsed {
            frontmatter: Frontmatter::default(),
            body_start,
        };
    }

    match serde_yaml_ng::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => ParseOutcome::Parsed {
            frontmatter: Frontmatter::from_mapping(mapping),
            body_start,
        },
        Ok(Value::Null) => ParseOutcome::Parsed {
            frontmatter: Frontmatter::default(),
            body_start,
        },
        Ok(other) => ParseOutcome::Malformed(format!(
            "frontmatter is a {}, expected a mapping",
            value_kind(&other)
        )),
        Err(e) => ParseOutcome::Malformed(format!("invalid YAML: {}", e)),
    }
}

/// A markdown note read from the vault.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultNote {
    pub path: PathBuf,
    /// `None` when the note has no frontmatter block.
    pub frontmatter: Option<Frontmatter>,
    pub note_type: NoteType,
    pub body: String,
}

impl VaultNote {
    /// Builds a note from already decoded content.
    ///
    /// Returns the reason as `Err` when the frontmatter block is malformed.
    pub fn from_content(path: &Path, content: &str) -> Result<Self, String> {
        let (frontmatter, body) = match parse_frontmatter(content) {
            ParseOutcome::Parsed {
                frontmatter,
                body_start,
            } => (Some(frontmatter), &content[body_start..]),
            ParseOutcome::NoFrontmatter => (None, content),
            ParseOutcome::Malformed(reason) => return Err(reason),
        };

        let note_type = frontmatter
            .as_ref()
            .map(Frontmatter::note_type)
            .unwrap_or(NoteType::Unknown);

        Ok(Self {
            path: path.to_path_buf(),
            frontmatter,
            note_type,
            body: body.to_string(),
        })
    }

    /// Explains why the note's type is unknown, for reports.
    pub fn unknown_type_reason(&self) -> String {
        let Some(frontmatter) = &self.frontmatter else {
            return "no frontmatter".to_string();
        };
        if frontmatter.is_empty() {
            return "frontmatter block is empty".to_string();
        }
        match frontmatter.str_field("type") {
            Field::Missing => "frontmatter has no `type` field".to_string(),
            Field::WrongType { found } => format!("`type` is a {}, expected a string", found),
            Field::Present(value) if value.trim().is_empty() => "`type` is empty".to_string(),
            Field::Present(value) => format!("unrecognized type `{}`", value.trim()),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        _ => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(content: &str) -> Frontmatter {
        match parse_frontmatter(content) {
            ParseOutcome::Parsed { frontmatter, .. } => frontmatter,
            other => panic!("expected parsed frontmatter, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_block() {
        let fm = parsed("---\ntype: permanent\ntags:\n  - rust\n  - zk\n---\n# Title\n");
        assert_eq!(fm.str_field("type"), Field::Present("permanent"));
        assert_eq!(fm.note_type(), NoteType::Permanent);
    }

    #[test]
    fn test_body_follows_block() {
        let note = VaultNote::from_content(Path::new("a.md"), "---\ntype: fleeting\n---\nBody text\n")
            .expect("note should parse");
        assert_eq!(note.body, "Body text\n");
        assert_eq!(note.note_type, NoteType::Fleeting);
    }

    #[test]
    fn test_crlf_line_endings() {
        let fm = parsed("---\r\ntype: Literature\r\n---\r\nbody");
        assert_eq!(fm.note_type(), NoteType::Literature);
    }

    #[test]
    fn test_no_frontmatter() {
        assert_eq!(parse_frontmatter("# Just a heading\n"), ParseOutcome::NoFrontmatter);
        assert_eq!(parse_frontmatter(""), ParseOutcome::NoFrontmatter);
        assert_eq!(
            parse_frontmatter("text\n---\ntype: permanent\n---\n"),
            ParseOutcome::NoFrontmatter
        );
    }

    #[test]
    fn test_unclosed_block_is_malformed() {
        assert!(matches!(
            parse_frontmatter("---\ntype: permanent\n# no closing line\n"),
            ParseOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_invalid_yaml_is_malformed() {
        assert!(matches!(
            parse_frontmatter("---\ntype: [permanent\n---\n"),
            ParseOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_scalar_block_is_malformed() {
        assert!(matches!(
            parse_frontmatter("---\njust a string\n---\n"),
            ParseOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_empty_block_parses_to_empty_mapping() {
        let fm = parsed("---\n---\nbody");
        assert!(fm.is_empty());
        assert_eq!(fm.note_type(), NoteType::Unknown);
    }

    #[test]
    fn test_type_is_case_insensitive_and_trimmed() {
        assert_eq!(parsed("---\ntype: '  PERMANENT '\n---\n").note_type(), NoteType::Permanent);
    }

    #[test]
    fn test_wrong_type_branch() {
        let fm = parsed("---\ntype: 42\n---\n");
        assert_eq!(fm.str_field("type"), Field::WrongType { found: "number" });
        assert_eq!(fm.note_type(), NoteType::Unknown);
        assert_eq!(fm.str_field("title"), Field::Missing);
    }

    #[test]
    fn test_unknown_type_reasons() {
        let reason = |content: &str| {
            VaultNote::from_content(Path::new("n.md"), content)
                .expect("note should parse")
                .unknown_type_reason()
        };
        assert_eq!(reason("plain"), "no frontmatter");
        assert_eq!(reason("---\n---\n"), "frontmatter block is empty");
        assert_eq!(reason("---\ntitle: x\n---\n"), "frontmatter has no `type` field");
        assert_eq!(reason("---\ntype: draft\n---\n"), "unrecognized type `draft`");
        assert_eq!(reason("---\ntype: ''\n---\n"), "`type` is empty");
        assert!(reason("---\ntype: [a]\n---\n").contains("sequence"));
    }

    #[test]
    fn test_target_dirs() {
        assert_eq!(NoteType::Permanent.target_dir(), Some("Permanent Notes"));
        assert_eq!(NoteType::Literature.target_dir(), Some("Literature Notes"));
        assert_eq!(NoteType::Fleeting.target_dir(), Some("Fleeting Notes"));
        assert_eq!(NoteType::Unknown.target_dir(), None);
    }

    #[test]
    fn test_byte_order_mark_is_skipped() {
        let content = "\u{feff}---\ntype: permanent\n---\nbody";
        let note = VaultNote::from_content(Path::new("bom.md"), content).expect("note should parse");
        assert_eq!(note.note_type, NoteType::Permanent);
        assert_eq!(note.body, "body");
    }
}
