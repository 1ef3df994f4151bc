use std::collections::HashMap;

use crate::error::{CliError, CliResult};

/// `direction ∈ {ASC, DESC, AASC, ADESC}` from the KeyPart declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
    AAsc,
    ADesc,
}

impl Direction {
    pub fn is_descending(self) -> bool {
        matches!(self, Direction::Desc | Direction::ADesc)
    }

    pub fn is_absolute(self) -> bool {
        matches!(self, Direction::AAsc | Direction::ADesc)
    }

    /// ASC<->DESC and AASC<->ADESC. Used by `--duplicate Reverse` (§4.7) to
    /// invert every resolved `KeyPart`'s direction bits before the
    /// `KeyCodec` encodes them, which is what actually flips emitted key
    /// order; negating ordinals alone only reorders ties within a
    /// duplicate group.
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
            Direction::AAsc => Direction::ADesc,
            Direction::ADesc => Direction::AAsc,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            "AASC" => Ok(Direction::AAsc),
            "ADESC" => Ok(Direction::ADesc),
            other => Err(CliError::Config(format!(
                "unknown sort direction '{}' (expected ASC, DESC, AASC or ADESC)",
                other
            ))),
        }
    }
}

/// `type ∈ {String, Byte, Int(1|2|4|8), UInt(1|2|4|8), Float, Double,
/// Date(format), CsvField}` from the KeyPart declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    String,
    Byte,
    Int(u8),
    UInt(u8),
    Float,
    Double,
    Date(String),
    CsvField,
}

impl FieldType {
    /// Natural byte width of the declared type, when it is fixed by the
    /// type itself rather than by a `--length` override (String/Byte and
    /// CsvField have no such fixed width).
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldType::Int(n) | FieldType::UInt(n) => Some(*n as usize),
            FieldType::Float => Some(4),
            FieldType::Double => Some(8),
            FieldType::Date(_) => Some(8), // encoded as epoch-millis, signed int8
            FieldType::String | FieldType::Byte | FieldType::CsvField => None,
        }
    }
}

/// One `--columnsIn` declaration: a named, typed column over either a byte
/// range (offset/length) of a fixed or delimited record, or a 1-relative
/// CSV field number. `columnName` is lowercased and must be unique within
/// the layout it belongs to.
#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub name: String,
    pub field_type: FieldType,
    pub offset: usize,
    pub length: usize,
    /// 1-relative as declared on the CLI; resolved to 0-relative internally
    /// by `ColumnLayout::csv_field_index`.
    pub csv_field_number: Option<usize>,
}

impl ColumnDef {
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        offset: usize,
        length: usize,
    ) -> CliResult<Self> {
        if let Some(n) = field_type.fixed_width() {
            if n != length && !matches!(field_type, FieldType::Date(_)) {
                return Err(CliError::Config(format!(
                    "column '{}' declares length {} but type implies {}",
                    name.into(),
                    length,
                    n
                )));
            }
        }

        if let FieldType::Int(n) | FieldType::UInt(n) = field_type {
            if !matches!(n, 1 | 2 | 4 | 8) {
                return Err(CliError::Config(format!(
                    "unsupported integer length {} for column '{}' (must be 1, 2, 4 or 8)",
                    n,
                    name.into()
                )));
            }
        }

        Ok(ColumnDef {
            name: name.into().to_ascii_lowercase(),
            field_type,
            offset,
            length,
            csv_field_number: None,
        })
    }

    pub fn csv(name: impl Into<String>, field_number: usize) -> Self {
        ColumnDef {
            name: name.into().to_ascii_lowercase(),
            field_type: FieldType::CsvField,
            offset: 0,
            length: 0,
            csv_field_number: Some(field_number),
        }
    }
}

/// The set of named column declarations a `--orderBy` clause resolves
/// against (`--columnsIn`'s output). Column names are unique within the
/// layout; re-declaring one is a `ConfigError`.
#[derive(Clone, Debug, Default)]
pub struct ColumnLayout {
    by_name: HashMap<String, ColumnDef>,
    order: Vec<String>,
}

impl ColumnLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, def: ColumnDef) -> CliResult<()> {
        if self.by_name.contains_key(&def.name) {
            return Err(CliError::Config(format!(
                "column name '{}' is declared more than once",
                def.name
            )));
        }
        self.order.push(def.name.clone());
        self.by_name.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.by_name.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A fully resolved key declaration, ready for `KeyCodec`: the ColumnDef it
/// was built from, plus its direction. KeyParts form an ordered list,
/// primary key first.
#[derive(Clone, Debug)]
pub struct KeyPart {
    pub column: ColumnDef,
    pub direction: Direction,
}

impl KeyPart {
    pub fn new(column: ColumnDef, direction: Direction) -> Self {
        KeyPart { column, direction }
    }

    /// Same column, inverted direction. See `Direction::reversed`.
    pub fn reversed(&self) -> KeyPart {
        KeyPart::new(self.column.clone(), self.direction.reversed())
    }
}

/// Invert every part's direction in place (ASC<->DESC, AASC<->ADESC),
/// preserving key-part order. Applied to the resolved `--orderBy` key
/// parts when `--duplicate Reverse` is selected.
pub fn reverse_key_parts(parts: &mut [KeyPart]) {
    for part in parts.iter_mut() {
        *part = part.reversed();
    }
}

/// Resolve an `--orderBy` clause (column name, direction) pairs against a
/// layout into an ordered `KeyPart` list. Unknown column references are a
/// `ConfigError`, reported at startup per §7's policy.
pub fn resolve_order_by(
    layout: &ColumnLayout,
    order_by: &[(String, Direction)],
) -> CliResult<Vec<KeyPart>> {
    order_by
        .iter()
        .map(|(name, direction)| {
            let column = layout.get(name).cloned().ok_or_else(|| {
                CliError::Config(format!(
                    "--orderBy references unknown column '{}' (did you declare it with --columnsIn?)",
                    name
                ))
            })?;
            Ok(KeyPart::new(column, *direction))
        })
        .collect()
}
