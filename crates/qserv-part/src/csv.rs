//! A zero-copy-where-possible CSV reader/writer for partitioning input and
//! output. Unquoted fields without escapes borrow straight from the input
//! line; quoted or escaped fields are unescaped into an owned buffer.

use crate::error::{PartError, Result};

/// Maximum supported size of a line of text (bytes).
pub const MAX_LINE_SIZE: usize = 65536 - 24;
/// Maximum supported size of a single field (bytes).
pub const MAX_FIELD_SIZE: usize = 255;

#[derive(Debug, Clone)]
pub struct CsvConfig {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: u8,
    pub null: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        CsvConfig {
            delimiter: b',',
            quote: b'"',
            escape: b'\\',
            null: "\\N".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Field<'a> {
    Raw(&'a [u8]),
    Owned(Vec<u8>),
    Null,
}

impl<'a> Field<'a> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Field::Raw(b) => b,
            Field::Owned(v) => v,
            Field::Null => &[],
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
}

/// One parsed CSV line. `set`/`set_null` schedule an output override without
/// touching the original field, consumed by [`Record::write`].
#[derive(Debug, Clone)]
pub struct Record<'a> {
    fields: Vec<Field<'a>>,
    overrides: Vec<Option<Vec<u8>>>,
}

impl<'a> Record<'a> {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field(&self, i: usize) -> Result<&Field<'a>> {
        self.fields.get(i).ok_or(PartError::FieldIndexOutOfRange(i))
    }

    pub fn is_null(&self, i: usize) -> Result<bool> {
        Ok(self.field(i)?.is_null())
    }

    pub fn get_bytes(&self, i: usize) -> Result<&[u8]> {
        Ok(self.field(i)?.as_bytes())
    }

    pub fn get_str(&self, i: usize) -> Result<&str> {
        std::str::from_utf8(self.get_bytes(i)?)
            .map_err(|e| PartError::MalformedRecord(format!("field {i}: {e}")))
    }

    pub fn get_i64(&self, i: usize) -> Result<i64> {
        self.get_str(i)?
            .trim()
            .parse()
            .map_err(|e| PartError::MalformedRecord(format!("field {i}: {e}")))
    }

    pub fn get_f64(&self, i: usize) -> Result<f64> {
        self.get_str(i)?
            .trim()
            .parse()
            .map_err(|e| PartError::MalformedRecord(format!("field {i}: {e}")))
    }

    pub fn set(&mut self, i: usize, value: impl std::fmt::Display) -> Result<()> {
        if i >= self.fields.len() {
            return Err(PartError::FieldIndexOutOfRange(i));
        }
        self.overrides[i] = Some(value.to_string().into_bytes());
        Ok(())
    }

    pub fn set_null(&mut self, i: usize) -> Result<()> {
        if i >= self.fields.len() {
            return Err(PartError::FieldIndexOutOfRange(i));
        }
        self.fields[i] = Field::Null;
        self.overrides[i] = None;
        Ok(())
    }

    /// Write the record (applying any `set`/`set_null` overrides) as one
    /// delimiter-separated, newline-terminated line.
    pub fn write(&self, cfg: &CsvConfig, out: &mut Vec<u8>) {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(cfg.delimiter);
            }
            match &self.overrides[i] {
                Some(bytes) => write_escaped(out, bytes, cfg),
                None if field.is_null() => out.extend_from_slice(cfg.null.as_bytes()),
                None => write_escaped(out, field.as_bytes(), cfg),
            }
        }
        out.push(b'\n');
    }
}

fn write_escaped(out: &mut Vec<u8>, bytes: &[u8], cfg: &CsvConfig) {
    let needs_quoting = bytes
        .iter()
        .any(|&b| b == cfg.delimiter || b == cfg.quote || b == b'\n');
    if !needs_quoting {
        out.extend_from_slice(bytes);
        return;
    }
    out.push(cfg.quote);
    for &b in bytes {
        if b == cfg.quote || b == cfg.escape {
            out.push(cfg.escape);
        }
        out.push(b);
    }
    out.push(cfg.quote);
}

/// Parse one CSV line (without its trailing newline) into a [`Record`].
pub fn read_record<'a>(line: &'a [u8], cfg: &CsvConfig) -> Result<Record<'a>> {
    if line.len() > MAX_LINE_SIZE {
        return Err(PartError::LineTooLong {
            len: line.len(),
            max: MAX_LINE_SIZE,
        });
    }
    let mut fields = Vec::new();
    let mut i = 0usize;
    let n = line.len();
    loop {
        let (field, next) = read_field(line, i, cfg)?;
        if field.as_bytes().len() > MAX_FIELD_SIZE {
            return Err(PartError::FieldTooLong {
                field: fields.len(),
                len: field.as_bytes().len(),
                max: MAX_FIELD_SIZE,
            });
        }
        fields.push(field);
        i = next;
        if i >= n {
            break;
        }
        // next byte is the delimiter separating this field from the next.
        i += 1;
        if i == n {
            // trailing delimiter: one more, empty, field follows.
            fields.push(Field::Raw(&line[n..n]));
            break;
        }
    }
    let overrides = vec![None; fields.len()];
    Ok(Record { fields, overrides })
}

fn read_field<'a>(line: &'a [u8], start: usize, cfg: &CsvConfig) -> Result<(Field<'a>, usize)> {
    if start < line.len() && line[start] == cfg.quote {
        let mut i = start + 1;
        let mut owned: Option<Vec<u8>> = None;
        let mut raw_start = i;
        loop {
            if i >= line.len() {
                return Err(PartError::MalformedRecord("unterminated quoted field".into()));
            }
            let b = line[i];
            if b == cfg.escape && i + 1 < line.len() {
                let buf = owned.get_or_insert_with(|| line[raw_start..i].to_vec());
                buf.push(line[i + 1]);
                i += 2;
                raw_start = i;
                continue;
            }
            if b == cfg.quote {
                if let Some(buf) = &mut owned {
                    buf.extend_from_slice(&line[raw_start..i]);
                }
                let field = match owned {
                    Some(buf) => Field::Owned(buf),
                    None => Field::Raw(&line[start + 1..i]),
                };
                return Ok((field, i + 1));
            }
            i += 1;
        }
    }
    let rest = &line[start..];
    let end = rest
        .iter()
        .position(|&b| b == cfg.delimiter)
        .map(|p| start + p)
        .unwrap_or(line.len());
    let bytes = &line[start..end];
    if bytes == cfg.null.as_bytes() {
        return Ok((Field::Null, end));
    }
    Ok((Field::Raw(bytes), end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_fields() {
        let cfg = CsvConfig::default();
        let r = read_record(b"1,2.5,hello", &cfg).unwrap();
        assert_eq!(r.field_count(), 3);
        assert_eq!(r.get_i64(0).unwrap(), 1);
        assert!((r.get_f64(1).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(r.get_str(2).unwrap(), "hello");
    }

    #[test]
    fn recognizes_null_sentinel() {
        let cfg = CsvConfig::default();
        let r = read_record(b"1,\\N,3", &cfg).unwrap();
        assert!(r.is_null(1).unwrap());
    }

    #[test]
    fn quoted_field_with_embedded_delimiter() {
        let cfg = CsvConfig::default();
        let r = read_record(b"1,\"a,b\",3", &cfg).unwrap();
        assert_eq!(r.get_str(1).unwrap(), "a,b");
    }

    #[test]
    fn escaped_quote_inside_quoted_field() {
        let cfg = CsvConfig::default();
        let r = read_record(b"\"a\\\"b\"", &cfg).unwrap();
        assert_eq!(r.get_str(0).unwrap(), "a\"b");
    }

    #[test]
    fn trailing_delimiter_yields_empty_final_field() {
        let cfg = CsvConfig::default();
        let r = read_record(b"1,2,", &cfg).unwrap();
        assert_eq!(r.field_count(), 3);
        assert_eq!(r.get_str(2).unwrap(), "");
    }

    #[test]
    fn set_and_write_round_trip() {
        let cfg = CsvConfig::default();
        let mut r = read_record(b"1,2,3", &cfg).unwrap();
        r.set(1, 42).unwrap();
        r.set_null(2).unwrap();
        let mut out = Vec::new();
        r.write(&cfg, &mut out);
        assert_eq!(out, b"1,42,\\N\n");
    }

    #[test]
    fn oversized_field_is_rejected() {
        let cfg = CsvConfig::default();
        let long = "x".repeat(MAX_FIELD_SIZE + 1);
        let line = long.into_bytes();
        assert!(matches!(
            read_record(&line, &cfg),
            Err(PartError::FieldTooLong { .. })
        ));
    }
}
