//! Textual database loader.
//!
//! Two source formats share one tokenizer. Definition files declare menus,
//! record types, and device bindings:
//!
//! ```text
//! menu(menuRange) { choice(LOW, "low") choice(HIGH, "high") }
//! recordtype(ai) {
//!     field(VAL, DOUBLE) { prompt("Value") pp(TRUE) }
//!     field(EGU, STRING(16)) { prompt("Units") }
//!     field(SCAN, MENU(menuScan)) { special(SPC_SCAN) }
//! }
//! device(ai, "Soft Channel", devAiSoft)
//! ```
//!
//! Instance files populate records:
//!
//! ```text
//! record(ai, "temp:1") {
//!     field(SCAN, "Passive")
//!     field(HIGH, "80")
//! }
//! ```
//!
//! A syntax or semantic error aborts only the entity it occurs in: the
//! loader records the error, resynchronizes at the next top-level keyword,
//! and keeps going, so one bad record never hides the rest of the file. A
//! record whose body fails part-way is discarded whole, never inserted.

use ironioc_error::{IocError, Result};
use ironioc_types::{FieldType, LinkMode, Menu, Special};

use crate::database::Database;
use crate::instance::RecordInstance;
use crate::rtype::{FieldDescriptor, RecordType};

/// Outcome of one load call: entities applied plus every error seen.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub errors: Vec<IocError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// ----------------------------------------------------------------------
// Tokenizer
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("'{s}'"),
            Tok::Str(s) => format!("\"{s}\""),
            Tok::LParen => "'('".to_owned(),
            Tok::RParen => "')'".to_owned(),
            Tok::LBrace => "'{'".to_owned(),
            Tok::RBrace => "'}'".to_owned(),
            Tok::Comma => "','".to_owned(),
        }
    }
}

fn lex(src: &str) -> Result<Vec<(Tok, usize)>> {
    let mut out = Vec::new();
    let mut line = 1_usize;
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                // Comment to end of line.
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' => {
                out.push((Tok::LParen, line));
                chars.next();
            }
            ')' => {
                out.push((Tok::RParen, line));
                chars.next();
            }
            '{' => {
                out.push((Tok::LBrace, line));
                chars.next();
            }
            '}' => {
                out.push((Tok::RBrace, line));
                chars.next();
            }
            ',' => {
                out.push((Tok::Comma, line));
                chars.next();
            }
            '"' => {
                chars.next();
                let start = line;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some(other) => s.push(other),
                            None => {
                                return Err(IocError::Parse {
                                    line: start,
                                    message: "unterminated string".to_owned(),
                                })
                            }
                        },
                        Some('\n') => {
                            return Err(IocError::Parse {
                                line: start,
                                message: "string runs past end of line".to_owned(),
                            })
                        }
                        Some(other) => s.push(other),
                        None => {
                            return Err(IocError::Parse {
                                line: start,
                                message: "unterminated string".to_owned(),
                            })
                        }
                    }
                }
                out.push((Tok::Str(s), line));
            }
            _ => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "(){},\"#".contains(c) {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                out.push((Tok::Ident(s), line));
            }
        }
    }
    Ok(out)
}

struct Cursor {
    toks: Vec<(Tok, usize)>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map_or(0, |(_, l)| *l)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> IocError {
        IocError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, want: &Tok) -> Result<()> {
        match self.next() {
            Some(ref got) if got == want => Ok(()),
            Some(got) => Err(IocError::Parse {
                line: self.line(),
                message: format!("expected {}, found {}", want.describe(), got.describe()),
            }),
            None => Err(self.err(format!("expected {}, found end of input", want.describe()))),
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Tok::Ident(s)) => Ok(s),
            Some(got) => Err(IocError::Parse {
                line: self.line(),
                message: format!("expected identifier, found {}", got.describe()),
            }),
            None => Err(self.err("expected identifier, found end of input")),
        }
    }

    /// A quoted string, or a bare identifier where quoting is optional.
    fn text(&mut self) -> Result<String> {
        match self.next() {
            Some(Tok::Str(s) | Tok::Ident(s)) => Ok(s),
            Some(got) => Err(IocError::Parse {
                line: self.line(),
                message: format!("expected string, found {}", got.describe()),
            }),
            None => Err(self.err("expected string, found end of input")),
        }
    }

    /// Skip to the next top-level keyword at brace depth zero.
    fn resynchronize(&mut self) {
        let mut depth = 0_i32;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::LBrace => depth += 1,
                Tok::RBrace => depth = (depth - 1).max(0),
                Tok::Ident(word) if depth == 0 => {
                    if matches!(word.as_str(), "menu" | "recordtype" | "device" | "record") {
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}

// ----------------------------------------------------------------------
// Definitions
// ----------------------------------------------------------------------

impl Database {
    /// Load menu / recordtype / device definitions from text.
    pub fn load_definitions(&mut self, src: &str) -> Result<LoadReport> {
        let mut cur = Cursor {
            toks: lex(src)?,
            pos: 0,
        };
        let mut report = LoadReport::default();
        while cur.peek().is_some() {
            let outcome = match cur.ident() {
                Ok(kw) => match kw.as_str() {
                    "menu" => parse_menu(&mut cur).map(|m| self.add_menu(m)),
                    "recordtype" => parse_recordtype(&mut cur)
                        .and_then(|rt| self.register_record_type(rt).map(|_| ())),
                    "device" => parse_device(&mut cur)
                        .and_then(|(rt, choice, dset)| self.add_device(&rt, choice, dset)),
                    other => Err(cur.err(format!("unknown definition keyword '{other}'"))),
                },
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => report.loaded += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "definition skipped");
                    report.errors.push(err);
                    cur.resynchronize();
                }
            }
        }
        Ok(report)
    }

    /// Load record instances from text. A record with any bad field is
    /// dropped whole; later records still load.
    pub fn load_records(&mut self, src: &str) -> Result<LoadReport> {
        let mut cur = Cursor {
            toks: lex(src)?,
            pos: 0,
        };
        let mut report = LoadReport::default();
        while cur.peek().is_some() {
            let outcome = cur.ident().and_then(|kw| {
                if kw != "record" {
                    return Err(cur.err(format!("unknown instance keyword '{kw}'")));
                }
                self.parse_and_insert_record(&mut cur)
            });
            match outcome {
                Ok(()) => report.loaded += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "record skipped");
                    report.errors.push(err);
                    cur.resynchronize();
                }
            }
        }
        Ok(report)
    }

    fn parse_and_insert_record(&mut self, cur: &mut Cursor) -> Result<()> {
        cur.expect(&Tok::LParen)?;
        let rtype_name = cur.text()?;
        cur.expect(&Tok::Comma)?;
        let rec_name = cur.text()?;
        cur.expect(&Tok::RParen)?;
        cur.expect(&Tok::LBrace)?;

        let rtype = self
            .record_type(&rtype_name)
            .cloned()
            .ok_or_else(|| IocError::RecordTypeNotFound(rtype_name.clone()))?;
        if self.find_record(&rec_name).is_some() {
            return Err(IocError::DuplicateRecordName(rec_name));
        }
        // Stage the record and apply every field before it becomes
        // visible; an error leaves the directory untouched.
        let mut rec = RecordInstance::new(&rec_name, rtype);
        loop {
            match cur.peek() {
                Some(Tok::RBrace) => {
                    cur.pos += 1;
                    break;
                }
                Some(Tok::Ident(kw)) if kw == "field" => {
                    cur.pos += 1;
                    cur.expect(&Tok::LParen)?;
                    let field = cur.text()?;
                    cur.expect(&Tok::Comma)?;
                    let value = cur.text()?;
                    cur.expect(&Tok::RParen)?;
                    let handle = rec.rtype().find_field(&field).ok_or_else(|| {
                        IocError::FieldNotFound {
                            record_type: rec.rtype().name().to_owned(),
                            field: field.clone(),
                        }
                    })?;
                    self.field_from_string(&mut rec, handle, &value)?;
                }
                Some(other) => {
                    let msg = format!("expected field(...) or '}}', found {}", other.describe());
                    return Err(cur.err(msg));
                }
                None => return Err(cur.err("unterminated record body")),
            }
        }
        self.insert_record(rec)?;
        Ok(())
    }
}

fn parse_menu(cur: &mut Cursor) -> Result<Menu> {
    cur.expect(&Tok::LParen)?;
    let name = cur.ident()?;
    cur.expect(&Tok::RParen)?;
    cur.expect(&Tok::LBrace)?;
    let mut choices = Vec::new();
    loop {
        match cur.next() {
            Some(Tok::RBrace) => break,
            Some(Tok::Ident(kw)) if kw == "choice" => {
                cur.expect(&Tok::LParen)?;
                let _tag = cur.ident()?;
                cur.expect(&Tok::Comma)?;
                choices.push(cur.text()?);
                cur.expect(&Tok::RParen)?;
            }
            Some(other) => {
                return Err(cur.err(format!(
                    "expected choice(...) or '}}', found {}",
                    other.describe()
                )))
            }
            None => return Err(cur.err("unterminated menu body")),
        }
    }
    Ok(Menu::new(name, choices))
}

fn parse_recordtype(cur: &mut Cursor) -> Result<RecordType> {
    cur.expect(&Tok::LParen)?;
    let name = cur.ident()?;
    cur.expect(&Tok::RParen)?;
    cur.expect(&Tok::LBrace)?;
    let mut builder = RecordType::builder(&name);
    loop {
        match cur.next() {
            Some(Tok::RBrace) => break,
            Some(Tok::Ident(kw)) if kw == "field" => {
                builder = builder.field(parse_field_def(cur, &name)?);
            }
            Some(other) => {
                return Err(cur.err(format!(
                    "expected field(...) or '}}', found {}",
                    other.describe()
                )))
            }
            None => return Err(cur.err("unterminated recordtype body")),
        }
    }
    builder.build()
}

fn parse_field_def(cur: &mut Cursor, rtype: &str) -> Result<FieldDescriptor> {
    cur.expect(&Tok::LParen)?;
    let field = cur.ident()?;
    cur.expect(&Tok::Comma)?;
    let type_word = cur.ident()?;
    let field_type = parse_field_type(cur, rtype, &field, &type_word)?;
    cur.expect(&Tok::RParen)?;
    let mut desc = FieldDescriptor::new(&field, field_type);

    // Optional attribute block.
    if cur.peek() == Some(&Tok::LBrace) {
        cur.pos += 1;
        loop {
            match cur.next() {
                Some(Tok::RBrace) => break,
                Some(Tok::Ident(attr)) => {
                    cur.expect(&Tok::LParen)?;
                    let arg = cur.text()?;
                    cur.expect(&Tok::RParen)?;
                    desc = match attr.as_str() {
                        "prompt" => desc.prompt(arg),
                        "initial" => desc.initial_text(&arg)?,
                        "pp" => desc.process_passive(arg.eq_ignore_ascii_case("TRUE")),
                        "interest" => desc.interest(arg.parse().map_err(|_| {
                            cur.err(format!("bad interest level '{arg}'"))
                        })?),
                        "special" => desc.special(match arg.as_str() {
                            "SPC_MOD" => Special::Mod,
                            "SPC_SCAN" => Special::Scan,
                            "SPC_NOMOD" => Special::NoMod,
                            other => {
                                return Err(cur.err(format!("unknown special class '{other}'")))
                            }
                        }),
                        other => {
                            return Err(cur.err(format!("unknown field attribute '{other}'")))
                        }
                    };
                }
                Some(other) => {
                    return Err(cur.err(format!(
                        "expected attribute or '}}', found {}",
                        other.describe()
                    )))
                }
                None => return Err(cur.err("unterminated field attribute block")),
            }
        }
    }
    Ok(desc)
}

fn parse_field_type(
    cur: &mut Cursor,
    rtype: &str,
    field: &str,
    word: &str,
) -> Result<FieldType> {
    let simple = match word {
        "CHAR" => Some(FieldType::Char),
        "UCHAR" => Some(FieldType::UChar),
        "SHORT" => Some(FieldType::Short),
        "USHORT" => Some(FieldType::UShort),
        "LONG" => Some(FieldType::Long),
        "ULONG" => Some(FieldType::ULong),
        "INT64" => Some(FieldType::Int64),
        "UINT64" => Some(FieldType::UInt64),
        "FLOAT" => Some(FieldType::Float),
        "DOUBLE" => Some(FieldType::Double),
        "INLINK" => Some(FieldType::Link { mode: LinkMode::Input }),
        "OUTLINK" => Some(FieldType::Link { mode: LinkMode::Output }),
        "FWDLINK" => Some(FieldType::Link { mode: LinkMode::Forward }),
        "NOACCESS" => Some(FieldType::NoAccess),
        _ => None,
    };
    if let Some(ft) = simple {
        return Ok(ft);
    }
    // Parameterized types take one argument in parentheses.
    let arg = |cur: &mut Cursor| -> Result<String> {
        cur.expect(&Tok::LParen)?;
        let a = cur.ident()?;
        cur.expect(&Tok::RParen)?;
        Ok(a)
    };
    match word {
        "STRING" => {
            let a = arg(cur)?;
            let capacity = a
                .parse()
                .map_err(|_| cur.err(format!("bad string capacity '{a}'")))?;
            Ok(FieldType::Text { capacity })
        }
        "DOUBLE_ARRAY" => {
            let a = arg(cur)?;
            let capacity = a
                .parse()
                .map_err(|_| cur.err(format!("bad array capacity '{a}'")))?;
            Ok(FieldType::DoubleArray { capacity })
        }
        "MENU" => Ok(FieldType::Menu { menu: arg(cur)? }),
        other => Err(IocError::BadFieldDescriptor {
            record_type: rtype.to_owned(),
            field: field.to_owned(),
            reason: format!("unknown field type '{other}'"),
        }),
    }
}

fn parse_device(cur: &mut Cursor) -> Result<(String, String, String)> {
    cur.expect(&Tok::LParen)?;
    let rtype = cur.ident()?;
    cur.expect(&Tok::Comma)?;
    let choice = cur.text()?;
    cur.expect(&Tok::Comma)?;
    let dset = cur.ident()?;
    cur.expect(&Tok::RParen)?;
    Ok((rtype, choice, dset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const DEFS: &str = r#"
        # units menu
        menu(menuRange) {
            choice(LOW, "low")
            choice(HIGH, "high")
        }
        recordtype(ai) {
            field(VAL, DOUBLE) { prompt("Value") pp(TRUE) }
            field(EGU, STRING(16)) { prompt("Units") }
            field(SCAN, MENU(menuScan)) { special(SPC_SCAN) }
            field(HIGH, DOUBLE) { initial("80") }
            field(INP, INLINK)
        }
        device(ai, "Soft Channel", devAiSoft)
    "#;

    #[test]
    fn definitions_load_cleanly() {
        let mut db = Database::new();
        let report = db.load_definitions(DEFS).unwrap();
        assert!(report.is_clean(), "errors: {:?}", report.errors);
        assert_eq!(report.loaded, 3);
        let rt = db.record_type("ai").unwrap();
        assert_eq!(rt.field_count(), 5);
        let high = rt.find_field("HIGH").unwrap();
        assert_eq!(
            rt.descriptor(high.ordinal()).unwrap().default_value(),
            ironioc_types::FieldValue::Double(80.0)
        );
        assert_eq!(db.dset_name("ai", "Soft Channel"), Some("devAiSoft"));
        assert_eq!(db.menu("menuRange").unwrap().len(), 2);
    }

    #[test]
    fn records_load_and_apply_fields() {
        let mut db = Database::new();
        db.load_definitions(DEFS).unwrap();
        let report = db
            .load_records(
                r#"
                record(ai, "temp:1") {
                    field(SCAN, "Passive")
                    field(EGU, "degC")
                    field(INP, "dev:raw.VAL")
                }
                record(ai, "temp:2") {}
                "#,
            )
            .unwrap();
        assert!(report.is_clean(), "errors: {:?}", report.errors);
        assert_eq!(report.loaded, 2);
        let rec = db.find_record("temp:1").unwrap();
        let guard = rec.lock();
        let egu = guard.rtype().find_field("EGU").unwrap();
        assert_eq!(guard.text(egu.ordinal()), "degC");
    }

    #[test]
    fn bad_record_is_dropped_whole_and_rest_still_loads() {
        let mut db = Database::new();
        db.load_definitions(DEFS).unwrap();
        let report = db
            .load_records(
                r#"
                record(ai, "good:1") { field(EGU, "V") }
                record(ai, "bad:1") {
                    field(EGU, "V")
                    field(NOPE, "1")
                }
                record(ai, "good:2") { field(EGU, "A") }
                "#,
            )
            .unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(db.find_record("good:1").is_some());
        assert!(db.find_record("good:2").is_some());
        assert!(
            db.find_record("bad:1").is_none(),
            "half-built record must not be visible"
        );
    }

    #[test]
    fn bad_definition_recovers_at_next_entity() {
        let mut db = Database::new();
        let report = db
            .load_definitions(
                r#"
                recordtype(broken) {
                    field(A, NOT_A_TYPE)
                }
                recordtype(ok) {
                    field(VAL, LONG)
                }
                "#,
            )
            .unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(db.record_type("broken").is_none());
        assert!(db.record_type("ok").is_some());
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let mut db = Database::new();
        let report = db.load_definitions("recordtype(x) {\n    field(\n}").unwrap();
        assert_eq!(report.loaded, 0);
        assert!(matches!(
            report.errors.first(),
            Some(IocError::Parse { line, .. }) if *line >= 2
        ));
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFS.as_bytes()).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let mut db = Database::new();
        let report = db.load_definitions(&text).unwrap();
        assert!(report.is_clean());
    }
}
