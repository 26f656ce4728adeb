//! The byte-level opcode scanner: a lazy iterator of
//! `(opcode, decoded argument, position)` over a pickle stream, covering the
//! opcodes of protocols 0 through 5.

use num_bigint::BigInt;

use peekle_il::Scalar;

/// Opcode byte constants, named as in the format's reference implementation.
pub mod op {
    pub const MARK: u8 = b'(';
    pub const STOP: u8 = b'.';
    pub const POP: u8 = b'0';
    pub const POP_MARK: u8 = b'1';
    pub const DUP: u8 = b'2';
    pub const FLOAT: u8 = b'F';
    pub const INT: u8 = b'I';
    pub const BININT: u8 = b'J';
    pub const BININT1: u8 = b'K';
    pub const LONG: u8 = b'L';
    pub const BININT2: u8 = b'M';
    pub const NONE: u8 = b'N';
    pub const PERSID: u8 = b'P';
    pub const BINPERSID: u8 = b'Q';
    pub const REDUCE: u8 = b'R';
    pub const STRING: u8 = b'S';
    pub const BINSTRING: u8 = b'T';
    pub const SHORT_BINSTRING: u8 = b'U';
    pub const UNICODE: u8 = b'V';
    pub const BINUNICODE: u8 = b'X';
    pub const APPEND: u8 = b'a';
    pub const BUILD: u8 = b'b';
    pub const GLOBAL: u8 = b'c';
    pub const DICT: u8 = b'd';
    pub const APPENDS: u8 = b'e';
    pub const GET: u8 = b'g';
    pub const BINGET: u8 = b'h';
    pub const INST: u8 = b'i';
    pub const LONG_BINGET: u8 = b'j';
    pub const LIST: u8 = b'l';
    pub const OBJ: u8 = b'o';
    pub const PUT: u8 = b'p';
    pub const BINPUT: u8 = b'q';
    pub const LONG_BINPUT: u8 = b'r';
    pub const SETITEM: u8 = b's';
    pub const TUPLE: u8 = b't';
    pub const SETITEMS: u8 = b'u';
    pub const EMPTY_DICT: u8 = b'}';
    pub const EMPTY_LIST: u8 = b']';
    pub const EMPTY_TUPLE: u8 = b')';
    pub const BINFLOAT: u8 = b'G';
    pub const BINBYTES: u8 = b'B';
    pub const SHORT_BINBYTES: u8 = b'C';
    pub const PROTO: u8 = 0x80;
    pub const NEWOBJ: u8 = 0x81;
    pub const EXT1: u8 = 0x82;
    pub const EXT2: u8 = 0x83;
    pub const EXT4: u8 = 0x84;
    pub const TUPLE1: u8 = 0x85;
    pub const TUPLE2: u8 = 0x86;
    pub const TUPLE3: u8 = 0x87;
    pub const NEWTRUE: u8 = 0x88;
    pub const NEWFALSE: u8 = 0x89;
    pub const LONG1: u8 = 0x8a;
    pub const LONG4: u8 = 0x8b;
    pub const SHORT_BINUNICODE: u8 = 0x8c;
    pub const BINUNICODE8: u8 = 0x8d;
    pub const BINBYTES8: u8 = 0x8e;
    pub const EMPTY_SET: u8 = 0x8f;
    pub const FROZENSET: u8 = 0x90;
    pub const NEWOBJ_EX: u8 = 0x92;
    pub const STACK_GLOBAL: u8 = 0x93;
    pub const MEMOIZE: u8 = 0x94;
    pub const FRAME: u8 = 0x95;
    pub const BYTEARRAY8: u8 = 0x96;
    pub const NEXT_BUFFER: u8 = 0x97;
    pub const READONLY_BUFFER: u8 = 0x98;
}

/// How an opcode's inline argument is encoded in the stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArgKind {
    None,
    /// Newline-terminated decimal int; `00` and `01` are the protocol-0
    /// booleans
    DecimalShort,
    /// Newline-terminated decimal int with an optional trailing `L`
    DecimalLong,
    /// Newline-terminated decimal float
    FloatNl,
    /// Newline-terminated repr-quoted string with backslash escapes
    StringNl,
    /// Newline-terminated raw string
    StringNlNoEscape,
    /// Two newline-terminated raw strings, reported joined with a space
    StringNlPair,
    /// Newline-terminated string with raw-unicode-escape sequences
    UnicodeNl,
    U8,
    U16Le,
    I32Le,
    U32Le,
    U64Le,
    F64Be,
    /// Little-endian two's-complement int with a 1-byte length
    Long1,
    /// Little-endian two's-complement int with a 4-byte length
    Long4,
    /// Bytes with a 1/4/8-byte length
    Bytes1,
    Bytes4,
    Bytes8,
    /// latin-1 string with a 1-byte length
    String1,
    /// latin-1 string with a 4-byte (signed) length
    String4,
    /// utf-8 string with a 1/4/8-byte length
    Unicode1,
    Unicode4,
    Unicode8,
}

/// The mnemonic and argument encoding of an opcode byte, or `None` for bytes
/// that are not opcodes in any protocol.
pub fn opcode_info(code: u8) -> Option<(&'static str, ArgKind)> {
    Some(match code {
        op::MARK => ("MARK", ArgKind::None),
        op::STOP => ("STOP", ArgKind::None),
        op::POP => ("POP", ArgKind::None),
        op::POP_MARK => ("POP_MARK", ArgKind::None),
        op::DUP => ("DUP", ArgKind::None),
        op::FLOAT => ("FLOAT", ArgKind::FloatNl),
        op::INT => ("INT", ArgKind::DecimalShort),
        op::BININT => ("BININT", ArgKind::I32Le),
        op::BININT1 => ("BININT1", ArgKind::U8),
        op::LONG => ("LONG", ArgKind::DecimalLong),
        op::BININT2 => ("BININT2", ArgKind::U16Le),
        op::NONE => ("NONE", ArgKind::None),
        op::PERSID => ("PERSID", ArgKind::StringNlNoEscape),
        op::BINPERSID => ("BINPERSID", ArgKind::None),
        op::REDUCE => ("REDUCE", ArgKind::None),
        op::STRING => ("STRING", ArgKind::StringNl),
        op::BINSTRING => ("BINSTRING", ArgKind::String4),
        op::SHORT_BINSTRING => ("SHORT_BINSTRING", ArgKind::String1),
        op::UNICODE => ("UNICODE", ArgKind::UnicodeNl),
        op::BINUNICODE => ("BINUNICODE", ArgKind::Unicode4),
        op::APPEND => ("APPEND", ArgKind::None),
        op::BUILD => ("BUILD", ArgKind::None),
        op::GLOBAL => ("GLOBAL", ArgKind::StringNlPair),
        op::DICT => ("DICT", ArgKind::None),
        op::APPENDS => ("APPENDS", ArgKind::None),
        op::GET => ("GET", ArgKind::DecimalShort),
        op::BINGET => ("BINGET", ArgKind::U8),
        op::INST => ("INST", ArgKind::StringNlPair),
        op::LONG_BINGET => ("LONG_BINGET", ArgKind::U32Le),
        op::LIST => ("LIST", ArgKind::None),
        op::OBJ => ("OBJ", ArgKind::None),
        op::PUT => ("PUT", ArgKind::DecimalShort),
        op::BINPUT => ("BINPUT", ArgKind::U8),
        op::LONG_BINPUT => ("LONG_BINPUT", ArgKind::U32Le),
        op::SETITEM => ("SETITEM", ArgKind::None),
        op::TUPLE => ("TUPLE", ArgKind::None),
        op::SETITEMS => ("SETITEMS", ArgKind::None),
        op::EMPTY_DICT => ("EMPTY_DICT", ArgKind::None),
        op::EMPTY_LIST => ("EMPTY_LIST", ArgKind::None),
        op::EMPTY_TUPLE => ("EMPTY_TUPLE", ArgKind::None),
        op::BINFLOAT => ("BINFLOAT", ArgKind::F64Be),
        op::BINBYTES => ("BINBYTES", ArgKind::Bytes4),
        op::SHORT_BINBYTES => ("SHORT_BINBYTES", ArgKind::Bytes1),
        op::PROTO => ("PROTO", ArgKind::U8),
        op::NEWOBJ => ("NEWOBJ", ArgKind::None),
        op::EXT1 => ("EXT1", ArgKind::U8),
        op::EXT2 => ("EXT2", ArgKind::U16Le),
        op::EXT4 => ("EXT4", ArgKind::I32Le),
        op::TUPLE1 => ("TUPLE1", ArgKind::None),
        op::TUPLE2 => ("TUPLE2", ArgKind::None),
        op::TUPLE3 => ("TUPLE3", ArgKind::None),
        op::NEWTRUE => ("NEWTRUE", ArgKind::None),
        op::NEWFALSE => ("NEWFALSE", ArgKind::None),
        op::LONG1 => ("LONG1", ArgKind::Long1),
        op::LONG4 => ("LONG4", ArgKind::Long4),
        op::SHORT_BINUNICODE => ("SHORT_BINUNICODE", ArgKind::Unicode1),
        op::BINUNICODE8 => ("BINUNICODE8", ArgKind::Unicode8),
        op::BINBYTES8 => ("BINBYTES8", ArgKind::Bytes8),
        op::EMPTY_SET => ("EMPTY_SET", ArgKind::None),
        op::FROZENSET => ("FROZENSET", ArgKind::None),
        op::NEWOBJ_EX => ("NEWOBJ_EX", ArgKind::None),
        op::STACK_GLOBAL => ("STACK_GLOBAL", ArgKind::None),
        op::MEMOIZE => ("MEMOIZE", ArgKind::None),
        op::FRAME => ("FRAME", ArgKind::U64Le),
        op::BYTEARRAY8 => ("BYTEARRAY8", ArgKind::Bytes8),
        op::NEXT_BUFFER => ("NEXT_BUFFER", ArgKind::None),
        op::READONLY_BUFFER => ("READONLY_BUFFER", ArgKind::None),
        _ => return None,
    })
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("unknown opcode {code:#04x} at position {pos}")]
    UnknownOpcode { code: u8, pos: u64 },
    #[error("stream truncated while reading {what} for {name} at position {pos}")]
    Truncated {
        what: &'static str,
        name: &'static str,
        pos: u64,
    },
    #[error("malformed {what} argument for {name} at position {pos}")]
    BadArgument {
        what: &'static str,
        name: &'static str,
        pos: u64,
    },
}

/// One scanned opcode: the raw byte, its mnemonic, the decoded inline
/// argument (if the opcode carries one), and the position of the opcode byte.
#[derive(Debug, PartialEq)]
pub struct ScannedOp {
    pub code: u8,
    pub name: &'static str,
    pub arg: Option<Scalar>,
    pub pos: u64,
}

/// A lazy scanner over a pickle byte stream.
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// The current stream position.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    fn take(
        &mut self,
        n: usize,
        what: &'static str,
        name: &'static str,
        at: u64,
    ) -> Result<&'a [u8], ScanError> {
        if self.input.len() - self.pos < n {
            return Err(ScanError::Truncated { what, name, pos: at });
        }
        let bytes = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Consume up to and including the next newline, returning the line
    /// without it.
    fn line(&mut self, name: &'static str, at: u64) -> Result<&'a [u8], ScanError> {
        let rest = &self.input[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.pos += end + 1;
                Ok(&rest[..end])
            }
            None => Err(ScanError::Truncated {
                what: "line",
                name,
                pos: at,
            }),
        }
    }

    fn next_op(&mut self) -> Option<Result<ScannedOp, ScanError>> {
        if self.pos >= self.input.len() {
            return None;
        }
        let at = self.pos as u64;
        let code = self.input[self.pos];
        self.pos += 1;
        let Some((name, kind)) = opcode_info(code) else {
            return Some(Err(ScanError::UnknownOpcode { code, pos: at }));
        };
        let arg = match self.decode(kind, name, at) {
            Ok(arg) => arg,
            Err(err) => return Some(Err(err)),
        };
        Some(Ok(ScannedOp {
            code,
            name,
            arg,
            pos: at,
        }))
    }

    fn decode(
        &mut self,
        kind: ArgKind,
        name: &'static str,
        at: u64,
    ) -> Result<Option<Scalar>, ScanError> {
        let bad = |what| ScanError::BadArgument { what, name, pos: at };
        let arg = match kind {
            ArgKind::None => return Ok(None),
            ArgKind::DecimalShort => {
                let line = self.line(name, at)?;
                match line {
                    b"00" => Scalar::Bool(false),
                    b"01" => Scalar::Bool(true),
                    _ => Scalar::Int(parse_decimal(line).ok_or_else(|| bad("decimal int"))?),
                }
            }
            ArgKind::DecimalLong => {
                let mut line = self.line(name, at)?;
                if line.last() == Some(&b'L') {
                    line = &line[..line.len() - 1];
                }
                Scalar::Int(parse_decimal(line).ok_or_else(|| bad("decimal long"))?)
            }
            ArgKind::FloatNl => {
                let line = self.line(name, at)?;
                let text = std::str::from_utf8(line).map_err(|_| bad("float"))?;
                Scalar::Float(text.trim().parse().map_err(|_| bad("float"))?)
            }
            ArgKind::StringNl => {
                let line = self.line(name, at)?;
                Scalar::Str(decode_repr_string(line).ok_or_else(|| bad("quoted string"))?)
            }
            ArgKind::StringNlNoEscape => {
                let line = self.line(name, at)?;
                Scalar::Str(latin1(line))
            }
            ArgKind::StringNlPair => {
                let first = self.line(name, at)?;
                let second = self.line(name, at)?;
                let mut pair = latin1(first);
                pair.push(' ');
                pair.push_str(&latin1(second));
                Scalar::Str(pair)
            }
            ArgKind::UnicodeNl => {
                let line = self.line(name, at)?;
                Scalar::Str(decode_raw_unicode_escape(line).ok_or_else(|| bad("unicode string"))?)
            }
            ArgKind::U8 => Scalar::Int(BigInt::from(self.take(1, "u8", name, at)?[0])),
            ArgKind::U16Le => {
                let bytes = self.take(2, "u16", name, at)?;
                Scalar::Int(BigInt::from(u16::from_le_bytes([bytes[0], bytes[1]])))
            }
            ArgKind::I32Le => {
                let bytes = self.take(4, "i32", name, at)?;
                Scalar::Int(BigInt::from(i32::from_le_bytes(
                    bytes.try_into().expect("exactly four bytes"),
                )))
            }
            ArgKind::U32Le => {
                let bytes = self.take(4, "u32", name, at)?;
                Scalar::Int(BigInt::from(u32::from_le_bytes(
                    bytes.try_into().expect("exactly four bytes"),
                )))
            }
            ArgKind::U64Le => {
                let bytes = self.take(8, "u64", name, at)?;
                Scalar::Int(BigInt::from(u64::from_le_bytes(
                    bytes.try_into().expect("exactly eight bytes"),
                )))
            }
            ArgKind::F64Be => {
                let bytes = self.take(8, "f64", name, at)?;
                Scalar::Float(f64::from_be_bytes(
                    bytes.try_into().expect("exactly eight bytes"),
                ))
            }
            ArgKind::Long1 => {
                let len = self.take(1, "length", name, at)?[0] as usize;
                let bytes = self.take(len, "long payload", name, at)?;
                Scalar::Int(BigInt::from_signed_bytes_le(bytes))
            }
            ArgKind::Long4 => {
                let len = self.length4(name, at)?;
                let bytes = self.take(len, "long payload", name, at)?;
                Scalar::Int(BigInt::from_signed_bytes_le(bytes))
            }
            ArgKind::Bytes1 => {
                let len = self.take(1, "length", name, at)?[0] as usize;
                Scalar::Bytes(self.take(len, "bytes payload", name, at)?.to_vec())
            }
            ArgKind::Bytes4 => {
                let len = self.length4(name, at)?;
                Scalar::Bytes(self.take(len, "bytes payload", name, at)?.to_vec())
            }
            ArgKind::Bytes8 => {
                let len = self.length8(name, at)?;
                Scalar::Bytes(self.take(len, "bytes payload", name, at)?.to_vec())
            }
            ArgKind::String1 => {
                let len = self.take(1, "length", name, at)?[0] as usize;
                Scalar::Str(latin1(self.take(len, "string payload", name, at)?))
            }
            ArgKind::String4 => {
                let bytes = self.take(4, "length", name, at)?;
                let len = i32::from_le_bytes(bytes.try_into().expect("exactly four bytes"));
                let len = usize::try_from(len).map_err(|_| bad("negative length"))?;
                Scalar::Str(latin1(self.take(len, "string payload", name, at)?))
            }
            ArgKind::Unicode1 => {
                let len = self.take(1, "length", name, at)?[0] as usize;
                let bytes = self.take(len, "string payload", name, at)?;
                Scalar::Str(String::from_utf8(bytes.to_vec()).map_err(|_| bad("utf-8"))?)
            }
            ArgKind::Unicode4 => {
                let len = self.length4(name, at)?;
                let bytes = self.take(len, "string payload", name, at)?;
                Scalar::Str(String::from_utf8(bytes.to_vec()).map_err(|_| bad("utf-8"))?)
            }
            ArgKind::Unicode8 => {
                let len = self.length8(name, at)?;
                let bytes = self.take(len, "string payload", name, at)?;
                Scalar::Str(String::from_utf8(bytes.to_vec()).map_err(|_| bad("utf-8"))?)
            }
        };
        Ok(Some(arg))
    }

    fn length4(&mut self, name: &'static str, at: u64) -> Result<usize, ScanError> {
        let bytes = self.take(4, "length", name, at)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("exactly four bytes")) as usize)
    }

    fn length8(&mut self, name: &'static str, at: u64) -> Result<usize, ScanError> {
        let bytes = self.take(8, "length", name, at)?;
        let len = u64::from_le_bytes(bytes.try_into().expect("exactly eight bytes"));
        usize::try_from(len).map_err(|_| ScanError::BadArgument {
            what: "oversized length",
            name,
            pos: at,
        })
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<ScannedOp, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_op()
    }
}

fn parse_decimal(line: &[u8]) -> Option<BigInt> {
    if line.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(line).ok()?;
    text.parse().ok()
}

/// Decode each byte as the code point it names.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Decode a repr-quoted protocol-0 string: matching quotes around a body with
/// backslash escapes.
fn decode_repr_string(line: &[u8]) -> Option<String> {
    if line.len() < 2 {
        return None;
    }
    let quote = line[0];
    if (quote != b'\'' && quote != b'"') || line[line.len() - 1] != quote {
        return None;
    }
    let body = &line[1..line.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut bytes = body.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            if byte == quote {
                return None;
            }
            out.push(byte as char);
            continue;
        }
        match bytes.next()? {
            b'\\' => out.push('\\'),
            b'\'' => out.push('\''),
            b'"' => out.push('"'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'0' => out.push('\0'),
            b'x' => {
                let hi = bytes.next()?;
                let lo = bytes.next()?;
                let value = (hex_digit(hi)? << 4) | hex_digit(lo)?;
                out.push(value as char);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Decode a raw-unicode-escape line: only `\uXXXX` and `\UXXXXXXXX` are
/// escapes, everything else passes through byte-for-byte.
fn decode_raw_unicode_escape(line: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < line.len() {
        let byte = line[i];
        if byte == b'\\' && i + 1 < line.len() && (line[i + 1] == b'u' || line[i + 1] == b'U') {
            let digits = if line[i + 1] == b'u' { 4 } else { 8 };
            if i + 2 + digits > line.len() {
                return None;
            }
            let mut value: u32 = 0;
            for &digit in &line[i + 2..i + 2 + digits] {
                value = (value << 4) | u32::from(hex_digit(digit)?);
            }
            out.push(char::from_u32(value)?);
            i += 2 + digits;
        } else {
            out.push(byte as char);
            i += 1;
        }
    }
    Some(out)
}

fn hex_digit(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn scan_one(input: &[u8]) -> ScannedOp {
        Scanner::new(input).next().unwrap().unwrap()
    }

    #[test]
    fn scans_simple_opcodes_with_positions() {
        let mut scanner = Scanner::new(b")\x2e");
        let first = scanner.next().unwrap().unwrap();
        assert_eq!((first.name, first.pos), ("EMPTY_TUPLE", 0));
        let second = scanner.next().unwrap().unwrap();
        assert_eq!((second.name, second.pos), ("STOP", 1));
        assert!(scanner.next().is_none());
    }

    #[test]
    fn decodes_fixed_width_integers() {
        assert_eq!(scan_one(b"K\x2a").arg, Some(Scalar::from(42)));
        assert_eq!(scan_one(b"M\x39\x30").arg, Some(Scalar::from(12345)));
        assert_eq!(
            scan_one(b"J\xff\xff\xff\xff").arg,
            Some(Scalar::from(-1))
        );
    }

    #[test]
    fn decodes_decimal_lines_and_protocol_zero_booleans() {
        assert_eq!(scan_one(b"I-42\n").arg, Some(Scalar::from(-42)));
        assert_eq!(scan_one(b"I01\n").arg, Some(Scalar::from(true)));
        assert_eq!(scan_one(b"I00\n").arg, Some(Scalar::from(false)));
        assert_eq!(scan_one(b"L123L\n").arg, Some(Scalar::from(123)));
        assert_eq!(scan_one(b"F2.5\n").arg, Some(Scalar::from(2.5)));
    }

    #[test]
    fn decodes_twos_complement_longs() {
        assert_eq!(scan_one(b"\x8a\x01\xff").arg, Some(Scalar::from(-1)));
        assert_eq!(scan_one(b"\x8a\x00").arg, Some(Scalar::from(0)));
        let big = scan_one(b"\x8a\x09\x00\x00\x00\x00\x00\x00\x00\x00\x01").arg;
        assert_eq!(
            big,
            Some(Scalar::Int("18446744073709551616".parse().unwrap()))
        );
    }

    #[test]
    fn decodes_strings() {
        assert_eq!(
            scan_one(b"S'it\\'s'\n").arg,
            Some(Scalar::from("it's"))
        );
        assert_eq!(scan_one(b"U\x02hi").arg, Some(Scalar::from("hi")));
        assert_eq!(
            scan_one(b"X\x02\x00\x00\x00hi").arg,
            Some(Scalar::from("hi"))
        );
        assert_eq!(
            scan_one(b"V\\u00e9t\\u00e9\n").arg,
            Some(Scalar::from("\u{e9}t\u{e9}"))
        );
        assert_eq!(scan_one(b"\x8c\x02os").arg, Some(Scalar::from("os")));
        assert_eq!(
            scan_one(b"C\x03abc").arg,
            Some(Scalar::from(b"abc".to_vec()))
        );
    }

    #[test]
    fn global_pair_is_space_joined() {
        assert_eq!(
            scan_one(b"cos.path\njoin\n").arg,
            Some(Scalar::from("os.path join"))
        );
    }

    #[test]
    fn decodes_binfloat() {
        let scanned = scan_one(b"G\x3f\xf0\x00\x00\x00\x00\x00\x00");
        assert_eq!(scanned.arg, Some(Scalar::from(1.0)));
    }

    #[test]
    fn reports_unknown_opcodes_and_truncation() {
        assert_eq!(
            Scanner::new(b"z").next().unwrap(),
            Err(ScanError::UnknownOpcode { code: b'z', pos: 0 })
        );
        assert!(matches!(
            Scanner::new(b"K").next().unwrap(),
            Err(ScanError::Truncated { .. })
        ));
        assert!(matches!(
            Scanner::new(b"I42").next().unwrap(),
            Err(ScanError::Truncated { .. })
        ));
        assert!(matches!(
            Scanner::new(b"\x8c\x05ab").next().unwrap(),
            Err(ScanError::BadArgument { .. }) | Err(ScanError::Truncated { .. })
        ));
    }
}
