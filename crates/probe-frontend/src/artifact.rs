//! Artifact format.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! magic "PRB\0" | u16 target level | u16 pool count | pool entries (u16 len + UTF-8)
//! u16 flags | u16 this | u16 super (0 = none) | u16 outer (0 = none)
//! u16 nested count | u16 nested...
//! u16 field count | fields (u16 flags, u16 name, u16 descriptor)
//! u16 method count | methods (u16 flags, u16 name, u16 descriptor, u16 max locals,
//!                             u32 code len, code, u16 line count, (u32 pc, u32 line)...)
//! ```
//!
//! Pool indices are 1-based. Nothing in the encoding depends on time or
//! on hash iteration order, so equal inputs give equal bytes.

use std::collections::{BTreeMap, HashMap};

use crate::error::{FrontendError, FrontendResult};
use crate::options::LanguageLevel;

/// Artifacts of one compilation, keyed by binary type name.
pub type ArtifactMap = BTreeMap<String, Vec<u8>>;

pub const MAGIC: &[u8; 4] = b"PRB\0";

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_DEPRECATED: u16 = 0x0100;

/// Interned UTF-8 constants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<String>,
    index: HashMap<String, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `value`, adding it if new.
    pub fn intern(&mut self, value: &str) -> FrontendResult<u16> {
        if let Some(&idx) = self.index.get(value) {
            return Ok(idx);
        }
        let idx = u16::try_from(self.entries.len() + 1)
            .map_err(|_| FrontendError::MalformedArtifact("constant pool overflow".into()))?;
        self.entries.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        Ok(idx)
    }

    pub fn get(&self, idx: u16) -> Option<&str> {
        let slot = usize::from(idx).checked_sub(1)?;
        self.entries.get(slot).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub flags: u16,
    pub name: String,
    pub descriptor: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub flags: u16,
    pub name: String,
    pub descriptor: String,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// `(pc, line)` pairs, empty without line debug info.
    pub lines: Vec<(u32, u32)>,
}

/// One decoded or to-be-encoded artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassFile {
    pub target: LanguageLevel,
    pub flags: u16,
    pub binary_name: String,
    pub superclass: Option<String>,
    pub outer: Option<String>,
    pub nested: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    /// Constants referenced from method code.
    pub pool: ConstantPool,
}

impl ClassFile {
    pub fn is_deprecated(&self) -> bool {
        self.flags & ACC_DEPRECATED != 0
    }

    /// Serialize. Header names are interned after the code constants.
    pub fn encode(&self) -> FrontendResult<Vec<u8>> {
        let mut pool = self.pool.clone();
        let this = pool.intern(&self.binary_name)?;
        let superclass = optional(&mut pool, self.superclass.as_deref())?;
        let outer = optional(&mut pool, self.outer.as_deref())?;
        let nested = self
            .nested
            .iter()
            .map(|n| pool.intern(n))
            .collect::<FrontendResult<Vec<_>>>()?;
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            fields.push((field.flags, pool.intern(&field.name)?, pool.intern(&field.descriptor)?));
        }
        let mut methods = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            methods.push((method, pool.intern(&method.name)?, pool.intern(&method.descriptor)?));
        }

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        put_u16(&mut out, self.target.code());
        put_u16(&mut out, len_u16(pool.len())?);
        for entry in &pool.entries {
            put_u16(&mut out, len_u16(entry.len())?);
            out.extend_from_slice(entry.as_bytes());
        }
        put_u16(&mut out, self.flags);
        put_u16(&mut out, this);
        put_u16(&mut out, superclass);
        put_u16(&mut out, outer);
        put_u16(&mut out, len_u16(nested.len())?);
        for idx in nested {
            put_u16(&mut out, idx);
        }
        put_u16(&mut out, len_u16(fields.len())?);
        for (flags, name, descriptor) in fields {
            put_u16(&mut out, flags);
            put_u16(&mut out, name);
            put_u16(&mut out, descriptor);
        }
        put_u16(&mut out, len_u16(methods.len())?);
        for (method, name, descriptor) in methods {
            put_u16(&mut out, method.flags);
            put_u16(&mut out, name);
            put_u16(&mut out, descriptor);
            put_u16(&mut out, method.max_locals);
            let code_len = u32::try_from(method.code.len())
                .map_err(|_| FrontendError::MalformedArtifact("method code too large".into()))?;
            out.extend_from_slice(&code_len.to_be_bytes());
            out.extend_from_slice(&method.code);
            put_u16(&mut out, len_u16(method.lines.len())?);
            for (pc, line) in &method.lines {
                out.extend_from_slice(&pc.to_be_bytes());
                out.extend_from_slice(&line.to_be_bytes());
            }
        }
        Ok(out)
    }

    /// Decode an artifact.
    pub fn parse(bytes: &[u8]) -> FrontendResult<Self> {
        let mut r = Reader { bytes, pos: 0 };
        if r.take(4)? != MAGIC {
            return Err(malformed("bad magic"));
        }
        let level = r.u16()?;
        let target = LanguageLevel::from_code(level)
            .ok_or_else(|| malformed(format!("unsupported target level {level}")))?;

        let mut pool = ConstantPool::new();
        for _ in 0..r.u16()? {
            let len = usize::from(r.u16()?);
            let text = std::str::from_utf8(r.take(len)?)
                .map_err(|_| malformed("pool entry is not UTF-8"))?;
            pool.entries.push(text.to_string());
            let idx = len_u16(pool.entries.len())?;
            pool.index.entry(text.to_string()).or_insert(idx);
        }
        let name = |idx: u16| -> FrontendResult<String> {
            pool.get(idx)
                .map(str::to_string)
                .ok_or_else(|| malformed(format!("pool index {idx} out of range")))
        };
        let optional_name = |idx: u16| -> FrontendResult<Option<String>> {
            if idx == 0 {
                Ok(None)
            } else {
                name(idx).map(Some)
            }
        };

        let flags = r.u16()?;
        let binary_name = name(r.u16()?)?;
        let superclass = optional_name(r.u16()?)?;
        let outer = optional_name(r.u16()?)?;
        let mut nested = Vec::new();
        for _ in 0..r.u16()? {
            nested.push(name(r.u16()?)?);
        }
        let mut fields = Vec::new();
        for _ in 0..r.u16()? {
            fields.push(FieldInfo {
                flags: r.u16()?,
                name: name(r.u16()?)?,
                descriptor: name(r.u16()?)?,
            });
        }
        let mut methods = Vec::new();
        for _ in 0..r.u16()? {
            let flags = r.u16()?;
            let method_name = name(r.u16()?)?;
            let descriptor = name(r.u16()?)?;
            let max_locals = r.u16()?;
            let code_len = r.u32()? as usize;
            let code = r.take(code_len)?.to_vec();
            let mut lines = Vec::new();
            for _ in 0..r.u16()? {
                lines.push((r.u32()?, r.u32()?));
            }
            methods.push(MethodInfo {
                flags,
                name: method_name,
                descriptor,
                max_locals,
                code,
                lines,
            });
        }
        if r.pos != bytes.len() {
            return Err(malformed("trailing bytes"));
        }

        Ok(Self {
            target,
            flags,
            binary_name,
            superclass,
            outer,
            nested,
            fields,
            methods,
            pool,
        })
    }
}

fn optional(pool: &mut ConstantPool, value: Option<&str>) -> FrontendResult<u16> {
    value.map_or(Ok(0), |v| pool.intern(v))
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn len_u16(len: usize) -> FrontendResult<u16> {
    u16::try_from(len).map_err(|_| malformed("table too large"))
}

fn malformed(message: impl Into<String>) -> FrontendError {
    FrontendError::MalformedArtifact(message.into())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> FrontendResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed("unexpected end of artifact"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> FrontendResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> FrontendResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
