//! Types and class symbols shared by analysis, generation and artifact
//! reading.

use std::collections::BTreeMap;
use std::fmt;

use crate::ast::DeclId;

/// Package holding the built-in classes.
pub const LANG_PACKAGE: &str = "probe.lang";
pub const OBJECT: &str = "probe.lang.Object";
pub const STRING: &str = "probe.lang.String";
pub const ERROR: &str = "probe.lang.Error";

/// A semantic type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Void,
    Int,
    Long,
    Boolean,
    Char,
    Null,
    /// Class by binary name.
    Class(String),
    Array(Box<Ty>),
    /// Result of an expression that failed to attribute. Compatible with
    /// everything so one error does not cascade.
    Unknown,
}

impl Ty {
    pub fn string() -> Self {
        Ty::Class(STRING.to_string())
    }

    pub fn object() -> Self {
        Ty::Class(OBJECT.to_string())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Ty::Class(_) | Ty::Array(_) | Ty::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Long | Ty::Char)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Ty::Class(name) if name == STRING)
    }

    /// Field or parameter descriptor: `I`, `J`, `Z`, `C`, `V`,
    /// `Lpkg/Outer$Inner;`, `[I`.
    pub fn descriptor(&self) -> String {
        match self {
            Ty::Void => "V".into(),
            Ty::Int => "I".into(),
            Ty::Long => "J".into(),
            Ty::Boolean => "Z".into(),
            Ty::Char => "C".into(),
            Ty::Class(name) => format!("L{};", name.replace('.', "/")),
            Ty::Array(elem) => format!("[{}", elem.descriptor()),
            Ty::Null | Ty::Unknown => format!("L{};", OBJECT.replace('.', "/")),
        }
    }

    /// Parse one type descriptor, returning the type and the rest.
    pub fn parse_descriptor(desc: &str) -> Option<(Ty, &str)> {
        let mut chars = desc.chars();
        let ty = match chars.next()? {
            'V' => Ty::Void,
            'I' => Ty::Int,
            'J' => Ty::Long,
            'Z' => Ty::Boolean,
            'C' => Ty::Char,
            'L' => {
                let end = desc.find(';')?;
                let name = desc[1..end].replace('/', ".");
                if name.is_empty() {
                    return None;
                }
                return Some((Ty::Class(name), &desc[end + 1..]));
            }
            '[' => {
                let (elem, rest) = Ty::parse_descriptor(&desc[1..])?;
                return Some((Ty::Array(Box::new(elem)), rest));
            }
            _ => return None,
        };
        Some((ty, &desc[1..]))
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => f.write_str("void"),
            Ty::Int => f.write_str("int"),
            Ty::Long => f.write_str("long"),
            Ty::Boolean => f.write_str("boolean"),
            Ty::Char => f.write_str("char"),
            Ty::Null => f.write_str("<null>"),
            Ty::Class(name) => f.write_str(&qualified_of(name)),
            Ty::Array(elem) => write!(f, "{elem}[]"),
            Ty::Unknown => f.write_str("<any>"),
        }
    }
}

/// `(IJ)V` style descriptor.
pub fn method_descriptor(params: &[Ty], ret: &Ty) -> String {
    let mut desc = String::from("(");
    for param in params {
        desc.push_str(&param.descriptor());
    }
    desc.push(')');
    desc.push_str(&ret.descriptor());
    desc
}

pub fn parse_method_descriptor(desc: &str) -> Option<(Vec<Ty>, Ty)> {
    let mut rest = desc.strip_prefix('(')?;
    let mut params = Vec::new();
    while !rest.starts_with(')') {
        let (ty, tail) = Ty::parse_descriptor(rest)?;
        params.push(ty);
        rest = tail;
    }
    let (ret, tail) = Ty::parse_descriptor(&rest[1..])?;
    tail.is_empty().then_some((params, ret))
}

/// `a.b.Outer$Inner` → `a.b.Outer.Inner`.
pub fn qualified_of(binary_name: &str) -> String {
    binary_name.replace('$', ".")
}

/// Symbol for a source-declared type, as carried by task events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSymbol {
    pub decl: DeclId,
    pub qualified_name: String,
    pub binary_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSig {
    pub name: String,
    pub ty: Ty,
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub is_static: bool,
}

impl MethodSig {
    pub fn descriptor(&self) -> String {
        method_descriptor(&self.params, &self.ret)
    }
}

/// Where a class symbol came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolOrigin {
    /// Declared in the task's unit at `unit` index.
    Source { unit: usize, decl: DeclId },
    /// Read from an artifact on the class path.
    ClassPath,
    Builtin,
}

#[derive(Clone, Debug)]
pub struct ClassSymbol {
    pub binary_name: String,
    pub package: Option<String>,
    pub simple_name: String,
    /// Binary name of the enclosing class.
    pub outer: Option<String>,
    /// Binary name of the superclass; `None` only for the root class.
    pub superclass: Option<String>,
    /// Simple name → binary name.
    pub member_types: BTreeMap<String, String>,
    pub fields: Vec<FieldSig>,
    pub methods: Vec<MethodSig>,
    pub deprecated: bool,
    pub origin: SymbolOrigin,
    /// Member signatures have been resolved.
    pub completed: bool,
}

impl ClassSymbol {
    pub fn qualified_name(&self) -> String {
        qualified_of(&self.binary_name)
    }

    pub fn is_source(&self) -> bool {
        matches!(self.origin, SymbolOrigin::Source { .. })
    }

    fn builtin(simple: &str, superclass: Option<&str>) -> Self {
        Self {
            binary_name: format!("{LANG_PACKAGE}.{simple}"),
            package: Some(LANG_PACKAGE.to_string()),
            simple_name: simple.to_string(),
            outer: None,
            superclass: superclass.map(str::to_string),
            member_types: BTreeMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            deprecated: false,
            origin: SymbolOrigin::Builtin,
            completed: true,
        }
    }
}

/// Every class known to one task, keyed by binary name.
#[derive(Debug)]
pub struct SymbolTable {
    classes: BTreeMap<String, ClassSymbol>,
}

impl SymbolTable {
    /// A table holding the built-in classes.
    pub fn with_builtins() -> Self {
        let method = |name: &str, params: Vec<Ty>, ret: Ty| MethodSig {
            name: name.to_string(),
            params,
            ret,
            is_static: false,
        };

        let mut object = ClassSymbol::builtin("Object", None);
        object.methods = vec![
            method("hashCode", vec![], Ty::Int),
            method("toString", vec![], Ty::string()),
            method("equals", vec![Ty::object()], Ty::Boolean),
        ];
        let mut string = ClassSymbol::builtin("String", Some(OBJECT));
        string.methods = vec![
            method("length", vec![], Ty::Int),
            method("isEmpty", vec![], Ty::Boolean),
            method("charAt", vec![Ty::Int], Ty::Char),
            method("concat", vec![Ty::string()], Ty::string()),
        ];
        let error = ClassSymbol::builtin("Error", Some(OBJECT));

        let mut table = Self {
            classes: BTreeMap::new(),
        };
        for class in [object, string, error] {
            table.classes.insert(class.binary_name.clone(), class);
        }
        table
    }

    pub fn get(&self, binary_name: &str) -> Option<&ClassSymbol> {
        self.classes.get(binary_name)
    }

    pub fn get_mut(&mut self, binary_name: &str) -> Option<&mut ClassSymbol> {
        self.classes.get_mut(binary_name)
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        self.classes.contains_key(binary_name)
    }

    /// Insert a class. Returns the symbol back if the name is taken.
    pub fn insert(&mut self, class: ClassSymbol) -> Result<(), ClassSymbol> {
        if self.classes.contains_key(&class.binary_name) {
            return Err(class);
        }
        self.classes.insert(class.binary_name.clone(), class);
        Ok(())
    }

    /// Built-in class by simple name (`String`, `Object`, `Error`).
    pub fn builtin(&self, simple: &str) -> Option<&ClassSymbol> {
        self.classes
            .get(&format!("{LANG_PACKAGE}.{simple}"))
            .filter(|c| c.origin == SymbolOrigin::Builtin)
    }

    /// Superclass chain starting at `binary_name` itself. Stops at the
    /// first class not present in the table and never loops.
    pub fn supertypes(&self, binary_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(binary_name.to_string());
        while let Some(name) = current {
            if chain.contains(&name) {
                break;
            }
            current = self.get(&name).and_then(|c| c.superclass.clone());
            chain.push(name);
        }
        chain
    }

    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        sup == OBJECT || self.supertypes(sub).iter().any(|name| name == sup)
    }

    /// Field lookup along the superclass chain.
    pub fn find_field(&self, owner: &str, name: &str) -> Option<(String, FieldSig)> {
        self.supertypes(owner).into_iter().find_map(|class| {
            let field = self.get(&class)?.fields.iter().find(|f| f.name == name)?.clone();
            Some((class, field))
        })
    }

    /// All methods called `name` along the superclass chain, nearest first.
    pub fn find_methods(&self, owner: &str, name: &str) -> Vec<(String, MethodSig)> {
        self.supertypes(owner)
            .into_iter()
            .flat_map(|class| {
                self.get(&class)
                    .map(|c| {
                        c.methods
                            .iter()
                            .filter(|m| m.name == name)
                            .map(|m| (class.clone(), m.clone()))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}
