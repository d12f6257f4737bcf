//! Per-task compilation state: parsed units, the symbol table, the
//! analysis queue, and on-demand loading of types from the source and
//! class paths.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::artifact::{ClassFile, ACC_DEPRECATED, ACC_STATIC};
use crate::ast::{ClassDecl, DeclId, Span, UnitTree};
use crate::diagnostic::{Diagnostic, Log};
use crate::error::FrontendResult;
use crate::event::{TaskEvent, TaskEventKind, TaskListener};
use crate::manager::{Location, UnitManager};
use crate::options::Options;
use crate::parser::Parser;
use crate::symbols::{
    parse_method_descriptor, qualified_of, ClassSymbol, FieldSig, MethodSig, SymbolOrigin,
    SymbolTable, Ty, TypeSymbol, OBJECT,
};
use crate::unit::{CompilationUnit, UnitKind};

/// A parsed and entered unit.
pub(crate) struct SourceEntry {
    pub unit: CompilationUnit,
    pub tree: Arc<UnitTree>,
}

pub(crate) struct Session<'a> {
    pub options: Options,
    pub manager: &'a mut dyn UnitManager,
    pub listener: Option<Box<dyn TaskListener>>,
    pub log: Log<'a>,
    pub symbols: SymbolTable,
    pub sources: Vec<SourceEntry>,
    /// Top-level declarations waiting for analysis: (source index, decl).
    pub todo: VecDeque<(usize, DeclId)>,
    /// Sources that referenced a deprecated type while the lint was off.
    pub deprecated_uses: BTreeSet<String>,
    loaded: HashSet<Url>,
    missing: HashSet<String>,
}

impl<'a> Session<'a> {
    pub fn new(
        options: Options,
        manager: &'a mut dyn UnitManager,
        listener: Option<Box<dyn TaskListener>>,
        log: Log<'a>,
    ) -> Self {
        Self {
            options,
            manager,
            listener,
            log,
            symbols: SymbolTable::with_builtins(),
            sources: Vec::new(),
            todo: VecDeque::new(),
            deprecated_uses: BTreeSet::new(),
            loaded: HashSet::new(),
            missing: HashSet::new(),
        }
    }

    // ── Events and diagnostics ─────────────────────────────────────

    pub fn started(&mut self, event: &TaskEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener.started(event, &mut self.log);
        }
    }

    pub fn finished(&mut self, event: &TaskEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener.finished(event, &mut self.log);
        }
    }

    pub fn error(&mut self, source: &str, span: Span, message: impl Into<String>) {
        self.log
            .report(Diagnostic::error(message).at(source, span.line, span.col));
    }

    // ── Parse and enter ────────────────────────────────────────────

    /// Parse a unit. A syntax error is reported and yields `None`.
    pub fn parse(&mut self, unit: &CompilationUnit) -> FrontendResult<Option<Arc<UnitTree>>> {
        let mut event = TaskEvent::new(TaskEventKind::Parse, unit.name());
        self.started(&event);

        let text = unit.char_content()?;
        let tree = match Parser::parse(unit.name(), &text) {
            Ok(tree) => Some(Arc::new(tree)),
            Err(err) => {
                let span = Span::new(err.line, err.col);
                self.error(unit.name(), span, err.message);
                None
            }
        };

        if let Some(tree) = &tree {
            event = event.with_unit(Arc::clone(tree));
        }
        self.finished(&event);
        Ok(tree)
    }

    /// Record a parsed unit, create symbols for its declarations and queue
    /// its top-level types for analysis.
    pub fn enter(&mut self, unit: CompilationUnit, tree: Arc<UnitTree>) {
        let index = self.sources.len();
        self.loaded.insert(unit.uri().clone());
        let event = TaskEvent::new(TaskEventKind::Enter, unit.name()).with_unit(Arc::clone(&tree));
        self.sources.push(SourceEntry {
            unit,
            tree: Arc::clone(&tree),
        });
        self.started(&event);

        let package = tree.package_name();
        for decl in &tree.types {
            let binary = match &package {
                Some(pkg) => format!("{pkg}.{}", decl.name.name),
                None => decl.name.name.clone(),
            };
            if self.symbols.contains(&binary) {
                self.error(&tree.source_name, decl.span, format!("duplicate class: {binary}"));
                continue;
            }
            self.enter_class(index, &tree.source_name, decl, binary, package.clone(), None);
            self.todo.push_back((index, decl.id));
        }

        self.finished(&event);
    }

    fn enter_class(
        &mut self,
        unit: usize,
        source: &str,
        decl: &ClassDecl,
        binary: String,
        package: Option<String>,
        outer: Option<&str>,
    ) {
        let mut member_types = BTreeMap::new();
        for nested in decl.nested() {
            let simple = &nested.name.name;
            if member_types.contains_key(simple) || *simple == decl.name.name {
                self.error(
                    source,
                    nested.span,
                    format!("class {simple} is already defined in class {}", qualified_of(&binary)),
                );
                continue;
            }
            let nested_binary = format!("{binary}${simple}");
            member_types.insert(simple.clone(), nested_binary.clone());
            self.enter_class(unit, source, nested, nested_binary, package.clone(), Some(&binary));
        }

        let symbol = ClassSymbol {
            binary_name: binary,
            package,
            simple_name: decl.name.name.clone(),
            outer: outer.map(str::to_string),
            superclass: None,
            member_types,
            fields: Vec::new(),
            methods: Vec::new(),
            deprecated: decl.modifiers.annotation("Deprecated").is_some(),
            origin: SymbolOrigin::Source {
                unit,
                decl: decl.id,
            },
            completed: false,
        };
        if let Err(dup) = self.symbols.insert(symbol) {
            self.error(source, decl.span, format!("duplicate class: {}", dup.qualified_name()));
        }
    }

    /// Event symbol for a top-level declaration.
    pub fn type_symbol(&self, unit: usize, decl: DeclId) -> Option<TypeSymbol> {
        let tree = &self.sources.get(unit)?.tree;
        let class = tree.find_type(decl)?;
        let binary_name = match tree.package_name() {
            Some(pkg) => format!("{pkg}.{}", class.name.name),
            None => class.name.name.clone(),
        };
        Some(TypeSymbol {
            decl,
            qualified_name: qualified_of(&binary_name),
            binary_name,
        })
    }

    // ── On-demand loading ──────────────────────────────────────────

    /// Make `binary` known, loading it from the source path or the class
    /// path on first use. Sources win over artifacts.
    pub fn find_class(&mut self, binary: &str) -> FrontendResult<bool> {
        if self.symbols.contains(binary) {
            return Ok(true);
        }
        if self.missing.contains(binary) {
            return Ok(false);
        }

        let top_level = binary.split('$').next().unwrap_or(binary);
        let from_source = if top_level != binary {
            self.find_class(top_level)? && self.symbols.contains(binary)
        } else {
            self.load_source(binary)?
        };
        if from_source || self.load_artifact(binary)? {
            return Ok(true);
        }

        self.missing.insert(binary.to_string());
        Ok(false)
    }

    fn load_source(&mut self, qualified: &str) -> FrontendResult<bool> {
        let Some(unit) = self
            .manager
            .unit_for_input(Location::SourcePath, qualified, UnitKind::Source)?
        else {
            return Ok(false);
        };
        if self.loaded.contains(unit.uri()) {
            return Ok(self.symbols.contains(qualified));
        }
        debug!(type_name = qualified, unit = unit.name(), "Loading source from source path");

        let Some(tree) = self.parse(&unit)? else {
            return Ok(false);
        };
        let source = unit.name().to_string();
        self.enter(unit, tree);
        if !self.symbols.contains(qualified) {
            self.log.report(
                Diagnostic::error(format!("file does not contain class {qualified}")).at(source, 0, 0),
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn load_artifact(&mut self, binary: &str) -> FrontendResult<bool> {
        let Some(unit) = self
            .manager
            .unit_for_input(Location::ClassPath, binary, UnitKind::Artifact)?
        else {
            return Ok(false);
        };
        let bytes = unit.read_bytes()?;
        let class = match ClassFile::parse(&bytes) {
            Ok(class) => class,
            Err(err) => {
                self.log
                    .report(Diagnostic::error(format!("bad class file: {}: {err}", unit.name())));
                return Ok(false);
            }
        };
        if class.binary_name != binary {
            self.log.report(Diagnostic::error(format!(
                "bad class file: {}: class file contains wrong class: {}",
                unit.name(),
                class.binary_name
            )));
            return Ok(false);
        }
        debug!(binary_name = binary, unit = unit.name(), "Loaded class path artifact");

        let symbol = external_symbol(&class);
        Ok(self.symbols.insert(symbol).is_ok())
    }
}

/// Symbol for an artifact read from the class path.
fn external_symbol(class: &ClassFile) -> ClassSymbol {
    let binary = &class.binary_name;
    let (package, local) = match binary.rsplit_once('.') {
        Some((pkg, local)) => (Some(pkg.to_string()), local),
        None => (None, binary.as_str()),
    };
    let simple_name = local.rsplit('$').next().unwrap_or(local).to_string();

    let member_types = class
        .nested
        .iter()
        .map(|nested| {
            let simple = nested.rsplit('$').next().unwrap_or(nested);
            (simple.to_string(), nested.clone())
        })
        .collect();
    let fields = class
        .fields
        .iter()
        .filter_map(|f| {
            let (ty, rest) = Ty::parse_descriptor(&f.descriptor)?;
            rest.is_empty().then(|| FieldSig {
                name: f.name.clone(),
                ty,
                is_static: f.flags & ACC_STATIC != 0,
            })
        })
        .collect();
    let methods = class
        .methods
        .iter()
        .filter(|m| !m.name.starts_with('<'))
        .filter_map(|m| {
            let (params, ret) = parse_method_descriptor(&m.descriptor)?;
            Some(MethodSig {
                name: m.name.clone(),
                params,
                ret,
                is_static: m.flags & ACC_STATIC != 0,
            })
        })
        .collect();

    ClassSymbol {
        binary_name: binary.clone(),
        package,
        simple_name,
        outer: class.outer.clone(),
        superclass: class
            .superclass
            .clone()
            .or_else(|| (binary != OBJECT).then(|| OBJECT.to_string())),
        member_types,
        fields,
        methods,
        deprecated: class.flags & ACC_DEPRECATED != 0,
        origin: SymbolOrigin::ClassPath,
        completed: true,
    }
}
