//! Syntax tree to entity arena
//!
//! One pass over the concrete syntax tree records every entity a cursor can
//! name: declarations with their computed types, statements, expressions
//! and, on request, preprocessing directives. Declarator syntax is applied
//! outside-in, so `int *f(void)` is a function returning `int *` and
//! `int (*f)(void)` a pointer to a function.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::index::{ParseOptions, SourceLanguage};
use crate::kinds::{CursorKind, StorageClass, TypeKind};
use crate::types::{ArrayExtent, CType, TagKind};
use crate::unit::{Diagnostic, Entity, EntityId, Location};

/// Output of a build, moved into the translation unit
pub(crate) struct Built {
    pub entities: Vec<Entity>,
    pub diagnostics: Vec<Diagnostic>,
    pub typedefs: HashMap<String, EntityId>,
    pub tags: HashMap<(TagKind, String), EntityId>,
    pub values: HashMap<String, Vec<EntityId>>,
}

pub(crate) fn build(
    tree: &Tree,
    source: &[u8],
    path: &Path,
    language: SourceLanguage,
    options: &ParseOptions,
) -> Built {
    let root = tree.root_node();
    let mut builder = Builder {
        source,
        language,
        options,
        entities: Vec::new(),
        typedefs: HashMap::new(),
        tags: HashMap::new(),
        values: HashMap::new(),
    };

    let unit = builder.push(
        None,
        CursorKind::TranslationUnit,
        path.display().to_string(),
        Location { line: 1, column: 1 },
        CType::invalid(),
    );
    builder.items(root, unit);

    Built {
        entities: builder.entities,
        diagnostics: collect_diagnostics(root),
        typedefs: builder.typedefs,
        tags: builder.tags,
        values: builder.values,
    }
}

// ============================================================================
// Builder
// ============================================================================

struct Builder<'a> {
    source: &'a [u8],
    language: SourceLanguage,
    options: &'a ParseOptions,
    entities: Vec<Entity>,
    typedefs: HashMap<String, EntityId>,
    tags: HashMap<(TagKind, String), EntityId>,
    values: HashMap<String, Vec<EntityId>>,
}

/// Declaration specifiers: base type, qualifiers and storage class
struct Specifiers<'t> {
    base: CType,
    storage: StorageClass,
    type_node: Option<Node<'t>>,
}

/// A resolved declarator
struct Declarator<'t> {
    name: Option<Node<'t>>,
    ty: CType,
    /// Parameter list of the innermost function declarator
    params: Option<Node<'t>>,
}

impl<'a> Builder<'a> {
    fn push(
        &mut self,
        parent: Option<EntityId>,
        kind: CursorKind,
        spelling: String,
        location: Location,
        ty: CType,
    ) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        let storage = if kind.is_declaration() {
            StorageClass::None
        } else {
            StorageClass::Invalid
        };
        self.entities.push(Entity {
            kind,
            spelling,
            parent,
            children: Vec::new(),
            location,
            ty,
            storage,
            underlying: None,
            definition: false,
        });
        if let Some(parent) = parent {
            self.entities[parent.index()].children.push(id);
        }
        id
    }

    fn push_node(
        &mut self,
        parent: EntityId,
        kind: CursorKind,
        spelling: String,
        node: Node,
        ty: CType,
    ) -> EntityId {
        self.push(Some(parent), kind, spelling, location(node), ty)
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.index()]
    }

    fn declare_value(&mut self, name: &str, id: EntityId) {
        if !name.is_empty() {
            self.values.entry(name.to_string()).or_default().push(id);
        }
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    // ========================================================================
    // Top-level items
    // ========================================================================

    fn items(&mut self, node: Node, parent: EntityId) {
        for child in children_except(node, &["condition", "name", "parameters"]) {
            self.item(child, parent);
        }
    }

    fn item(&mut self, node: Node, parent: EntityId) {
        match node.kind() {
            "function_definition" => self.function_definition(node, parent),
            "declaration" => self.declaration(node, parent),
            "field_declaration" => self.field_declaration(node, parent),
            "type_definition" => self.type_definition(node, parent),
            "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier" => {
                self.tag_declaration(node, parent);
            }
            "linkage_specification" => {
                let spec = self.push_node(
                    parent,
                    CursorKind::LinkageSpec,
                    String::new(),
                    node,
                    CType::invalid(),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    if body.kind() == "declaration_list" {
                        self.items(body, spec);
                    } else {
                        self.item(body, spec);
                    }
                }
            }
            "namespace_definition" => {
                let name = node.child_by_field_name("name");
                let spelling = name.map(|n| self.text(n)).unwrap_or_default();
                let namespace = self.push(
                    Some(parent),
                    CursorKind::Namespace,
                    spelling,
                    location(name.unwrap_or(node)),
                    CType::invalid(),
                );
                self.entity_mut(namespace).definition = true;
                if let Some(body) = node.child_by_field_name("body") {
                    self.items(body, namespace);
                }
            }
            "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
            | "preproc_elifdef" | "declaration_list" | "template_declaration" => {
                self.items(node, parent)
            }
            "preproc_include" if self.options.detailed_preprocessing_record => {
                let target = node
                    .child_by_field_name("path")
                    .map(|path| {
                        self.text(path)
                            .trim_matches(|c| matches!(c, '"' | '<' | '>'))
                            .to_string()
                    })
                    .unwrap_or_default();
                self.push_node(
                    parent,
                    CursorKind::InclusionDirective,
                    target,
                    node,
                    CType::invalid(),
                );
            }
            "preproc_def" | "preproc_function_def"
                if self.options.detailed_preprocessing_record =>
            {
                let name = node.child_by_field_name("name");
                let spelling = name.map(|n| self.text(n)).unwrap_or_default();
                self.push(
                    Some(parent),
                    CursorKind::MacroDefinition,
                    spelling,
                    location(name.unwrap_or(node)),
                    CType::invalid(),
                );
            }
            _ => {}
        }
    }

    /// `true` for a function type, directly or through typedefs seen so far
    fn declares_function(&self, ty: &CType) -> bool {
        let mut current = ty;
        for _ in 0..64 {
            if current.kind().is_function() {
                return true;
            }
            let Some((TagKind::Typedef, name)) = current.tag_name() else {
                return false;
            };
            let Some(underlying) = self
                .typedefs
                .get(name)
                .and_then(|decl| self.entities[decl.index()].underlying.as_ref())
            else {
                return false;
            };
            current = underlying;
        }
        false
    }

    fn in_record(&self, id: EntityId) -> bool {
        matches!(
            self.entities[id.index()].kind,
            CursorKind::StructDecl | CursorKind::UnionDecl | CursorKind::ClassDecl
        )
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn function_definition(&mut self, node: Node, parent: EntityId) {
        let specs = self.specifiers(node);
        if let Some(tag) = specs.type_node.filter(|t| has_body(*t)) {
            self.tag_declaration(tag, parent);
        }

        let declarator = self.declarator(node.child_by_field_name("declarator"), specs.base.clone());
        let kind = if self.in_record(parent) {
            CursorKind::CxxMethod
        } else {
            CursorKind::FunctionDecl
        };
        let spelling = declarator.name.map(|n| self.text(n)).unwrap_or_default();
        let function = self.push(
            Some(parent),
            kind,
            spelling.clone(),
            location(declarator.name.unwrap_or(node)),
            declarator.ty,
        );
        {
            let entity = self.entity_mut(function);
            entity.storage = specs.storage;
            entity.definition = true;
        }
        if kind == CursorKind::FunctionDecl {
            self.declare_value(&spelling, function);
        }

        self.type_ref(&specs, function);
        if let Some(params) = declarator.params {
            self.parameters(params, function);
        }
        if !self.options.skip_function_bodies {
            if let Some(body) = node.child_by_field_name("body") {
                self.statement(body, function);
            }
        }
    }

    fn declaration(&mut self, node: Node, parent: EntityId) {
        let specs = self.specifiers(node);
        if let Some(tag) = specs.type_node.filter(|t| has_body(*t)) {
            self.tag_declaration(tag, parent);
        }

        for target in field_children(node, "declarator") {
            let (declarator_node, init) = if target.kind() == "init_declarator" {
                (
                    target.child_by_field_name("declarator"),
                    target.child_by_field_name("value"),
                )
            } else {
                (Some(target), None)
            };

            let declarator = self.declarator(declarator_node, specs.base.clone());
            let is_function = self.declares_function(&declarator.ty);
            let kind = if is_function {
                CursorKind::FunctionDecl
            } else {
                CursorKind::VarDecl
            };
            let ty = match init {
                Some(init) => self.complete_array(declarator.ty, init),
                None => declarator.ty,
            };

            let spelling = declarator.name.map(|n| self.text(n)).unwrap_or_default();
            let decl = self.push(
                Some(parent),
                kind,
                spelling.clone(),
                location(declarator.name.unwrap_or(target)),
                ty,
            );
            {
                let entity = self.entity_mut(decl);
                entity.storage = specs.storage;
                entity.definition =
                    !is_function && (specs.storage != StorageClass::Extern || init.is_some());
            }
            self.declare_value(&spelling, decl);

            self.type_ref(&specs, decl);
            if is_function {
                if let Some(params) = declarator.params {
                    self.parameters(params, decl);
                }
            }
            if let Some(init) = init {
                self.expression(init, decl);
            }
        }
    }

    fn field_declaration(&mut self, node: Node, record: EntityId) {
        let specs = self.specifiers(node);
        if let Some(tag) = specs.type_node.filter(|t| has_body(*t)) {
            self.tag_declaration(tag, record);
        }

        for target in field_children(node, "declarator") {
            let declarator = self.declarator(Some(target), specs.base.clone());
            let kind = if self.declares_function(&declarator.ty) {
                CursorKind::CxxMethod
            } else {
                CursorKind::FieldDecl
            };
            let spelling = declarator.name.map(|n| self.text(n)).unwrap_or_default();
            let field = self.push(
                Some(record),
                kind,
                spelling,
                location(declarator.name.unwrap_or(target)),
                declarator.ty,
            );
            self.entity_mut(field).storage = specs.storage;

            self.type_ref(&specs, field);
            if kind == CursorKind::CxxMethod {
                if let Some(params) = declarator.params {
                    self.parameters(params, field);
                }
            }
        }
    }

    fn type_definition(&mut self, node: Node, parent: EntityId) {
        let specs = self.specifiers(node);
        if let Some(tag) = specs.type_node.filter(|t| has_body(*t)) {
            self.tag_declaration(tag, parent);
        }

        for target in field_children(node, "declarator") {
            let declarator = self.declarator(Some(target), specs.base.clone());
            let Some(name) = declarator.name else {
                continue;
            };
            let spelling = self.text(name);
            let typedef = self.push(
                Some(parent),
                CursorKind::TypedefDecl,
                spelling.clone(),
                location(name),
                CType::named(TagKind::Typedef, spelling.clone()),
            );
            {
                let entity = self.entity_mut(typedef);
                entity.underlying = Some(declarator.ty);
                entity.definition = true;
            }
            self.typedefs.entry(spelling).or_insert(typedef);
            self.type_ref(&specs, typedef);
        }
    }

    /// Emit a struct, union, class or enum declaration and its members
    fn tag_declaration(&mut self, node: Node, parent: EntityId) -> EntityId {
        let ty = self.tag_type(node);
        let Some((tag, name)) = ty.tag_name() else {
            return parent;
        };
        let key = (tag, name.to_string());

        let kind = match tag {
            TagKind::Union => CursorKind::UnionDecl,
            TagKind::Class => CursorKind::ClassDecl,
            TagKind::Enum => CursorKind::EnumDecl,
            _ => CursorKind::StructDecl,
        };
        let name_node = node.child_by_field_name("name");
        let spelling = name_node.map(|n| self.text(n)).unwrap_or_default();
        let body = node.child_by_field_name("body");
        let definition = body.is_some();

        let decl = self.push(
            Some(parent),
            kind,
            spelling,
            location(name_node.unwrap_or(node)),
            ty,
        );
        self.entity_mut(decl).definition = definition;
        if definition || !self.tags.contains_key(&key) {
            self.tags.insert(key, decl);
        }

        let Some(body) = body else {
            return decl;
        };
        for member in children_except(body, &[]) {
            match member.kind() {
                "enumerator" => self.enumerator(member, decl),
                "field_declaration" => self.field_declaration(member, decl),
                "function_definition" | "declaration" | "type_definition"
                | "template_declaration" => self.item(member, decl),
                _ => {}
            }
        }
        decl
    }

    fn enumerator(&mut self, node: Node, enumeration: EntityId) {
        let name = node.child_by_field_name("name");
        let spelling = name.map(|n| self.text(n)).unwrap_or_default();
        let constant = self.push(
            Some(enumeration),
            CursorKind::EnumConstantDecl,
            spelling.clone(),
            location(name.unwrap_or(node)),
            CType::builtin(TypeKind::Int),
        );
        self.entity_mut(constant).definition = true;
        self.declare_value(&spelling, constant);
        if let Some(value) = node.child_by_field_name("value") {
            self.expression(value, constant);
        }
    }

    fn parameters(&mut self, list: Node, function: EntityId) {
        for param in children_except(list, &[]) {
            if !matches!(
                param.kind(),
                "parameter_declaration" | "optional_parameter_declaration"
            ) {
                continue;
            }
            let specs = self.specifiers(param);
            let declarator =
                self.declarator(param.child_by_field_name("declarator"), specs.base.clone());
            if declarator.name.is_none() && is_void_parameter(&declarator.ty, param) {
                continue;
            }

            let spelling = declarator.name.map(|n| self.text(n)).unwrap_or_default();
            let parm = self.push(
                Some(function),
                CursorKind::ParmDecl,
                spelling.clone(),
                location(declarator.name.unwrap_or(param)),
                decay(declarator.ty),
            );
            {
                let entity = self.entity_mut(parm);
                entity.storage = specs.storage;
                entity.definition = true;
            }
            self.declare_value(&spelling, parm);
            self.type_ref(&specs, parm);
            if let Some(default) = param.child_by_field_name("default_value") {
                self.expression(default, parm);
            }
        }
    }

    /// `TypeRef` child for a declaration whose specifier names a type
    fn type_ref(&mut self, specs: &Specifiers, parent: EntityId) {
        let Some(node) = specs.type_node else {
            return;
        };
        let Some((tag, name)) = specs.base.tag_name() else {
            return;
        };
        if name.starts_with("(unnamed") {
            return;
        }
        let ty = CType::named(tag, name);
        self.push_node(parent, CursorKind::TypeRef, ty.spelling(), node, ty);
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn specifiers<'t>(&self, node: Node<'t>) -> Specifiers<'t> {
        let type_node = node.child_by_field_name("type");
        let base = type_node
            .map(|t| self.type_specifier(t))
            .unwrap_or_else(|| CType::builtin(TypeKind::Int));

        let mut storage = StorageClass::None;
        let (mut is_const, mut is_volatile) = (false, false);
        for child in children_except(node, &[]) {
            match child.kind() {
                "type_qualifier" => match self.text(child).as_str() {
                    "const" | "constexpr" => is_const = true,
                    "volatile" => is_volatile = true,
                    _ => {}
                },
                "storage_class_specifier" => {
                    if let Some(class) = StorageClass::from_keyword(&self.text(child)) {
                        storage = class;
                    }
                }
                _ => {}
            }
        }

        Specifiers {
            base: base.with_qualifiers(is_const, is_volatile),
            storage,
            type_node,
        }
    }

    fn type_specifier(&self, node: Node) -> CType {
        match node.kind() {
            "primitive_type" => primitive(&self.text(node)),
            "sized_type_specifier" => self.sized_type(node),
            "type_identifier" => CType::named(TagKind::Typedef, self.text(node)),
            "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier" => {
                self.tag_type(node)
            }
            _ => CType::opaque(self.text(node)),
        }
    }

    /// `unsigned long`, `short int`, `long double`, ...
    fn sized_type(&self, node: Node) -> CType {
        let (mut unsigned, mut signed, mut short, mut longs) = (false, false, false, 0);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "unsigned" => unsigned = true,
                "signed" => signed = true,
                "short" => short = true,
                "long" => longs += 1,
                _ => {}
            }
        }
        let base = node.child_by_field_name("type").map(|t| self.text(t));

        let kind = match base.as_deref() {
            Some("char") if unsigned => TypeKind::UChar,
            Some("char") if signed => TypeKind::SChar,
            Some("char") => TypeKind::CharS,
            Some("double") if longs > 0 => TypeKind::LongDouble,
            Some("double") => TypeKind::Double,
            _ if short && unsigned => TypeKind::UShort,
            _ if short => TypeKind::Short,
            _ => match (unsigned, longs) {
                (false, 0) => TypeKind::Int,
                (true, 0) => TypeKind::UInt,
                (false, 1) => TypeKind::Long,
                (true, 1) => TypeKind::ULong,
                (false, _) => TypeKind::LongLong,
                (true, _) => TypeKind::ULongLong,
            },
        };
        CType::builtin(kind)
    }

    fn tag_type(&self, node: Node) -> CType {
        let tag = match node.kind() {
            "union_specifier" => TagKind::Union,
            "enum_specifier" => TagKind::Enum,
            "class_specifier" => TagKind::Class,
            _ => TagKind::Struct,
        };
        let name = match node.child_by_field_name("name") {
            Some(name) => self.text(name),
            None => {
                let at = location(node);
                format!("(unnamed at {}:{})", at.line, at.column)
            }
        };
        CType::named(tag, name)
    }

    fn type_descriptor(&self, node: Node) -> CType {
        let specs = self.specifiers(node);
        self.declarator(node.child_by_field_name("declarator"), specs.base)
            .ty
    }

    /// Apply declarator syntax to `base`, outermost constructor first
    fn declarator<'t>(&self, node: Option<Node<'t>>, base: CType) -> Declarator<'t> {
        let mut ty = base;
        let mut name = None;
        let mut params = None;
        let mut current = node;

        while let Some(d) = current {
            current = match d.kind() {
                "identifier" | "field_identifier" | "type_identifier" | "primitive_type"
                | "qualified_identifier" | "operator_name" | "destructor_name" => {
                    name = Some(d);
                    None
                }
                "pointer_declarator" | "abstract_pointer_declarator" => {
                    let (is_const, is_volatile) = self.qualifiers(d);
                    ty = CType::pointer_to(ty).with_qualifiers(is_const, is_volatile);
                    d.child_by_field_name("declarator")
                }
                "reference_declarator" | "abstract_reference_declarator" => {
                    ty = CType::reference_to(ty);
                    children_except(d, &[]).into_iter().next()
                }
                "array_declarator" | "abstract_array_declarator" => {
                    let extent = match d.child_by_field_name("size") {
                        None => ArrayExtent::Incomplete,
                        Some(size) => match self.constant(size).and_then(|v| u64::try_from(v).ok())
                        {
                            Some(value) => ArrayExtent::Constant(value),
                            None => ArrayExtent::Variable(self.text(size)),
                        },
                    };
                    let (is_const, is_volatile) = self.qualifiers(d);
                    ty = CType::array_of(ty.with_qualifiers(is_const, is_volatile), extent);
                    d.child_by_field_name("declarator")
                }
                "function_declarator" | "abstract_function_declarator" => {
                    let list = d.child_by_field_name("parameters");
                    let (types, variadic) = self.parameter_types(list);
                    ty = CType::function(ty, types, variadic);
                    params = list;
                    d.child_by_field_name("declarator")
                }
                "parenthesized_declarator" | "abstract_parenthesized_declarator" => {
                    children_except(d, &[])
                        .into_iter()
                        .find(|c| !c.kind().starts_with("attribute") && c.kind() != "ms_call_modifier")
                }
                "attributed_declarator" | "init_declarator" => d
                    .child_by_field_name("declarator")
                    .or_else(|| children_except(d, &[]).into_iter().next()),
                _ => None,
            };
        }

        Declarator { name, ty, params }
    }

    /// Parameter types of a function declarator; `None` for a C `()` list
    fn parameter_types(&self, list: Option<Node>) -> (Option<Vec<CType>>, bool) {
        let Some(list) = list else {
            return (Some(Vec::new()), false);
        };

        let mut types = Vec::new();
        let mut variadic = false;
        let mut entries = 0;
        let mut identifiers = false;
        for param in children_except(list, &[]) {
            match param.kind() {
                "parameter_declaration" | "optional_parameter_declaration" => {
                    entries += 1;
                    let specs = self.specifiers(param);
                    let declarator =
                        self.declarator(param.child_by_field_name("declarator"), specs.base);
                    if declarator.name.is_none() && is_void_parameter(&declarator.ty, param) {
                        continue;
                    }
                    types.push(decay(declarator.ty));
                }
                "variadic_parameter" | "..." => {
                    entries += 1;
                    variadic = true;
                }
                "identifier" => identifiers = true,
                _ => {}
            }
        }

        if identifiers || (entries == 0 && self.language == SourceLanguage::C) {
            (None, false)
        } else {
            (Some(types), variadic)
        }
    }

    fn qualifiers(&self, node: Node) -> (bool, bool) {
        let (mut is_const, mut is_volatile) = (false, false);
        for child in children_except(node, &["declarator", "size"]) {
            if child.kind() == "type_qualifier" {
                match self.text(child).as_str() {
                    "const" => is_const = true,
                    "volatile" => is_volatile = true,
                    _ => {}
                }
            }
        }
        (is_const, is_volatile)
    }

    /// Fill in the size of `int a[] = {1, 2, 3}` and `char s[] = "..."`
    fn complete_array(&self, ty: CType, init: Node) -> CType {
        if ty.kind() != TypeKind::IncompleteArray {
            return ty;
        }
        let count = match init.kind() {
            "initializer_list" => match self.initializer_extent(init) {
                Some(count) => count,
                None => return ty,
            },
            "string_literal" | "concatenated_string" => self.string_length(init) + 1,
            _ => return ty,
        };
        match ty.element() {
            Some(element) => CType::array_of(element.clone(), ArrayExtent::Constant(count))
                .with_qualifiers(ty.is_const(), ty.is_volatile()),
            None => ty,
        }
    }

    /// Element count implied by an array initializer
    ///
    /// `[N] =` and `[A ... B] =` designators move the running index; the
    /// extent is one past the highest index written. `None` when a
    /// designator is not an integer constant.
    fn initializer_extent(&self, list: Node) -> Option<u64> {
        let mut next: u64 = 0;
        let mut extent: u64 = 0;
        for element in children_except(list, &[]) {
            if element.kind() == "initializer_pair" {
                let designator = field_children(element, "designator").into_iter().next();
                match designator.map(|d| (d.kind(), d)) {
                    Some(("subscript_designator", d)) => {
                        let index = self.constant(*children_except(d, &[]).first()?)?;
                        next = u64::try_from(index).ok()?;
                    }
                    Some(("subscript_range_designator", d)) => {
                        let last = self.constant(d.child_by_field_name("end")?)?;
                        next = u64::try_from(last).ok()?;
                    }
                    _ => {}
                }
            }
            next = next.checked_add(1)?;
            extent = extent.max(next);
        }
        Some(extent)
    }

    /// Integer constant expression value, for array sizes
    fn constant(&self, node: Node) -> Option<i128> {
        enum Step<'t> {
            Operand(Node<'t>),
            Unary(Node<'t>),
            Binary(Node<'t>),
        }

        let mut steps = vec![Step::Operand(node)];
        let mut values: Vec<i128> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                Step::Operand(node) => match node.kind() {
                    "number_literal" => values.push(parse_integer(&self.text(node))?),
                    "char_literal" => {
                        let text = self.text(node);
                        let inner = text.trim_matches('\'');
                        let mut chars = inner.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => values.push(c as i128),
                            _ => return None,
                        }
                    }
                    "parenthesized_expression" => {
                        steps.push(Step::Operand(*children_except(node, &[]).first()?));
                    }
                    "unary_expression" => {
                        steps.push(Step::Unary(node));
                        steps.push(Step::Operand(node.child_by_field_name("argument")?));
                    }
                    "binary_expression" => {
                        steps.push(Step::Binary(node));
                        steps.push(Step::Operand(node.child_by_field_name("right")?));
                        steps.push(Step::Operand(node.child_by_field_name("left")?));
                    }
                    _ => return None,
                },
                Step::Unary(node) => {
                    let operand = values.pop()?;
                    let value = match node.child_by_field_name("operator")?.kind() {
                        "-" => operand.checked_neg(),
                        "+" => Some(operand),
                        "~" => Some(!operand),
                        "!" => Some((operand == 0) as i128),
                        _ => None,
                    };
                    values.push(value?);
                }
                Step::Binary(node) => {
                    let right = values.pop()?;
                    let left = values.pop()?;
                    let value = match node.child_by_field_name("operator")?.kind() {
                        "+" => left.checked_add(right),
                        "-" => left.checked_sub(right),
                        "*" => left.checked_mul(right),
                        "/" => left.checked_div(right),
                        "%" => left.checked_rem(right),
                        "<<" => u32::try_from(right).ok().and_then(|r| left.checked_shl(r)),
                        ">>" => u32::try_from(right).ok().and_then(|r| left.checked_shr(r)),
                        "&" => Some(left & right),
                        "|" => Some(left | right),
                        "^" => Some(left ^ right),
                        _ => None,
                    };
                    values.push(value?);
                }
            }
        }
        values.pop()
    }

    fn string_length(&self, node: Node) -> u64 {
        match node.kind() {
            "concatenated_string" => children_except(node, &[])
                .into_iter()
                .map(|part| self.string_length(part))
                .sum(),
            "string_literal" => {
                let mut length = 0;
                for part in children_except(node, &[]) {
                    match part.kind() {
                        "string_content" => length += self.text(part).len() as u64,
                        "escape_sequence" => length += 1,
                        _ => {}
                    }
                }
                length
            }
            _ => 0,
        }
    }

    // ========================================================================
    // Statements and expressions
    // ========================================================================

    /// Build a statement subtree
    fn statement(&mut self, node: Node, parent: EntityId) {
        self.walk(Task::Statement(node, parent));
    }

    /// Build an expression subtree
    fn expression(&mut self, node: Node, parent: EntityId) {
        self.walk(Task::Expression(node, parent));
    }

    /// Drain the work stack for one subtree
    ///
    /// Each step pushes its own entity and queues its children. Queued tasks
    /// go back on the stack reversed, so entities stay numbered in pre-order.
    fn walk<'t>(&mut self, task: Task<'t>) {
        let mut stack = vec![task];
        let mut queued = Vec::new();
        while let Some(task) = stack.pop() {
            match task {
                Task::Statement(node, parent) => self.statement_step(node, parent, &mut queued),
                Task::Condition(node, parent) => self.condition_step(node, parent, &mut queued),
                Task::Expression(node, parent) => self.expression_step(node, parent, &mut queued),
            }
            stack.extend(queued.drain(..).rev());
        }
    }

    fn statement_step<'t>(
        &mut self,
        node: Node<'t>,
        parent: EntityId,
        queued: &mut Vec<Task<'t>>,
    ) {
        use CursorKind as K;

        let kind = match node.kind() {
            "comment" | "ERROR" => return,
            "compound_statement" => K::CompoundStmt,
            "declaration" | "type_definition" => K::DeclStmt,
            "if_statement" => K::IfStmt,
            "while_statement" => K::WhileStmt,
            "do_statement" => K::DoStmt,
            "for_statement" => K::ForStmt,
            "switch_statement" => K::SwitchStmt,
            "case_statement" if node.child_by_field_name("value").is_some() => K::CaseStmt,
            "case_statement" => K::DefaultStmt,
            "labeled_statement" => K::LabelStmt,
            "goto_statement" => K::GotoStmt,
            "return_statement" => K::ReturnStmt,
            "break_statement" => K::BreakStmt,
            "continue_statement" => K::ContinueStmt,
            "expression_statement" => match children_except(node, &[]).first() {
                Some(expression) => {
                    queued.push(Task::Expression(*expression, parent));
                    return;
                }
                None => K::NullStmt,
            },
            "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" => {
                for child in children_except(node, &["condition", "name"]) {
                    queued.push(Task::Statement(child, parent));
                }
                return;
            }
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                self.tag_declaration(node, parent);
                return;
            }
            kind if is_expression_node(kind) => {
                queued.push(Task::Expression(node, parent));
                return;
            }
            _ => K::UnexposedStmt,
        };

        let spelling = match kind {
            K::LabelStmt | K::GotoStmt => node
                .child_by_field_name("label")
                .map(|label| self.text(label))
                .unwrap_or_default(),
            _ => String::new(),
        };
        let stmt = self.push_node(parent, kind, spelling, node, CType::invalid());

        match kind {
            K::DeclStmt if node.kind() == "type_definition" => self.type_definition(node, stmt),
            K::DeclStmt => self.declaration(node, stmt),
            K::IfStmt => {
                if let Some(condition) = node.child_by_field_name("condition") {
                    queued.push(Task::Condition(condition, stmt));
                }
                if let Some(consequence) = node.child_by_field_name("consequence") {
                    queued.push(Task::Statement(consequence, stmt));
                }
                if let Some(alternative) = node.child_by_field_name("alternative") {
                    if alternative.kind() == "else_clause" {
                        for child in children_except(alternative, &[]) {
                            queued.push(Task::Statement(child, stmt));
                        }
                    } else {
                        queued.push(Task::Statement(alternative, stmt));
                    }
                }
            }
            K::WhileStmt | K::SwitchStmt => {
                if let Some(condition) = node.child_by_field_name("condition") {
                    queued.push(Task::Condition(condition, stmt));
                }
                if let Some(body) = node.child_by_field_name("body") {
                    queued.push(Task::Statement(body, stmt));
                }
            }
            K::DoStmt => {
                if let Some(body) = node.child_by_field_name("body") {
                    queued.push(Task::Statement(body, stmt));
                }
                if let Some(condition) = node.child_by_field_name("condition") {
                    queued.push(Task::Condition(condition, stmt));
                }
            }
            K::ForStmt => {
                if let Some(init) = node.child_by_field_name("initializer") {
                    queued.push(Task::Statement(init, stmt));
                }
                for field in ["condition", "update"] {
                    if let Some(part) = node.child_by_field_name(field) {
                        queued.push(Task::Expression(part, stmt));
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    queued.push(Task::Statement(body, stmt));
                }
            }
            K::CaseStmt | K::DefaultStmt => {
                if let Some(value) = node.child_by_field_name("value") {
                    queued.push(Task::Expression(value, stmt));
                }
                for child in children_except(node, &["value"]) {
                    queued.push(Task::Statement(child, stmt));
                }
            }
            K::LabelStmt => {
                for child in children_except(node, &["label"]) {
                    queued.push(Task::Statement(child, stmt));
                }
            }
            K::GotoStmt => {}
            K::ReturnStmt => {
                if let Some(value) = children_except(node, &[]).first() {
                    queued.push(Task::Expression(*value, stmt));
                }
            }
            _ => {
                for child in children_except(node, &[]) {
                    queued.push(Task::Statement(child, stmt));
                }
            }
        }
    }

    /// Conditions are parenthesized in the grammar; the parentheses are not an entity
    fn condition_step<'t>(
        &mut self,
        node: Node<'t>,
        parent: EntityId,
        queued: &mut Vec<Task<'t>>,
    ) {
        match node.kind() {
            "parenthesized_expression" | "condition_clause" => {
                let inner = node
                    .child_by_field_name("value")
                    .or_else(|| children_except(node, &[]).into_iter().next());
                if let Some(inner) = inner {
                    if inner.kind() == "declaration" {
                        self.declaration(inner, parent);
                    } else {
                        queued.push(Task::Expression(inner, parent));
                    }
                }
            }
            _ => queued.push(Task::Expression(node, parent)),
        }
    }

    fn expression_step<'t>(
        &mut self,
        node: Node<'t>,
        parent: EntityId,
        queued: &mut Vec<Task<'t>>,
    ) {
        use CursorKind as K;

        match node.kind() {
            "comment" | "ERROR" => {}
            "identifier" => {
                let name = self.text(node);
                self.push_node(parent, K::DeclRefExpr, name, node, CType::invalid());
            }
            "number_literal" => {
                let text = self.text(node);
                let (kind, ty) = number_literal(&text);
                self.push_node(parent, kind, text, node, ty);
            }
            "string_literal" | "concatenated_string" => {
                let text = self.text(node);
                let length = self.string_length(node) + 1;
                let ty = CType::array_of(
                    CType::builtin(TypeKind::CharS),
                    ArrayExtent::Constant(length),
                );
                self.push_node(parent, K::StringLiteral, text, node, ty);
            }
            "char_literal" => {
                let text = self.text(node);
                let ty = match self.language {
                    SourceLanguage::C => CType::builtin(TypeKind::Int),
                    SourceLanguage::Cpp => CType::builtin(TypeKind::CharS),
                };
                self.push_node(parent, K::CharacterLiteral, text, node, ty);
            }
            "true" | "false" => {
                let text = self.text(node);
                self.push_node(parent, K::UnexposedExpr, text, node, CType::builtin(TypeKind::Bool));
            }
            "parenthesized_expression" => {
                let paren = self.push_node(parent, K::ParenExpr, String::new(), node, CType::invalid());
                queue_expressions(queued, children_except(node, &[]), paren);
            }
            "call_expression" => {
                let function = node.child_by_field_name("function");
                let spelling = function.map(|f| self.callee_name(f)).unwrap_or_default();
                let call = self.push_node(parent, K::CallExpr, spelling, node, CType::invalid());
                if let Some(function) = function {
                    queued.push(Task::Expression(function, call));
                }
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    queue_expressions(queued, children_except(arguments, &[]), call);
                }
            }
            "binary_expression" | "comma_expression" | "assignment_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| op.kind().to_string())
                    .unwrap_or_else(|| ",".to_string());
                let kind = if node.kind() == "assignment_expression" && operator != "=" {
                    K::CompoundAssignOperator
                } else {
                    K::BinaryOperator
                };
                let op = self.push_node(parent, kind, operator, node, CType::invalid());
                let sides = [node.child_by_field_name("left"), node.child_by_field_name("right")];
                queue_expressions(queued, sides.into_iter().flatten().collect(), op);
            }
            "unary_expression" | "pointer_expression" | "update_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| op.kind().to_string())
                    .unwrap_or_default();
                let op = self.push_node(parent, K::UnaryOperator, operator, node, CType::invalid());
                if let Some(argument) = node.child_by_field_name("argument") {
                    queued.push(Task::Expression(argument, op));
                }
            }
            "sizeof_expression" | "alignof_expression" => {
                let keyword = node.child(0).map(|k| k.kind().to_string()).unwrap_or_default();
                let unary = self.push_node(
                    parent,
                    K::UnaryExpr,
                    keyword,
                    node,
                    CType::builtin(TypeKind::ULong),
                );
                if let Some(value) = node.child_by_field_name("value") {
                    queued.push(Task::Expression(value, unary));
                } else if let Some(descriptor) = node.child_by_field_name("type") {
                    self.descriptor_ref(descriptor, unary);
                }
            }
            "field_expression" => {
                let field = node
                    .child_by_field_name("field")
                    .map(|f| self.text(f))
                    .unwrap_or_default();
                let member = self.push_node(parent, K::MemberRefExpr, field, node, CType::invalid());
                if let Some(argument) = node.child_by_field_name("argument") {
                    queued.push(Task::Expression(argument, member));
                }
            }
            "subscript_expression" => {
                let subscript =
                    self.push_node(parent, K::ArraySubscriptExpr, String::new(), node, CType::invalid());
                queue_expressions(queued, children_except(node, &[]), subscript);
            }
            "cast_expression" | "compound_literal_expression" => {
                let kind = if node.kind() == "cast_expression" {
                    K::CStyleCastExpr
                } else {
                    K::CompoundLiteralExpr
                };
                let descriptor = node.child_by_field_name("type");
                let ty = descriptor
                    .map(|d| self.type_descriptor(d))
                    .unwrap_or_else(CType::invalid);
                let cast = self.push_node(parent, kind, String::new(), node, ty);
                if let Some(descriptor) = descriptor {
                    self.descriptor_ref(descriptor, cast);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    queued.push(Task::Expression(value, cast));
                }
            }
            "conditional_expression" => {
                let conditional =
                    self.push_node(parent, K::ConditionalOperator, String::new(), node, CType::invalid());
                queue_expressions(queued, children_except(node, &[]), conditional);
            }
            "initializer_list" => {
                let list = self.push_node(parent, K::InitListExpr, String::new(), node, CType::invalid());
                for element in children_except(node, &[]) {
                    let value = if element.kind() == "initializer_pair" {
                        element.child_by_field_name("value")
                    } else {
                        Some(element)
                    };
                    if let Some(value) = value {
                        queued.push(Task::Expression(value, list));
                    }
                }
            }
            _ => {
                let unexposed =
                    self.push_node(parent, K::UnexposedExpr, String::new(), node, CType::invalid());
                queue_expressions(queued, children_except(node, &[]), unexposed);
            }
        }
    }

    fn descriptor_ref(&mut self, descriptor: Node, parent: EntityId) {
        let specs = self.specifiers(descriptor);
        self.type_ref(&specs, parent);
    }

    fn callee_name(&self, mut node: Node) -> String {
        loop {
            match node.kind() {
                "identifier" | "qualified_identifier" => return self.text(node),
                "field_expression" => {
                    return node
                        .child_by_field_name("field")
                        .map(|f| self.text(f))
                        .unwrap_or_default()
                }
                "parenthesized_expression" => match children_except(node, &[]).first() {
                    Some(inner) => node = *inner,
                    None => return String::new(),
                },
                _ => return String::new(),
            }
        }
    }
}

/// Pending statement or expression node and the entity it attaches to
enum Task<'t> {
    Statement(Node<'t>, EntityId),
    Condition(Node<'t>, EntityId),
    Expression(Node<'t>, EntityId),
}

fn queue_expressions<'t>(queued: &mut Vec<Task<'t>>, nodes: Vec<Node<'t>>, parent: EntityId) {
    queued.extend(nodes.into_iter().map(|node| Task::Expression(node, parent)));
}

// ============================================================================
// Helper Functions
// ============================================================================

fn location(node: Node) -> Location {
    let start = node.start_position();
    Location {
        line: start.row + 1,
        column: start.column + 1,
    }
}

/// Named children, skipping comments and the given fields
fn children_except<'t>(node: Node<'t>, fields: &[&str]) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let mut children = Vec::new();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            let skipped = cursor
                .field_name()
                .map(|field| fields.contains(&field))
                .unwrap_or(false);
            if child.is_named() && child.kind() != "comment" && !skipped {
                children.push(child);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    children
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn has_body(node: Node) -> bool {
    matches!(
        node.kind(),
        "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier"
    ) && node.child_by_field_name("body").is_some()
}

/// `f(void)` declares no parameters
fn is_void_parameter(ty: &CType, param: Node) -> bool {
    ty.kind() == TypeKind::Void
        && !ty.is_const()
        && param.child_by_field_name("declarator").is_none()
}

/// Parameter adjustment: arrays and functions decay to pointers
fn decay(ty: CType) -> CType {
    if let Some(element) = ty.element() {
        return CType::pointer_to(element.clone());
    }
    if ty.kind().is_function() {
        return CType::pointer_to(ty);
    }
    ty
}

fn primitive(name: &str) -> CType {
    let kind = match name {
        "void" => TypeKind::Void,
        "bool" | "_Bool" => TypeKind::Bool,
        "char" => TypeKind::CharS,
        "short" => TypeKind::Short,
        "int" => TypeKind::Int,
        "long" => TypeKind::Long,
        "float" => TypeKind::Float,
        "double" => TypeKind::Double,
        "unsigned" => TypeKind::UInt,
        "signed" => TypeKind::Int,
        // size_t, uint8_t and friends come from headers we never read
        _ => return CType::named(TagKind::Typedef, name),
    };
    CType::builtin(kind)
}

fn is_expression_node(kind: &str) -> bool {
    kind.ends_with("_expression")
        || matches!(
            kind,
            "identifier"
                | "number_literal"
                | "string_literal"
                | "concatenated_string"
                | "char_literal"
                | "initializer_list"
                | "true"
                | "false"
                | "null"
        )
}

fn parse_integer(text: &str) -> Option<i128> {
    let cleaned: String = text.chars().filter(|c| *c != '\'').collect();
    let digits = cleaned.trim_end_matches(['u', 'U', 'l', 'L', 'z', 'Z']);
    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(binary) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        (2, binary)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    i128::from_str_radix(body, radix).ok()
}

/// Kind and type of a number literal from its shape and suffix
fn number_literal(text: &str) -> (CursorKind, CType) {
    let lower = text.to_ascii_lowercase();
    let is_float = if lower.starts_with("0x") {
        lower.contains('p')
    } else {
        lower.contains('.') || lower.contains('e')
    };

    if is_float {
        let kind = if lower.ends_with('f') {
            TypeKind::Float
        } else if lower.ends_with('l') {
            TypeKind::LongDouble
        } else {
            TypeKind::Double
        };
        return (CursorKind::FloatingLiteral, CType::builtin(kind));
    }

    let suffix: String = lower
        .chars()
        .rev()
        .take_while(|c| matches!(c, 'u' | 'l' | 'z'))
        .collect();
    let unsigned = suffix.contains('u');
    let kind = match (unsigned, suffix.matches('l').count()) {
        (false, 0) => TypeKind::Int,
        (true, 0) => TypeKind::UInt,
        (false, 1) => TypeKind::Long,
        (true, 1) => TypeKind::ULong,
        (false, _) => TypeKind::LongLong,
        (true, _) => TypeKind::ULongLong,
    };
    (CursorKind::IntegerLiteral, CType::builtin(kind))
}

/// Syntax errors and missing tokens, one diagnostic per error subtree
fn collect_diagnostics(root: Node) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !root.has_error() {
        return diagnostics;
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let at = location(node);
        if node.is_error() {
            diagnostics.push(Diagnostic {
                line: at.line,
                column: at.column,
                message: "syntax error".to_string(),
            });
            continue;
        }
        if node.is_missing() {
            diagnostics.push(Diagnostic {
                line: at.line,
                column: at.column,
                message: format!("missing '{}'", node.kind()),
            });
            continue;
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node
            .children(&mut cursor)
            .filter(|child| child.has_error())
            .collect();
        stack.extend(children.into_iter().rev());
    }

    diagnostics
}
