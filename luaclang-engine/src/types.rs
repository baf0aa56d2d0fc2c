//! Semantic type model
//!
//! A `CType` is a value: it owns its component types and names tagged
//! declarations (`struct point`, typedef `size_t`) by name only. Resolving a
//! name to its declaring entity is a translation-unit query, see
//! [`crate::TranslationUnit::type_declaration`].

use crate::kinds::TypeKind;

/// Tag of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Struct,
    Union,
    Class,
    Enum,
    Typedef,
}

impl TagKind {
    fn keyword(self) -> Option<&'static str> {
        match self {
            TagKind::Struct => Some("struct"),
            TagKind::Union => Some("union"),
            TagKind::Class => Some("class"),
            TagKind::Enum => Some("enum"),
            TagKind::Typedef => None,
        }
    }

    fn type_kind(self) -> TypeKind {
        match self {
            TagKind::Struct | TagKind::Union | TagKind::Class => TypeKind::Record,
            TagKind::Enum => TypeKind::Enum,
            TagKind::Typedef => TypeKind::Typedef,
        }
    }
}

/// Extent of an array type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayExtent {
    Constant(u64),
    Incomplete,
    /// Size expression that is not a constant, kept as source text
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Shape {
    Builtin,
    /// Spelled verbatim (macro types, template ids)
    Opaque(String),
    Pointer(Box<CType>),
    Array {
        element: Box<CType>,
        extent: ArrayExtent,
    },
    Function {
        result: Box<CType>,
        params: Vec<CType>,
        variadic: bool,
    },
    Named {
        tag: TagKind,
        name: String,
    },
}

/// A C/C++ type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CType {
    kind: TypeKind,
    is_const: bool,
    is_volatile: bool,
    shape: Shape,
}

impl CType {
    pub fn invalid() -> Self {
        Self {
            kind: TypeKind::Invalid,
            is_const: false,
            is_volatile: false,
            shape: Shape::Builtin,
        }
    }

    pub fn builtin(kind: TypeKind) -> Self {
        Self {
            kind,
            is_const: false,
            is_volatile: false,
            shape: Shape::Builtin,
        }
    }

    pub fn opaque(spelling: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Unexposed,
            is_const: false,
            is_volatile: false,
            shape: Shape::Opaque(spelling.into()),
        }
    }

    pub fn named(tag: TagKind, name: impl Into<String>) -> Self {
        Self {
            kind: tag.type_kind(),
            is_const: false,
            is_volatile: false,
            shape: Shape::Named {
                tag,
                name: name.into(),
            },
        }
    }

    pub fn pointer_to(pointee: CType) -> Self {
        Self {
            kind: TypeKind::Pointer,
            is_const: false,
            is_volatile: false,
            shape: Shape::Pointer(Box::new(pointee)),
        }
    }

    pub fn reference_to(referee: CType) -> Self {
        Self {
            kind: TypeKind::LValueReference,
            is_const: false,
            is_volatile: false,
            shape: Shape::Pointer(Box::new(referee)),
        }
    }

    pub fn array_of(element: CType, extent: ArrayExtent) -> Self {
        let kind = match extent {
            ArrayExtent::Constant(_) => TypeKind::ConstantArray,
            ArrayExtent::Incomplete => TypeKind::IncompleteArray,
            ArrayExtent::Variable(_) => TypeKind::VariableArray,
        };
        Self {
            kind,
            is_const: false,
            is_volatile: false,
            shape: Shape::Array {
                element: Box::new(element),
                extent,
            },
        }
    }

    /// Function type; `params == None` is a K&R declaration without a prototype
    pub fn function(result: CType, params: Option<Vec<CType>>, variadic: bool) -> Self {
        let kind = if params.is_some() {
            TypeKind::FunctionProto
        } else {
            TypeKind::FunctionNoProto
        };
        Self {
            kind,
            is_const: false,
            is_volatile: false,
            shape: Shape::Function {
                result: Box::new(result),
                params: params.unwrap_or_default(),
                variadic,
            },
        }
    }

    pub fn with_qualifiers(mut self, is_const: bool, is_volatile: bool) -> Self {
        self.is_const |= is_const;
        self.is_volatile |= is_volatile;
        self
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.kind != TypeKind::Invalid
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn is_volatile(&self) -> bool {
        self.is_volatile
    }

    /// Pointee of a pointer or reference type
    pub fn pointee(&self) -> Option<&CType> {
        match &self.shape {
            Shape::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&CType> {
        match &self.shape {
            Shape::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn extent(&self) -> Option<&ArrayExtent> {
        match &self.shape {
            Shape::Array { extent, .. } => Some(extent),
            _ => None,
        }
    }

    /// Size of a constant array
    pub fn array_size(&self) -> Option<u64> {
        match self.extent() {
            Some(ArrayExtent::Constant(size)) => Some(*size),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&CType> {
        match &self.shape {
            Shape::Function { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn params(&self) -> Option<&[CType]> {
        match &self.shape {
            Shape::Function { params, .. } => Some(params),
            _ => None,
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.shape, Shape::Function { variadic: true, .. })
    }

    /// Tag and name of a record, enum or typedef type
    pub fn tag_name(&self) -> Option<(TagKind, &str)> {
        match &self.shape {
            Shape::Named { tag, name } => Some((*tag, name.as_str())),
            _ => None,
        }
    }

    /// C spelling, e.g. `const char *`, `int[3]`, `int (*)(int, int)`
    pub fn spelling(&self) -> String {
        self.spell_around("")
    }

    /// Spell this type around an inner declarator fragment
    fn spell_around(&self, inner: &str) -> String {
        match &self.shape {
            Shape::Pointer(pointee) => {
                let mut fragment =
                    String::from(if self.kind == TypeKind::LValueReference { "&" } else { "*" });
                let qualifiers = self.qualifier_prefix();
                if !qualifiers.is_empty() {
                    fragment.push_str(qualifiers.trim_end());
                    if !inner.is_empty() {
                        fragment.push(' ');
                    }
                }
                fragment.push_str(inner);
                if pointee.kind.is_array() || pointee.kind.is_function() {
                    fragment = format!("({})", fragment);
                }
                pointee.spell_around(&fragment)
            }
            Shape::Array { element, extent } => {
                let size = match extent {
                    ArrayExtent::Constant(size) => size.to_string(),
                    ArrayExtent::Incomplete => String::new(),
                    ArrayExtent::Variable(text) => text.clone(),
                };
                element.spell_around(&format!("{}[{}]", inner, size))
            }
            Shape::Function {
                result,
                params,
                variadic,
            } => {
                let mut list: Vec<String> = params.iter().map(CType::spelling).collect();
                if *variadic {
                    list.push("...".to_string());
                }
                if list.is_empty() && self.kind == TypeKind::FunctionProto {
                    list.push("void".to_string());
                }
                result.spell_around(&format!("{}({})", inner, list.join(", ")))
            }
            Shape::Builtin | Shape::Opaque(_) | Shape::Named { .. } => {
                let base = format!("{}{}", self.qualifier_prefix(), self.base_name());
                if inner.is_empty() {
                    base
                } else if inner.starts_with('[') {
                    format!("{}{}", base, inner)
                } else {
                    format!("{} {}", base, inner)
                }
            }
        }
    }

    fn base_name(&self) -> String {
        match &self.shape {
            Shape::Opaque(text) => text.clone(),
            Shape::Named { tag, name } => match tag.keyword() {
                Some(keyword) => format!("{} {}", keyword, name),
                None => name.clone(),
            },
            _ => self
                .kind
                .builtin_spelling()
                .unwrap_or("<invalid>")
                .to_string(),
        }
    }

    fn qualifier_prefix(&self) -> String {
        let mut prefix = String::new();
        if self.is_const {
            prefix.push_str("const ");
        }
        if self.is_volatile {
            prefix.push_str("volatile ");
        }
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> CType {
        CType::builtin(TypeKind::Int)
    }

    #[test]
    fn test_builtin_spelling() {
        assert_eq!(int().spelling(), "int");
        assert_eq!(
            CType::builtin(TypeKind::ULong).with_qualifiers(true, false).spelling(),
            "const unsigned long"
        );
    }

    #[test]
    fn test_pointer_spelling() {
        let char_ptr = CType::pointer_to(CType::builtin(TypeKind::CharS).with_qualifiers(true, false));
        assert_eq!(char_ptr.spelling(), "const char *");
        assert_eq!(CType::pointer_to(char_ptr).spelling(), "const char **");

        let const_ptr = CType::pointer_to(int()).with_qualifiers(true, false);
        assert_eq!(const_ptr.spelling(), "int *const");
    }

    #[test]
    fn test_array_spelling() {
        let array = CType::array_of(int(), ArrayExtent::Constant(3));
        assert_eq!(array.spelling(), "int[3]");
        assert_eq!(array.array_size(), Some(3));

        let pointers = CType::array_of(CType::pointer_to(int()), ArrayExtent::Constant(4));
        assert_eq!(pointers.spelling(), "int *[4]");

        let to_array = CType::pointer_to(CType::array_of(int(), ArrayExtent::Constant(2)));
        assert_eq!(to_array.spelling(), "int (*)[2]");

        let open = CType::array_of(int(), ArrayExtent::Incomplete);
        assert_eq!(open.kind(), TypeKind::IncompleteArray);
        assert_eq!(open.array_size(), None);
    }

    #[test]
    fn test_function_spelling() {
        let add = CType::function(int(), Some(vec![int(), int()]), false);
        assert_eq!(add.spelling(), "int (int, int)");
        assert_eq!(add.kind(), TypeKind::FunctionProto);

        let no_args = CType::function(int(), Some(vec![]), false);
        assert_eq!(no_args.spelling(), "int (void)");

        let knr = CType::function(int(), None, false);
        assert_eq!(knr.spelling(), "int ()");
        assert_eq!(knr.kind(), TypeKind::FunctionNoProto);

        let printf = CType::function(int(), Some(vec![CType::pointer_to(CType::builtin(TypeKind::CharS))]), true);
        assert_eq!(printf.spelling(), "int (char *, ...)");
        assert!(printf.is_variadic());

        let callback = CType::pointer_to(CType::function(int(), Some(vec![int()]), false));
        assert_eq!(callback.spelling(), "int (*)(int)");
    }

    #[test]
    fn test_named_spelling() {
        assert_eq!(CType::named(TagKind::Struct, "point").spelling(), "struct point");
        assert_eq!(CType::named(TagKind::Union, "value").kind(), TypeKind::Record);
        assert_eq!(CType::named(TagKind::Typedef, "size_t").spelling(), "size_t");
        assert_eq!(CType::named(TagKind::Enum, "color").kind(), TypeKind::Enum);
    }

    #[test]
    fn test_invalid_type() {
        assert!(!CType::invalid().is_valid());
        assert!(int().is_valid());
    }
}
