//! Cursor, type and storage-class enumerations
//!
//! The names follow libclang's `CXCursorKind`, `CXTypeKind` and
//! `CX_StorageClass` spellings so scripts written against libclang read the
//! same. All three enums are `#[non_exhaustive]`: the engine may learn new
//! kinds, and consumers must keep a fallback arm.

use serde::Serialize;

// ============================================================================
// Cursor Kinds
// ============================================================================

/// Kind of an AST entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum CursorKind {
    // Declarations
    StructDecl,
    UnionDecl,
    ClassDecl,
    EnumDecl,
    FieldDecl,
    EnumConstantDecl,
    FunctionDecl,
    VarDecl,
    ParmDecl,
    TypedefDecl,
    CxxMethod,
    Namespace,
    LinkageSpec,

    // References
    TypeRef,

    // Expressions
    UnexposedExpr,
    DeclRefExpr,
    MemberRefExpr,
    CallExpr,
    IntegerLiteral,
    FloatingLiteral,
    StringLiteral,
    CharacterLiteral,
    ParenExpr,
    UnaryOperator,
    ArraySubscriptExpr,
    BinaryOperator,
    CompoundAssignOperator,
    ConditionalOperator,
    CStyleCastExpr,
    CompoundLiteralExpr,
    InitListExpr,
    UnaryExpr,

    // Statements
    UnexposedStmt,
    LabelStmt,
    CompoundStmt,
    CaseStmt,
    DefaultStmt,
    IfStmt,
    SwitchStmt,
    WhileStmt,
    DoStmt,
    ForStmt,
    GotoStmt,
    ContinueStmt,
    BreakStmt,
    ReturnStmt,
    NullStmt,
    DeclStmt,

    // Translation unit and preprocessing
    TranslationUnit,
    MacroDefinition,
    InclusionDirective,
}

impl CursorKind {
    /// libclang spelling of the kind
    pub fn spelling(self) -> &'static str {
        match self {
            CursorKind::StructDecl => "StructDecl",
            CursorKind::UnionDecl => "UnionDecl",
            CursorKind::ClassDecl => "ClassDecl",
            CursorKind::EnumDecl => "EnumDecl",
            CursorKind::FieldDecl => "FieldDecl",
            CursorKind::EnumConstantDecl => "EnumConstantDecl",
            CursorKind::FunctionDecl => "FunctionDecl",
            CursorKind::VarDecl => "VarDecl",
            CursorKind::ParmDecl => "ParmDecl",
            CursorKind::TypedefDecl => "TypedefDecl",
            CursorKind::CxxMethod => "CXXMethod",
            CursorKind::Namespace => "Namespace",
            CursorKind::LinkageSpec => "LinkageSpec",
            CursorKind::TypeRef => "TypeRef",
            CursorKind::UnexposedExpr => "UnexposedExpr",
            CursorKind::DeclRefExpr => "DeclRefExpr",
            CursorKind::MemberRefExpr => "MemberRefExpr",
            CursorKind::CallExpr => "CallExpr",
            CursorKind::IntegerLiteral => "IntegerLiteral",
            CursorKind::FloatingLiteral => "FloatingLiteral",
            CursorKind::StringLiteral => "StringLiteral",
            CursorKind::CharacterLiteral => "CharacterLiteral",
            CursorKind::ParenExpr => "ParenExpr",
            CursorKind::UnaryOperator => "UnaryOperator",
            CursorKind::ArraySubscriptExpr => "ArraySubscriptExpr",
            CursorKind::BinaryOperator => "BinaryOperator",
            CursorKind::CompoundAssignOperator => "CompoundAssignOperator",
            CursorKind::ConditionalOperator => "ConditionalOperator",
            CursorKind::CStyleCastExpr => "CStyleCastExpr",
            CursorKind::CompoundLiteralExpr => "CompoundLiteralExpr",
            CursorKind::InitListExpr => "InitListExpr",
            CursorKind::UnaryExpr => "UnaryExpr",
            CursorKind::UnexposedStmt => "UnexposedStmt",
            CursorKind::LabelStmt => "LabelStmt",
            CursorKind::CompoundStmt => "CompoundStmt",
            CursorKind::CaseStmt => "CaseStmt",
            CursorKind::DefaultStmt => "DefaultStmt",
            CursorKind::IfStmt => "IfStmt",
            CursorKind::SwitchStmt => "SwitchStmt",
            CursorKind::WhileStmt => "WhileStmt",
            CursorKind::DoStmt => "DoStmt",
            CursorKind::ForStmt => "ForStmt",
            CursorKind::GotoStmt => "GotoStmt",
            CursorKind::ContinueStmt => "ContinueStmt",
            CursorKind::BreakStmt => "BreakStmt",
            CursorKind::ReturnStmt => "ReturnStmt",
            CursorKind::NullStmt => "NullStmt",
            CursorKind::DeclStmt => "DeclStmt",
            CursorKind::TranslationUnit => "TranslationUnit",
            CursorKind::MacroDefinition => "MacroDefinition",
            CursorKind::InclusionDirective => "InclusionDirective",
        }
    }

    /// Whether the kind declares a named entity
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            CursorKind::StructDecl
                | CursorKind::UnionDecl
                | CursorKind::ClassDecl
                | CursorKind::EnumDecl
                | CursorKind::FieldDecl
                | CursorKind::EnumConstantDecl
                | CursorKind::FunctionDecl
                | CursorKind::VarDecl
                | CursorKind::ParmDecl
                | CursorKind::TypedefDecl
                | CursorKind::CxxMethod
                | CursorKind::Namespace
                | CursorKind::LinkageSpec
        )
    }

    /// Whether the kind declares something with a value (a name usable in an expression)
    pub fn is_value_declaration(self) -> bool {
        matches!(
            self,
            CursorKind::VarDecl
                | CursorKind::ParmDecl
                | CursorKind::FunctionDecl
                | CursorKind::EnumConstantDecl
                | CursorKind::CxxMethod
        )
    }

    /// Whether the kind opens a scope for name lookup
    pub(crate) fn opens_scope(self) -> bool {
        matches!(
            self,
            CursorKind::TranslationUnit
                | CursorKind::FunctionDecl
                | CursorKind::CxxMethod
                | CursorKind::CompoundStmt
                | CursorKind::ForStmt
                | CursorKind::Namespace
        )
    }

    pub fn is_expression(self) -> bool {
        matches!(
            self,
            CursorKind::UnexposedExpr
                | CursorKind::DeclRefExpr
                | CursorKind::MemberRefExpr
                | CursorKind::CallExpr
                | CursorKind::IntegerLiteral
                | CursorKind::FloatingLiteral
                | CursorKind::StringLiteral
                | CursorKind::CharacterLiteral
                | CursorKind::ParenExpr
                | CursorKind::UnaryOperator
                | CursorKind::ArraySubscriptExpr
                | CursorKind::BinaryOperator
                | CursorKind::CompoundAssignOperator
                | CursorKind::ConditionalOperator
                | CursorKind::CStyleCastExpr
                | CursorKind::CompoundLiteralExpr
                | CursorKind::InitListExpr
                | CursorKind::UnaryExpr
        )
    }
}

impl std::fmt::Display for CursorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.spelling())
    }
}

// ============================================================================
// Type Kinds
// ============================================================================

/// Kind of a semantic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum TypeKind {
    Invalid,
    Unexposed,
    Void,
    Bool,
    CharS,
    UChar,
    SChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    Pointer,
    LValueReference,
    Record,
    Enum,
    Typedef,
    FunctionProto,
    FunctionNoProto,
    ConstantArray,
    IncompleteArray,
    VariableArray,
}

impl TypeKind {
    /// libclang spelling of the kind
    pub fn spelling(self) -> &'static str {
        match self {
            TypeKind::Invalid => "Invalid",
            TypeKind::Unexposed => "Unexposed",
            TypeKind::Void => "Void",
            TypeKind::Bool => "Bool",
            TypeKind::CharS => "Char_S",
            TypeKind::UChar => "UChar",
            TypeKind::SChar => "SChar",
            TypeKind::Short => "Short",
            TypeKind::UShort => "UShort",
            TypeKind::Int => "Int",
            TypeKind::UInt => "UInt",
            TypeKind::Long => "Long",
            TypeKind::ULong => "ULong",
            TypeKind::LongLong => "LongLong",
            TypeKind::ULongLong => "ULongLong",
            TypeKind::Float => "Float",
            TypeKind::Double => "Double",
            TypeKind::LongDouble => "LongDouble",
            TypeKind::Pointer => "Pointer",
            TypeKind::LValueReference => "LValueReference",
            TypeKind::Record => "Record",
            TypeKind::Enum => "Enum",
            TypeKind::Typedef => "Typedef",
            TypeKind::FunctionProto => "FunctionProto",
            TypeKind::FunctionNoProto => "FunctionNoProto",
            TypeKind::ConstantArray => "ConstantArray",
            TypeKind::IncompleteArray => "IncompleteArray",
            TypeKind::VariableArray => "VariableArray",
        }
    }

    /// C spelling of a builtin kind, `None` for composite kinds
    pub(crate) fn builtin_spelling(self) -> Option<&'static str> {
        let spelling = match self {
            TypeKind::Void => "void",
            TypeKind::Bool => "bool",
            TypeKind::CharS => "char",
            TypeKind::UChar => "unsigned char",
            TypeKind::SChar => "signed char",
            TypeKind::Short => "short",
            TypeKind::UShort => "unsigned short",
            TypeKind::Int => "int",
            TypeKind::UInt => "unsigned int",
            TypeKind::Long => "long",
            TypeKind::ULong => "unsigned long",
            TypeKind::LongLong => "long long",
            TypeKind::ULongLong => "unsigned long long",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::LongDouble => "long double",
            _ => return None,
        };
        Some(spelling)
    }

    pub fn is_function(self) -> bool {
        matches!(self, TypeKind::FunctionProto | TypeKind::FunctionNoProto)
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            TypeKind::ConstantArray | TypeKind::IncompleteArray | TypeKind::VariableArray
        )
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.spelling())
    }
}

// ============================================================================
// Storage Classes
// ============================================================================

/// Storage class of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum StorageClass {
    /// Not a declaration
    Invalid,
    None,
    Extern,
    Static,
    PrivateExtern,
    Auto,
    Register,
}

impl StorageClass {
    /// Map a `storage_class_specifier` keyword; function specifiers such as
    /// `inline` and thread-storage keywords do not change the class.
    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "extern" => Some(StorageClass::Extern),
            "static" => Some(StorageClass::Static),
            "__private_extern__" => Some(StorageClass::PrivateExtern),
            "auto" => Some(StorageClass::Auto),
            "register" => Some(StorageClass::Register),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_kind_spelling_matches_libclang() {
        assert_eq!(CursorKind::FunctionDecl.spelling(), "FunctionDecl");
        assert_eq!(CursorKind::CxxMethod.spelling(), "CXXMethod");
        assert_eq!(CursorKind::TranslationUnit.to_string(), "TranslationUnit");
    }

    #[test]
    fn test_declaration_classification() {
        assert!(CursorKind::ParmDecl.is_declaration());
        assert!(CursorKind::ParmDecl.is_value_declaration());
        assert!(!CursorKind::StructDecl.is_value_declaration());
        assert!(!CursorKind::CallExpr.is_declaration());
        assert!(CursorKind::CallExpr.is_expression());
    }

    #[test]
    fn test_type_kind_builtin_spelling() {
        assert_eq!(TypeKind::CharS.spelling(), "Char_S");
        assert_eq!(TypeKind::ULongLong.builtin_spelling(), Some("unsigned long long"));
        assert_eq!(TypeKind::Pointer.builtin_spelling(), None);
    }

    #[test]
    fn test_storage_class_keywords() {
        assert_eq!(StorageClass::from_keyword("static"), Some(StorageClass::Static));
        assert_eq!(StorageClass::from_keyword("register"), Some(StorageClass::Register));
        assert_eq!(StorageClass::from_keyword("inline"), None);
    }
}
