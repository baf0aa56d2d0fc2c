//! Symbolic names handed to Lua
//!
//! The engine enums are `#[non_exhaustive]` and larger than what scripts
//! are promised, so each mapping ends in a fallback arm.

use luaclang_engine::{CursorKind, StorageClass, TypeKind};

/// Name returned by `cursor:getKind()`
pub fn cursor_kind_name(kind: CursorKind) -> &'static str {
    match kind {
        CursorKind::StructDecl => "StructDecl",
        CursorKind::UnionDecl => "UnionDecl",
        CursorKind::EnumDecl => "EnumDecl",
        CursorKind::FieldDecl => "FieldDecl",
        CursorKind::EnumConstantDecl => "EnumConstantDecl",
        CursorKind::FunctionDecl => "FunctionDecl",
        CursorKind::VarDecl => "VarDecl",
        CursorKind::ParmDecl => "ParmDecl",
        CursorKind::TypedefDecl => "TypedefDecl",
        CursorKind::IntegerLiteral => "IntegerLiteral",
        _ => "Unexposed",
    }
}

/// Name returned by `type:getKind()`
pub fn type_kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Invalid => "Invalid",
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
        TypeKind::Record => "Record",
        TypeKind::Enum => "Enum",
        TypeKind::Typedef => "Typedef",
        TypeKind::FunctionProto => "FunctionProto",
        TypeKind::FunctionNoProto => "FunctionNoProto",
        TypeKind::ConstantArray => "ConstantArray",
        TypeKind::IncompleteArray => "IncompleteArray",
        TypeKind::VariableArray => "VariableArray",
        _ => "Unexposed",
    }
}

/// Name returned by `cursor:getStorageClass()`
pub fn storage_class_name(class: StorageClass) -> &'static str {
    match class {
        StorageClass::Invalid => "Invalid",
        StorageClass::None => "None",
        StorageClass::Extern => "Extern",
        StorageClass::Static => "Static",
        StorageClass::PrivateExtern => "PrivateExtern",
        StorageClass::Auto => "Auto",
        StorageClass::Register => "Register",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_kinds_outside_the_set_fall_back() {
        assert_eq!(cursor_kind_name(CursorKind::FunctionDecl), "FunctionDecl");
        assert_eq!(cursor_kind_name(CursorKind::IntegerLiteral), "IntegerLiteral");
        assert_eq!(cursor_kind_name(CursorKind::CompoundStmt), "Unexposed");
        assert_eq!(cursor_kind_name(CursorKind::TranslationUnit), "Unexposed");
        assert_eq!(cursor_kind_name(CursorKind::ClassDecl), "Unexposed");
    }

    #[test]
    fn test_type_kinds() {
        assert_eq!(type_kind_name(TypeKind::CharS), "Char_S");
        assert_eq!(type_kind_name(TypeKind::ConstantArray), "ConstantArray");
        assert_eq!(type_kind_name(TypeKind::LValueReference), "Unexposed");
        assert_eq!(type_kind_name(TypeKind::Unexposed), "Unexposed");
    }

    #[test]
    fn test_storage_classes() {
        assert_eq!(storage_class_name(StorageClass::Static), "Static");
        assert_eq!(storage_class_name(StorageClass::None), "None");
        assert_eq!(storage_class_name(StorageClass::Invalid), "Invalid");
    }
}
