//! Parser sessions
//!
//! A `Session` owns one index and the translation unit parsed from one
//! source file. Cursors and types derived from it share its `UnitSlot`, so
//! disposing the session is visible through every derived handle.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use luaclang_engine::{Diagnostic, Index, SourceLanguage, TranslationUnit};

use crate::config::SessionOptions;
use crate::cursor::Cursor;
use crate::error::{BindingError, BindingResult};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Native resources of one session, shared with derived handles
pub(crate) struct UnitSlot {
    id: u64,
    path: PathBuf,
    index: RefCell<Option<Index>>,
    unit: RefCell<Option<Rc<TranslationUnit>>>,
}

impl UnitSlot {
    /// The live translation unit, or `UseAfterDispose` naming `what` was used
    pub(crate) fn unit(&self, what: &'static str) -> BindingResult<Rc<TranslationUnit>> {
        self.unit
            .borrow()
            .clone()
            .ok_or(BindingError::UseAfterDispose { what })
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.unit.borrow().is_none()
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// An owned parse of one source file
pub struct Session {
    slot: Rc<UnitSlot>,
}

impl Session {
    /// Create an index and parse `path` with it
    pub fn open(path: impl AsRef<Path>, options: &SessionOptions) -> BindingResult<Self> {
        let path = path.as_ref();
        let readable = path.is_file() && std::fs::File::open(path).is_ok();
        if !readable {
            return Err(BindingError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut index = Index::new(options.index_options())
            .map_err(|e| BindingError::from_engine(path.to_path_buf(), e))?;
        let unit = index
            .parse(path, &options.parse_options())
            .map_err(|e| BindingError::from_engine(path.to_path_buf(), e))?;

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            session = id,
            file = %path.display(),
            entities = unit.entity_count(),
            diagnostics = unit.diagnostics().len(),
            "parser created"
        );

        Ok(Self {
            slot: Rc::new(UnitSlot {
                id,
                path: path.to_path_buf(),
                index: RefCell::new(Some(index)),
                unit: RefCell::new(Some(Rc::new(unit))),
            }),
        })
    }

    /// Open a session, run `f`, and dispose the session afterwards
    pub fn scoped<T>(
        path: impl AsRef<Path>,
        options: &SessionOptions,
        f: impl FnOnce(&Session) -> T,
    ) -> BindingResult<T> {
        let session = Self::open(path, options)?;
        let result = f(&session);
        session.dispose();
        Ok(result)
    }

    pub fn id(&self) -> u64 {
        self.slot.id
    }

    pub fn path(&self) -> &Path {
        &self.slot.path
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.is_disposed()
    }

    /// Release the translation unit, then the index. Later calls are no-ops.
    pub fn dispose(&self) {
        let unit = self.slot.unit.borrow_mut().take();
        let index = self.slot.index.borrow_mut().take();
        if unit.is_none() && index.is_none() {
            return;
        }

        drop(unit);
        drop(index);
        tracing::debug!(
            session = self.slot.id,
            file = %self.slot.path.display(),
            "parser disposed"
        );
    }

    /// Cursor for the translation unit
    pub fn root_cursor(&self) -> BindingResult<Option<Cursor>> {
        let unit = self.slot.unit("parser")?;
        Ok(Some(Cursor::new(self.slot.clone(), unit.root())))
    }

    pub fn diagnostics(&self) -> BindingResult<Vec<Diagnostic>> {
        Ok(self.slot.unit("parser")?.diagnostics().to_vec())
    }

    pub fn language(&self) -> BindingResult<SourceLanguage> {
        Ok(self.slot.unit("parser")?.language())
    }

    pub(crate) fn same_session(&self, other: &Session) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.slot.id)
            .field("path", &self.slot.path)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_open_and_dispose() {
        let file = source_file("int x;");
        let session = Session::open(file.path(), &SessionOptions::default()).unwrap();
        assert!(!session.is_disposed());
        assert!(session.root_cursor().unwrap().is_some());

        session.dispose();
        assert!(session.is_disposed());
        let err = session.root_cursor().unwrap_err();
        assert_eq!(err.code(), "UseAfterDispose");

        // second dispose is a no-op
        session.dispose();
        assert!(session.is_disposed());
    }

    #[test]
    fn test_missing_file() {
        let err = Session::open("/no/such/file.c", &SessionOptions::default()).unwrap_err();
        assert_eq!(err.code(), "FileNotFound");

        let dir = tempfile::tempdir().unwrap();
        let err = Session::open(dir.path(), &SessionOptions::default()).unwrap_err();
        assert_eq!(err.code(), "FileNotFound");
    }

    #[test]
    fn test_unknown_extension_is_parse_failure() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"int x;").unwrap();
        let err = Session::open(file.path(), &SessionOptions::default()).unwrap_err();
        assert_eq!(err.code(), "ParseFailed");

        let options = SessionOptions {
            language: Some(SourceLanguage::C),
            ..SessionOptions::default()
        };
        assert!(Session::open(file.path(), &options).is_ok());
    }

    #[test]
    fn test_syntax_errors_fail_without_keep_going() {
        let file = source_file("int broken( {");
        let options = SessionOptions {
            keep_going: false,
            ..SessionOptions::default()
        };
        let err = Session::open(file.path(), &options).unwrap_err();
        assert_eq!(err.code(), "ParseFailed");

        let session = Session::open(file.path(), &SessionOptions::default()).unwrap();
        assert!(!session.diagnostics().unwrap().is_empty());
    }

    #[test]
    fn test_scoped_disposes() {
        let file = source_file("int x;");
        let cursor = Session::scoped(file.path(), &SessionOptions::default(), |session| {
            session.root_cursor().unwrap().unwrap()
        })
        .unwrap();
        assert_eq!(cursor.spelling().unwrap_err().code(), "UseAfterDispose");
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let file = source_file("int x;");
        let a = Session::open(file.path(), &SessionOptions::default()).unwrap();
        let b = Session::open(file.path(), &SessionOptions::default()).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!a.same_session(&b));
        assert!(a.same_session(&a));
    }

    #[test]
    fn test_drop_disposes_derived_handles() {
        let file = source_file("int x;");
        let session = Session::open(file.path(), &SessionOptions::default()).unwrap();
        let root = session.root_cursor().unwrap().unwrap();
        drop(session);
        assert_eq!(root.kind().unwrap_err().code(), "UseAfterDispose");
    }
}
