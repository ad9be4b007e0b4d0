//! Change-log access: path interning, cached revision data and the
//! text-log parser.

pub mod cache;
pub mod dictionary;
pub mod parser;
pub mod record;

pub use cache::{CachedLog, LogReceiver, LogSource, ProgressMonitor, RawChange, WcStatus};
pub use dictionary::{PathDictionary, PathIndex, TempPath};
pub use parser::LogFile;
pub use record::{ChangeAction, ChangeMask, ChangeRecord, Revision, StandardRevProps};
