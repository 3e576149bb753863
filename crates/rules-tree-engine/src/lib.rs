pub mod codec;
pub mod io;
pub mod models;
pub mod parsing;
pub mod sync;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use codec::{Depth, PersistedTree};
pub use io::*;
pub use models::*;
pub use parsing::{HtmlError, ParseReport, ParsedRules, SourceLayout, parse_html_rules, parse_rules};
pub use sync::{
    ChangeSet, JsonFileStore, MemoryStore, RecordTable, SectionStore, StoreError, SyncError,
    SyncOutcome, SyncReport,
};
