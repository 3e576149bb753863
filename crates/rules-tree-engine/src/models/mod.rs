pub mod forest;
pub mod record;
pub mod section_number;

pub use forest::{NodeId, SectionForest, SectionNode};
pub use record::{Metadata, PersistedSection, RuleSetId, RuleSetIdError, SectionRecord};
pub use section_number::{Component, SectionNumber, SectionNumberError};
