pub mod audit_records;
pub mod submissions;
pub mod submitters;
pub mod winning_entries;

pub use audit_records::AuditCategory;

pub use audit_records as audit_record_entity;
pub use submissions as submission_entity;
pub use submitters as submitter_entity;
pub use winning_entries as winning_entry_entity;
