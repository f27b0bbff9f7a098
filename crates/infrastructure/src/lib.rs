//! Concrete engines and adapters implementing the application-layer ports:
//! refreshable sources, the result cache, the rule-list matching engine,
//! hash storage, and the composite filter pipeline built on top of them.

pub mod composite_filter;
pub mod custom_filter;
pub mod dns_message;
pub mod hash_prefix_filter;
pub mod hash_storage;
pub mod refreshable_source;
pub mod result_cache;
pub mod rule_list;
pub mod safe_search_filter;
pub mod service_blocker;
pub mod storage;
pub mod txt_hash_server;

pub use composite_filter::{CompositeFilter, ListSource, ServiceSource};
pub use custom_filter::CustomFilterCache;
pub use dns_message::HickoryMessageBuilder;
pub use hash_prefix_filter::HashPrefixFilter;
pub use hash_storage::HashStorage;
pub use refreshable_source::RefreshableSource;
pub use result_cache::{CacheLookup, ResultCache};
pub use rule_list::RuleListEngine;
pub use safe_search_filter::SafeSearchFilter;
pub use service_blocker::ServiceBlocker;
pub use storage::Storage;
pub use txt_hash_server::TxtHashServer;
