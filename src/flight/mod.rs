//! Single-Flight Module
//!
//! Collapses concurrent identical requests into one underlying execution.
//!
//! - [`SingleFlight`]: coalesces calls within one coordinator instance
//! - [`DistributedSingleFlight`]: coalesces calls across processes through a
//!   [`JobQueue`] with unique job ids, falling back to direct execution when
//!   the queue is unavailable
//!
//! The layers compose explicitly around a plain async operation:
//!
//! ```rust,ignore
//! users
//!     .get_or_load(&id, || local.run("get_user", &id, move || {
//!         let distributed = distributed.clone();
//!         async move { distributed.run("get_user", &id, || fetch_user(id)).await }
//!     }))
//!     .await
//! ```

mod distributed;
mod local;
mod queue;

use serde::Serialize;

pub use distributed::DistributedSingleFlight;
pub use local::SingleFlight;
pub use queue::{typed_processor, InMemoryJobQueue, JobHandle, JobOutcome, JobProcessor, JobQueue};

/// Identity of a call: `operation:json(args)`.
pub fn request_key<A: Serialize + ?Sized>(operation: &str, args: &A) -> serde_json::Result<String> {
    Ok(format!("{}:{}", operation, serde_json::to_string(args)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key() {
        assert_eq!(request_key("get_user", &(42,)).unwrap(), "get_user:[42]");
        assert_eq!(request_key("search", &("bob", 2)).unwrap(), "search:[\"bob\",2]");
        assert_eq!(request_key("list", &()).unwrap(), "list:null");
    }

    #[test]
    fn test_request_key_rejects_non_string_map_keys() {
        let mut args = std::collections::HashMap::new();
        args.insert(vec![1], 1);
        assert!(request_key("op", &args).is_err());
    }
}
