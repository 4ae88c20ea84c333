//! Relational schema of the storefront.
//!
//! Categories form a tree of at most three levels addressed by integer ids; a
//! channel attaches a top-level category to a navigation group and URL.

pub mod category;
pub mod channel;
pub mod keyword;
pub mod order_info;
pub mod payment;
pub mod sku;
