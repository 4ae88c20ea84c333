// Catalog browsing
pub mod breadcrumb;
pub mod catalog;
pub mod category_tree;

// Search index integration
pub mod search;

// Payment gateway and order confirmation
pub mod alipay;
pub mod payments;

// Batch import from the document store export
pub mod import;
