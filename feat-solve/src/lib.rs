//! Feature dependency resolution: walking a catalog's feature index into a
//! concrete set of resources, and expanding conditional feature fragments
//! once triggers are known to be satisfied.

mod error;
pub use error::Error;

mod resolver;
pub use resolver::{GreedyResolver, ResolveOutput, ResolveRequest, Resolver, bundle_identity};

mod conditional;
pub use conditional::ConditionalExpander;
