pub mod node;
pub mod path;
pub mod resolver;

pub use node::{Entry, VirtualNode};
pub use path::VirtualPath;
pub use resolver::{PathResolver, Resolution};
