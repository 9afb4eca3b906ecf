//! Client-declared roots: parsing, resolution, and the session capability.
//!
//! A root like `https://github.com/octocat/hello-world` narrows a session to
//! one repository; `https://github.com/octocat` narrows it to one owner.

pub mod parser;
pub mod resolver;
pub mod session;
pub mod types;

pub use parser::{parse_root_uri, split_root_uri};
pub use resolver::{distinct_owners, resolve_roots, RootResolver};
pub use session::{PeerRootsSession, RootsSession, StaticRootsSession};
pub use types::{DeclaredRoot, Root, DEFAULT_HOST};
