//! Content filters for the git-as-svn object layer.
//!
//! A filter rewrites raw object bytes before they are served: symlink blobs
//! gain a `link ` marker, LFS pointer blobs are replaced by the large object
//! they name. The MD5 and size of filtered content are expensive to derive,
//! so they are cached per filter in the metadata store and computed at most
//! once per object (modulo concurrent first requests, where one value wins).
//!
//! # Filters
//!
//! - [`RawFilter`] (`raw`) -- identity
//! - [`LinkFilter`] (`link`) -- symlink special-file form
//! - [`LfsFilter`] (`lfs`) -- LFS pointer resolution
//! - [`Filter`] -- closed enum over the three

pub mod cache;
pub mod error;
pub mod filter;
pub mod lfs;
pub mod link;
pub mod metadata;
pub mod raw;

pub use cache::FilterCache;
pub use error::{FilterError, FilterResult};
pub use filter::{ContentFilter, Filter};
pub use lfs::LfsFilter;
pub use link::{LinkFilter, LINK_PREFIX};
pub use metadata::{get_md5, get_size};
pub use raw::RawFilter;
