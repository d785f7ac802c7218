//! Cached checksum and size of filtered content.
//!
//! A miss opens exactly one filtered stream and computes everything asked
//! for in a single pass. Results are stored with `put_if_absent`, so
//! concurrent misses on one key may both compute but only one value is kept.
//! Nothing is stored when the computation fails.

use gsv_store::{ObjectRef, ObjectStream};
use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::cache::FilterCache;
use crate::error::FilterResult;
use crate::filter::ContentFilter;

const BUFFER_SIZE: usize = 32 * 1024;

struct Metadata {
    size: u64,
    md5: Option<String>,
}

/// Filtered size of `obj`. With `need_md5`, a miss also records the MD5.
pub async fn get_size<F>(
    filter: &F,
    cache: &FilterCache,
    obj: &ObjectRef,
    need_md5: bool,
) -> FilterResult<u64>
where
    F: ContentFilter + ?Sized,
{
    if let Some(size) = cache.size(obj.hash())? {
        debug!(filter = filter.name(), object = %obj.hash(), "size cache hit");
        return Ok(size);
    }
    Ok(create_metadata(filter, cache, obj, need_md5, true).await?.size)
}

/// Filtered MD5 of `obj`. With `need_size`, a miss also records the size.
pub async fn get_md5<F>(
    filter: &F,
    cache: &FilterCache,
    obj: &ObjectRef,
    need_size: bool,
) -> FilterResult<String>
where
    F: ContentFilter + ?Sized,
{
    if let Some(md5) = cache.md5(obj.hash())? {
        debug!(filter = filter.name(), object = %obj.hash(), "md5 cache hit");
        return Ok(md5);
    }
    let metadata = create_metadata(filter, cache, obj, true, need_size).await?;
    Ok(metadata.md5.unwrap_or_default())
}

/// Filtered MD5 of `obj` computed from `stream`, which the caller has
/// already opened. Values are recorded as in [`get_md5`].
pub async fn md5_of_stream(
    filter_name: &str,
    cache: &FilterCache,
    obj: &ObjectRef,
    stream: ObjectStream,
    need_size: bool,
) -> FilterResult<String> {
    debug!(filter = filter_name, object = %obj.hash(), "computing filtered metadata");
    let metadata = drain(cache, obj, stream, true, need_size).await?;
    Ok(metadata.md5.unwrap_or_default())
}

async fn create_metadata<F>(
    filter: &F,
    cache: &FilterCache,
    obj: &ObjectRef,
    with_md5: bool,
    with_size: bool,
) -> FilterResult<Metadata>
where
    F: ContentFilter + ?Sized,
{
    debug!(filter = filter.name(), object = %obj.hash(), "computing filtered metadata");
    let stream = filter.open_stream(obj).await?;
    drain(cache, obj, stream, with_md5, with_size).await
}

async fn drain(
    cache: &FilterCache,
    obj: &ObjectRef,
    mut stream: ObjectStream,
    with_md5: bool,
    with_size: bool,
) -> FilterResult<Metadata> {
    let mut digest = with_md5.then(Md5::new);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut size = 0u64;
    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        if let Some(digest) = digest.as_mut() {
            digest.update(&buffer[..n]);
        }
        size += n as u64;
    }

    let md5 = digest.map(|d| hex::encode(d.finalize()));
    if let Some(md5) = &md5 {
        cache.put_md5(obj.hash(), md5)?;
    }
    if with_size {
        cache.put_size(obj.hash(), size)?;
    }
    Ok(Metadata { size, md5 })
}
