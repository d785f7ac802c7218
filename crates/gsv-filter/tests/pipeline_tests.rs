//! End-to-end filter pipeline: raw store, durable cache, remote LFS storage.

use std::sync::Arc;

use gsv_filter::{ContentFilter, Filter};
use gsv_lfs::{
    InMemoryClientFactory, InMemoryLfsServer, LfsStorage, LfsWriter, Pointer, RemoteStorage,
};
use gsv_store::{InMemoryRawStore, JournalConfig, JournalMetadataStore, ObjectRef};
use gsv_types::Principal;
use tokio::io::AsyncReadExt;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn read_all(filter: &Filter, obj: &ObjectRef) -> Vec<u8> {
    let mut out = Vec::new();
    filter
        .open_stream(obj)
        .await
        .expect("open")
        .read_to_end(&mut out)
        .await
        .expect("read");
    out
}

#[tokio::test]
async fn cached_metadata_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cache.journal");
    let raw = Arc::new(InMemoryRawStore::new());
    let obj = ObjectRef::new("repo", raw.clone(), raw.insert(b"target/file.txt".to_vec()));

    let first = {
        let store = Arc::new(JournalMetadataStore::open(&path, JournalConfig::default()).expect("open"));
        let filter = Filter::link(store);
        filter.md5(&obj).await.expect("md5")
    };
    assert_eq!(raw.open_count(), 1);

    let store = Arc::new(JournalMetadataStore::open(&path, JournalConfig::default()).expect("reopen"));
    assert_eq!(store.len(), 1);
    let filter = Filter::link(store);
    assert_eq!(filter.md5(&obj).await.expect("md5"), first);
    assert_eq!(raw.open_count(), 1);
}

#[tokio::test]
async fn written_lfs_object_is_served_through_pointer() {
    init_tracing();
    let server = InMemoryLfsServer::new();
    let storage = Arc::new(RemoteStorage::new(Arc::new(InMemoryClientFactory::new(
        server.clone(),
    ))));

    let content = vec![0xAB; 70_000];
    let mut writer = storage.get_writer(&Principal::user("alice"));
    for chunk in content.chunks(8192) {
        writer.write(chunk).await.expect("write");
    }
    let oid = writer.finish().await.expect("finish");

    let hash = oid.strip_prefix(gsv_lfs::OID_PREFIX).expect("prefix");
    let pointer = Pointer::new(hash, content.len() as u64).expect("pointer");
    let raw = Arc::new(InMemoryRawStore::new());
    let obj = ObjectRef::new("repo", raw.clone(), raw.insert(pointer.to_bytes()));

    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        JournalMetadataStore::open(&dir.path().join("cache.journal"), JournalConfig::default())
            .expect("open"),
    );
    let filter = Filter::lfs(storage, store);

    assert_eq!(read_all(&filter, &obj).await, content);
    assert_eq!(filter.size(&obj).await.expect("size"), 70_000);
    assert_eq!(
        filter.content_hash(&obj).await.expect("hash"),
        format!("lfs {oid}")
    );

    let md5 = filter.md5(&obj).await.expect("md5");
    assert_eq!(md5.len(), 32);
    assert_eq!(filter.md5(&obj).await.expect("md5"), md5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_filters_agree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        JournalMetadataStore::open(&dir.path().join("cache.journal"), JournalConfig::default())
            .expect("open"),
    );
    let raw = Arc::new(InMemoryRawStore::new());
    let obj = ObjectRef::new("repo", raw.clone(), raw.insert(vec![1u8; 100_000]));
    let filter = Filter::raw(store.clone());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let filter = filter.clone();
            let obj = obj.clone();
            tokio::spawn(async move { filter.md5(&obj).await.expect("md5") })
        })
        .collect();
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.expect("join"));
    }
    assert!(values.iter().all(|v| v == &values[0]));
    assert_eq!(store.len(), 1);
}
