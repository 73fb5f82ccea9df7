//! Filesystem map and URL access across connections


use anyhow::Result;
use common::*;
use std::sync::Arc;
use unifs::stream::StreamWrapper;
use unifs::{FilesystemMap, FsError};

fn two_backends() -> Result<TestContext> {
    TestContext::with_config(|builder, paths| {
        builder
            .local("disk", &paths.workspace)
            .memory("scratch")
            .default_connection("disk")
            .stream_protocol("app")
    })
}

#[tokio::test]
async fn test_map_holds_every_connection_in_order() -> Result<()> {
    let ctx = two_backends()?;
    let map = ctx.manager().filesystem_map().await?;

    let names: Vec<String> = map.entries().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["disk", "scratch"]);
    assert!(map.get("disk")?.is_local());
    assert!(map.get("nowhere").unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_name_rules() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    let map = FilesystemMap::new();

    map.set("backup-2024_eu", fs.clone())?;
    for bad in ["", "has space", "a/b", "a.b", "a:b"] {
        assert!(
            matches!(map.set(bad, fs.clone()), Err(FsError::InvalidArgument(_))),
            "{:?} should be rejected",
            bad
        );
    }

    map.remove("backup-2024_eu")?;
    assert!(map.remove("backup-2024_eu").unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_urls_dispatch_by_name() -> Result<()> {
    let ctx = two_backends()?;
    let wrapper = ctx.manager().stream_wrapper().await?;
    assert_eq!(wrapper.scheme(), "app");

    let mut stream = wrapper
        .open("app://scratch/notes/today.txt", "w")
        .await?
        .expect("new file opens under w");
    stream.write(b"in memory").await?;
    assert!(stream.close().await);

    let mut stream = wrapper
        .open("app://disk/today.txt", "x")
        .await?
        .expect("new file opens under x");
    stream.write(b"on disk").await?;
    assert!(stream.close().await);

    let map = wrapper.map();
    assert_content_str(&map.get("scratch")?, "notes/today.txt", "in memory").await;
    assert_file_content(&ctx.workspace().join("today.txt"), b"on disk");
    assert_not_exists(&map.get("disk")?, "notes/today.txt").await;

    assert_eq!(wrapper.read_dir("app://scratch/notes").await?, vec!["today.txt"]);
    let stat = wrapper
        .url_stat("app://disk/today.txt")
        .await?
        .expect("file exists");
    assert_eq!(stat.size, 7);
    Ok(())
}

#[tokio::test]
async fn test_bad_urls() -> Result<()> {
    let ctx = TestContext::memory()?;
    let map = Arc::new(FilesystemMap::new());
    map.set("mem", ctx.fs().await?)?;
    let wrapper = StreamWrapper::new("flysystem", map);

    for url in ["flysystem://mem", "flysystem:///a.txt", "ftp://mem/a.txt"] {
        assert!(
            matches!(wrapper.unlink(url).await, Err(FsError::InvalidPath(_))),
            "{} should be rejected",
            url
        );
    }
    assert!(wrapper.read_dir("flysystem://mem/").await?.is_empty());
    assert!(wrapper.unlink("flysystem://other/a.txt").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_cleared_map_resolves_nothing() -> Result<()> {
    let ctx = two_backends()?;
    let wrapper = ctx.manager().stream_wrapper().await?;
    wrapper.map().clear();
    assert!(wrapper.map().is_empty());
    assert!(matches!(
        wrapper.open("app://disk/a.txt", "w").await,
        Err(FsError::NotFound(_))
    ));
    Ok(())
}
