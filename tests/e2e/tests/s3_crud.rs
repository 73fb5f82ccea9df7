//! CRUD against an S3 compatible server
//!
//! Runs only when `MINIO_ENDPOINT` is set; credentials come from the usual
//! `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` variables.


use anyhow::Result;
use common::*;

const BUCKET: &str = "unifs-e2e";

async fn s3_context() -> Result<Option<TestContext>> {
    let Some(endpoint) = minio_endpoint() else {
        eprintln!("MINIO_ENDPOINT not set, skipping");
        return Ok(None);
    };
    ensure_bucket(&endpoint, BUCKET).await?;
    let prefix = random_filename("run");
    let ctx = TestContext::with_config(|builder, _| {
        builder
            .s3("bucket", &endpoint, BUCKET, &prefix)
            .default_connection("bucket")
    })?;
    Ok(Some(ctx))
}

#[tokio::test]
async fn test_s3_put_read_delete() -> Result<()> {
    let Some(ctx) = s3_context().await? else {
        return Ok(());
    };
    let fs = ctx.fs().await?;

    fs.put("docs/a.txt", "hello").await?;
    assert_exists(&fs, "docs/a.txt").await;
    assert_content_str(&fs, "docs/a.txt", "hello").await;
    assert_size(&fs, "docs/a.txt", 5).await;
    assert_eq!(fs.checksum("docs/a.txt").await?, "5d41402abc4b2a76b9719d911017c592");

    assert!(fs.delete("docs/a.txt").await?);
    assert_not_exists(&fs, "docs/a.txt").await;
    Ok(())
}

#[tokio::test]
async fn test_s3_move_and_listing() -> Result<()> {
    let Some(ctx) = s3_context().await? else {
        return Ok(());
    };
    let fs = ctx.fs().await?;

    fs.put("in/one.txt", "1").await?;
    fs.put("in/two.txt", "2").await?;
    fs.move_file("in/one.txt", "out/one.txt").await?;

    assert_eq!(fs.get_files("in", false).await?, vec!["in/two.txt"]);
    assert_content_str(&fs, "out/one.txt", "1").await;
    assert!(fs.delete_dir("in").await?);
    assert_not_exists(&fs, "in/two.txt").await;
    Ok(())
}

#[tokio::test]
async fn test_s3_stream_buffer_append() -> Result<()> {
    let Some(ctx) = s3_context().await? else {
        return Ok(());
    };
    let fs = ctx.fs().await?;
    fs.put("log.txt", "first\n").await?;

    let mut stream = fs.create_stream("log.txt")?;
    assert!(stream.open(&"a".parse()?).await?);
    stream.write(b"second\n").await?;
    assert!(stream.close().await);

    assert_content_str(&fs, "log.txt", "first\nsecond\n").await;
    Ok(())
}

#[tokio::test]
async fn test_s3_large_object() -> Result<()> {
    let Some(ctx) = s3_context().await? else {
        return Ok(());
    };
    let fs = ctx.fs().await?;
    let data = random_bytes(6 * 1024 * 1024 + 3);

    fs.put("big.bin", data.clone()).await?;
    assert_content(&fs, "big.bin", &data).await;
    Ok(())
}
