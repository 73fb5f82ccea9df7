//! Convenience operations layered over the adapter calls


use anyhow::Result;
use common::*;
use test_case::test_case;
use unifs::filesystem::{ChecksumAlgorithm, SYNTHETIC_PERMISSIONS};
use unifs::{FsError, UploadedFile};

#[tokio::test]
async fn test_checksum_of_known_content() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    fs.put("hello.txt", "hello").await?;

    assert_eq!(fs.checksum("hello.txt").await?, "5d41402abc4b2a76b9719d911017c592");
    assert_eq!(
        fs.checksum_with("hello.txt", ChecksumAlgorithm::Sha256).await?,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert!(fs.checksum("missing.txt").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_checksum_matches_across_backends() -> Result<()> {
    let ctx = TestContext::with_config(|builder, paths| {
        builder.local("disk", &paths.workspace).memory("mem").default_connection("disk")
    })?;
    let data = random_bytes(300 * 1024);
    let disk = ctx.connection("disk").await?;
    let mem = ctx.connection("mem").await?;
    disk.put("blob.bin", data.clone()).await?;
    mem.put("blob.bin", data).await?;

    assert_eq!(disk.checksum("blob.bin").await?, mem.checksum("blob.bin").await?);
    Ok(())
}

#[test_case("/a/b/c", "/a/b", "./c" ; "child")]
#[test_case("/a/x", "/a/b/c", "../../x" ; "cousin")]
#[test_case("/a/b", "/a/b", "." ; "same")]
#[test_case("a/b/c/d", "a", "./b/c/d" ; "deep child")]
#[tokio::test]
async fn test_relative_path(path: &str, from: &str, expected: &str) -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    assert_eq!(fs.relative_path(path, from)?, expected);
    Ok(())
}

#[tokio::test]
async fn test_touch_and_permissions_on_local_disk() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    let on_disk = ctx.workspace().join("touched.txt");

    assert!(fs.touch("touched.txt", None).await?);
    assert!(on_disk.exists());
    assert_file_mode(&on_disk, 0o664);

    assert!(fs.set_permissions("touched.txt", 0o600).await?);
    assert_file_mode(&on_disk, 0o600);
    assert_eq!(fs.get_permissions("touched.txt").await? & 0o7777, 0o600);

    assert!(fs.touch("touched.txt", Some(0o640)).await?);
    assert_file_mode(&on_disk, 0o640);
    Ok(())
}

#[tokio::test]
async fn test_directory_permissions_keep_directory_bits() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    fs.create_dir("docs").await?;

    assert!(fs.set_permissions("docs", 0o700).await?);
    assert_file_mode(&ctx.workspace().join("docs"), 0o775);
    Ok(())
}

#[tokio::test]
async fn test_permissions_off_local_disk() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    fs.put("a.txt", "x").await?;

    assert_eq!(fs.get_permissions("a.txt").await?, SYNTHETIC_PERMISSIONS);
    assert!(!fs.set_permissions("a.txt", 0o600).await?);
    assert!(!fs.touch("a.txt", None).await?);
    assert!(!fs.create_symlink("a.txt", &ctx.scratch().join("link")).await?);
    assert!(matches!(
        fs.local_filename("a.txt").await,
        Err(FsError::NotSupported(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_symlink_into_workspace() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    fs.put("target.txt", "linked").await?;
    let link = ctx.scratch().join("link.txt");

    assert!(fs.create_symlink("target.txt", &link).await?);
    assert_is_symlink(&link);
    assert_file_content(&link, b"linked");
    assert!(fs
        .create_symlink("absent.txt", &ctx.scratch().join("dangling"))
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_local_filename_and_shared_get() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    fs.put("dir/data.txt", "shared").await?;

    let full = fs.local_filename("dir/data.txt").await?;
    assert_eq!(full, ctx.workspace().join("dir/data.txt"));
    assert_eq!(&fs.shared_get("dir/data.txt").await?[..], b"shared");
    assert!(fs.local_filename("dir/none.txt").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_uploads_keep_their_extension() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    let spool = ctx.scratch().join("spool-8f3a.tmp");
    std::fs::write(&spool, b"%PDF-1.7")?;
    let upload = UploadedFile::new(&spool).with_original_name("Quarterly Report.pdf");

    let stored = fs.put_file("uploads", &upload).await?;
    assert!(stored.starts_with("uploads/"));
    assert!(stored.ends_with(".pdf"));
    assert_eq!(stored.len(), "uploads/".len() + 32 + ".pdf".len());
    assert_content(&fs, &stored, b"%PDF-1.7").await;

    let named = fs.put_file_as("uploads", &upload, "report.pdf").await?;
    assert_eq!(named, "uploads/report.pdf");

    assert!(fs.put("inbox", upload).await?);
    let inbox = fs.get_files("inbox", false).await?;
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].ends_with(".pdf"));
    Ok(())
}

#[tokio::test]
async fn test_listing_helpers() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    for path in ["logs/2024/jan.txt", "logs/2024/feb.log", "logs/readme.txt", "top.txt"] {
        fs.put(path, "x").await?;
    }

    let mut files = fs.get_files("logs", true).await?;
    files.sort();
    assert_eq!(files, vec!["logs/2024/feb.log", "logs/2024/jan.txt", "logs/readme.txt"]);
    assert_eq!(fs.get_directories("logs", false).await?, vec!["logs/2024"]);

    let mut texts = fs.glob("logs/**/*.txt").await?;
    texts.sort();
    assert_eq!(texts, vec!["logs/2024/jan.txt", "logs/readme.txt"]);
    assert_eq!(fs.glob("*.txt").await?, vec!["top.txt"]);
    assert!(matches!(fs.glob("logs/[").await, Err(FsError::InvalidArgument(_))));
    Ok(())
}

#[tokio::test]
async fn test_type_checks_never_fail() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    fs.put("dir/file.txt", "x").await?;

    assert!(fs.is_directory("").await);
    assert!(fs.is_directory("dir").await);
    assert!(!fs.is_directory("dir/file.txt").await);
    assert!(fs.is_file("dir/file.txt").await);
    assert!(!fs.is_file("dir").await);
    assert!(!fs.is_file("nothing").await);
    assert!(!fs.is_directory("../escape").await);
    Ok(())
}
