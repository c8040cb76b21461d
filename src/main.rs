use anyhow::Context;
use std::fs::File;
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gcs_client::config;
use gcs_client::resource::{DeleteObjectOptions, ListBucketsOptions, ListObjectsOptions};
use gcs_client::{GcsClient, Mode, ObjectFile, RetryParams};

const USAGE: &str = "Usage:
  gcs-client get <bucket> <object> [local]
  gcs-client put <local> <bucket> <object>
  gcs-client ls <bucket> [prefix]
  gcs-client buckets <project>
  gcs-client rm <bucket> <object>";

/// Download an object to a file or stdout / 下载对象
fn get(client: &GcsClient, bucket: &str, object: &str, local: Option<&str>) -> anyhow::Result<()> {
    let mut file = ObjectFile::open(client, bucket, object, Mode::Read)?;
    let copied = match local {
        Some(path) => {
            let mut out = File::create(path).with_context(|| format!("Failed to create {}", path))?;
            io::copy(&mut file, &mut out)?
        }
        None => io::copy(&mut file, &mut io::stdout().lock())?,
    };
    file.close()?;
    tracing::info!("Downloaded {} bytes from gs://{}/{}", copied, bucket, object);
    Ok(())
}

/// Upload a local file / 上传本地文件
fn put(client: &GcsClient, local: &str, bucket: &str, object: &str) -> anyhow::Result<()> {
    let mut src = File::open(local).with_context(|| format!("Failed to open {}", local))?;
    let mut file = ObjectFile::open(client, bucket, object, Mode::Write)?;
    let copied = io::copy(&mut src, &mut file)?;
    file.close()?;
    tracing::info!("Uploaded {} bytes to gs://{}/{}", copied, bucket, object);
    Ok(())
}

fn ls(client: &GcsClient, bucket: &str, prefix: Option<&str>) -> anyhow::Result<()> {
    let options = ListObjectsOptions {
        prefix: prefix.map(str::to_string),
        delimiter: Some("/".to_string()),
        ..Default::default()
    };
    for entry in client.bucket(bucket).list(options)? {
        println!("{}", entry.display_name());
    }
    Ok(())
}

fn buckets(client: &GcsClient, project: &str) -> anyhow::Result<()> {
    for bucket in client.project(project).list(ListBucketsOptions::default())? {
        println!("{}", bucket.name());
    }
    Ok(())
}

fn rm(client: &GcsClient, bucket: &str, object: &str) -> anyhow::Result<()> {
    client.object(bucket, object).delete(DeleteObjectOptions::default())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcs_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Load configuration / 加载配置
    let app_config = config::init_config()?.read().clone();
    RetryParams::set_default(app_config.retry.clone());
    let client = GcsClient::from_config(&app_config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["get", bucket, object] => get(&client, bucket, object, None),
        ["get", bucket, object, local] => get(&client, bucket, object, Some(*local)),
        ["put", local, bucket, object] => put(&client, local, bucket, object),
        ["ls", bucket] => ls(&client, bucket, None),
        ["ls", bucket, prefix] => ls(&client, bucket, Some(*prefix)),
        ["buckets", project] => buckets(&client, project),
        ["rm", bucket, object] => rm(&client, bucket, object),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}
