use std::error::Error;
use std::fs;
use std::path::{Component, Path};

use clap::Parser;
use log::{debug, info};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use remote::mem::MemoryStore;
use remote::{Discovery, ManifestDescriptor, Publisher, Tag, APP_TAG, OWNER_TAG};
use wcore::key::{PrivateKey, PublicKey};

use warc::tree::{Handle, ROOT};
use warc::{media, Artifact, CancelToken, Envelope, Manifest};

mod cli;
use crate::cli::{format_size, parse_config, Cli, CliError, Commands, Config};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Parse the cli
    let cli = Cli::parse();

    let config = match &cli.config {
        None => Config::default(),
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
    };
    debug!("config: {:?}", config);

    let envelope = Envelope::new(config.envelope.clone())?;

    match cli.command {
        Commands::Pack {
            paths,
            to,
            title,
            tags,
            memo,
            out,
        } => {
            let recipient = PublicKey::from_pem(&fs::read_to_string(to)?)?;
            let title = match title {
                Some(t) => t,
                None => paths
                    .first()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };

            let mut manifest = Manifest::new(&title);
            manifest.tags = tags;
            manifest.memo = memo;
            manifest.created = Some(OffsetDateTime::now_utc());
            for path in paths.iter() {
                let handle = Handle::from_path(path, config.follow_links)?;
                manifest.tree.add_handle(ROOT, handle)?;
            }

            let mut progress = |path: &str, fraction: f64| {
                if fraction >= 1.0 {
                    info!("read {}", path);
                }
            };
            let bytes = envelope.build_artifact(&mut manifest, &recipient, &CancelToken::new(), &mut progress)?;
            fs::write(&out, &bytes)?;
            println!(
                "{}: {} of files in a {} artifact for {}",
                out.display(),
                format_size(manifest.tree.total_size()),
                format_size(bytes.len() as u64),
                recipient.address()
            );
        }
        Commands::Unpack { file, key, out } => {
            let key = PrivateKey::from_pem(&fs::read_to_string(key)?)?;
            let artifact = open_file(&envelope, &file, &key)?;
            let written = write_files(&artifact, &out)?;
            println!("{} files written to {}", written, out.display());
        }
        Commands::List { file, key } => {
            let key = PrivateKey::from_pem(&fs::read_to_string(key)?)?;
            let artifact = open_file(&envelope, &file, &key)?;
            print!("{}", describe(&artifact)?);
        }
        Commands::Push { file, owner } => {
            let owner = PublicKey::from_pem(&fs::read_to_string(owner)?)?;
            let bytes = fs::read(&file)?;

            let mut store = MemoryStore::new(Some(&config.store.to_string_lossy()))?;
            let tags = [
                Tag::new(APP_TAG, &config.app_tag),
                Tag::new(OWNER_TAG, &owner.address()),
            ];
            let id = store.publish(&bytes, &tags)?;
            println!("{}", id);
        }
        Commands::Fetch { id, key, out } => {
            let key = PrivateKey::from_pem(&fs::read_to_string(key)?)?;
            let store = MemoryStore::new(Some(&config.store.to_string_lossy()))?;

            let descriptor = store
                .descriptors(&key.public_key().address(), &config.app_tag, config.leading_chunk)?
                .into_iter()
                .find(|d| d.id == id)
                .ok_or_else(|| CliError::NotFound(id.clone()))?;

            let mut artifact = Artifact::new(descriptor);
            artifact.open(&envelope, &key)?;

            let mut progress = |label: &str, fraction: f64| info!("{}: {:.1}%", label, fraction * 100.0);
            artifact.fetch_remaining(&envelope, &store, &CancelToken::new(), &mut progress)?;

            let written = write_files(&artifact, &out)?;
            println!("{}: {} files written to {}", artifact.title(), written, out.display());
        }
    }
    Ok(())
}

fn open_file(envelope: &Envelope, file: &Path, key: &PrivateKey) -> Result<Artifact, Box<dyn Error>> {
    let bytes = fs::read(file)?;
    let mut artifact = Artifact::new(ManifestDescriptor::whole(&file.to_string_lossy(), bytes));
    artifact.open(envelope, key)?;
    Ok(artifact)
}

/// Write every file of a content-ready artifact below `out`.
fn write_files(artifact: &Artifact, out: &Path) -> Result<usize, Box<dyn Error>> {
    let files = artifact.files()?;

    for file in files.iter() {
        let relative = Path::new(&file.path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(CliError::UnsafePath(file.path.clone()).into());
        }

        let target = out.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = artifact.file_bytes(&file.path).map_err(|_| CliError::Incomplete)?;
        fs::write(&target, bytes)?;
        debug!("wrote {} ({})", target.display(), format_size(file.size));
    }
    Ok(files.len())
}

fn describe(artifact: &Artifact) -> Result<String, Box<dyn Error>> {
    let manifest = artifact.manifest().ok_or(CliError::Incomplete)?;

    let mut out = format!("title: {}\n", manifest.title);
    if !manifest.tags.is_empty() {
        out.push_str(&format!("tags: {}\n", manifest.tags.join(", ")));
    }
    if !manifest.memo.is_empty() {
        out.push_str(&format!("memo: {}\n", manifest.memo));
    }
    if let Some(created) = manifest.created {
        out.push_str(&format!("created: {}\n", created.format(&Rfc3339)?));
    }
    out.push_str(&format!("size: {}\n", format_size(manifest.tree.total_size())));

    for file in artifact.files()? {
        let kind = media::infer(&file.path).kind;
        out.push_str(&format!("  {:>10}  {:<6}  {}\n", format_size(file.size), kind, file.path));
    }
    Ok(out)
}

#[cfg(test)]
mod test_main {
    use super::*;
    use warc::tree::Source;
    use warc::{EnvelopeConfig, NoProgress};

    const RECIPIENT: &str = include_str!("../warc/tests/fixtures/recipient.pem");

    fn sealed(key: &PrivateKey) -> Vec<u8> {
        let mut manifest = Manifest::new("notes");
        manifest.tags = vec!["work".to_string()];
        manifest.memo = "for later".to_string();
        let dir = manifest.tree.add_dir(ROOT, "docs").unwrap();
        manifest.tree.add_source(dir, "a.txt", Source::Bytes(b"alpha".to_vec())).unwrap();
        manifest.tree.add_source(ROOT, "b.bin", Source::Bytes(vec![7; 2048])).unwrap();

        Envelope::new(EnvelopeConfig::default())
            .unwrap()
            .build_artifact(&mut manifest, &key.public_key(), &CancelToken::new(), &mut NoProgress)
            .unwrap()
    }

    #[test]
    fn unpack_writes_tree() {
        let key = PrivateKey::from_pem(RECIPIENT).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.wbx");
        fs::write(&file, sealed(&key)).unwrap();

        let envelope = Envelope::new(EnvelopeConfig::default()).unwrap();
        let artifact = open_file(&envelope, &file, &key).unwrap();
        let out = dir.path().join("out");
        assert_eq!(write_files(&artifact, &out).unwrap(), 2);

        assert_eq!(fs::read(out.join("docs/a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(out.join("b.bin")).unwrap(), vec![7; 2048]);
    }

    #[test]
    fn listing() {
        let key = PrivateKey::from_pem(RECIPIENT).unwrap();
        let envelope = Envelope::new(EnvelopeConfig::default()).unwrap();
        let mut artifact = Artifact::new(ManifestDescriptor::whole("x", sealed(&key)));
        artifact.open(&envelope, &key).unwrap();

        let text = describe(&artifact).unwrap();
        assert!(text.starts_with("title: notes\ntags: work\nmemo: for later\n"));
        assert!(text.contains("size: 2.00KB\n"));
        assert!(text.contains("      5B  text    docs/a.txt\n"));
        assert!(text.contains("2.00KB  binary  b.bin\n"));
    }

    #[test]
    fn store_roundtrip() {
        let key = PrivateKey::from_pem(RECIPIENT).unwrap();
        let envelope = Envelope::new(EnvelopeConfig::default()).unwrap();
        let mut store = MemoryStore::new(None).unwrap();

        let owner = key.public_key().address();
        let tags = [Tag::new(APP_TAG, "weavebox-v0"), Tag::new(OWNER_TAG, &owner)];
        let id = store.publish(&sealed(&key), &tags).unwrap();

        let descriptor = store
            .descriptors(&owner, "weavebox-v0", 600)
            .unwrap()
            .into_iter()
            .find(|d| d.id == id)
            .unwrap();
        let mut artifact = Artifact::new(descriptor);
        artifact.open(&envelope, &key).unwrap();
        artifact
            .fetch_remaining(&envelope, &store, &CancelToken::new(), &mut NoProgress)
            .unwrap();
        assert_eq!(artifact.file_bytes("docs/a.txt").unwrap(), b"alpha");
    }
}
