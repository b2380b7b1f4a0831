//! Object storage for persisted workspace files.
//!
//! [`LocalObjectStore`] keeps objects on the filesystem under
//! `<root>/<bucket>/<key>` and issues `file://` access URLs carrying an
//! expiry and a keyed BLAKE3 signature. [`LocalObjectStore::resolve`]
//! verifies such a URL and returns the object's bytes.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use url::Url;

use crate::error::{Error, Result};

/// A time-limited read URL for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: Url,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}

/// Storage backend for workspace artifacts.
pub trait ObjectStore: Send + Sync {
    /// URI scheme of object identifiers, e.g. `s3` or `file`.
    fn scheme(&self) -> &str;

    /// Upload a local file, returning the number of bytes stored.
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<u64>;

    /// Issue a read URL valid for `ttl`.
    fn presigned_read_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<PresignedUrl>;

    /// Permanent identifier of an object.
    fn object_uri(&self, bucket: &str, key: &str) -> String {
        format!("{}://{}/{}", self.scheme(), bucket, key)
    }
}

/// Filesystem-backed object store.
pub struct LocalObjectStore {
    root: PathBuf,
    signing_key: [u8; 32],
}

impl LocalObjectStore {
    /// Open a store rooted at `root` with a random signing key.
    ///
    /// URLs issued by one instance only verify against the same instance.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let seed = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        Self::with_signing_secret(root, &seed)
    }

    /// Open a store whose signing key is derived from `secret`.
    pub fn with_signing_secret(root: impl AsRef<Path>, secret: &str) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        let root = std::path::absolute(root.as_ref())?;
        let signing_key = blake3::derive_key("mercury local object store v1", secret.as_bytes());
        Ok(Self { root, signing_key })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of an object.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    /// Verify a URL issued by [`presigned_read_url`](ObjectStore::presigned_read_url)
    /// and read the object it names.
    pub fn resolve(&self, url: &Url) -> Result<Vec<u8>> {
        let mut bucket = None;
        let mut key = None;
        let mut expires = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "bucket" => bucket = Some(value.into_owned()),
                "key" => key = Some(value.into_owned()),
                "expires" => expires = Some(value.into_owned()),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let (Some(bucket), Some(key), Some(expires), Some(signature)) = (bucket, key, expires, signature)
        else {
            return Err(Error::InvalidSignature);
        };
        let expires: u64 = expires.parse().map_err(|_| Error::InvalidSignature)?;
        let provided = blake3::Hash::from_hex(signature.as_bytes()).map_err(|_| Error::InvalidSignature)?;

        // blake3::Hash equality is constant time
        if provided != self.sign(&bucket, &key, expires) {
            return Err(Error::InvalidSignature);
        }
        if unix_now() > expires {
            return Err(Error::ExpiredUrl);
        }

        let path = self.object_path(&bucket, &key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::ObjectNotFound { bucket, key }),
            Err(e) => Err(e.into()),
        }
    }

    fn sign(&self, bucket: &str, key: &str, expires: u64) -> blake3::Hash {
        let message = format!("{}\n{}\n{}", bucket, key, expires);
        blake3::keyed_hash(&self.signing_key, message.as_bytes())
    }
}

impl ObjectStore for LocalObjectStore {
    fn scheme(&self) -> &str {
        "file"
    }

    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<u64> {
        let target = self.object_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        // Copy then rename so readers never observe a partial object
        let staging = target.with_extension(format!("upload-{}", uuid::Uuid::new_v4()));
        let size = fs::copy(local_path, &staging)?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        tracing::debug!("Stored {} bytes at {}/{}", size, bucket, key);
        Ok(size)
    }

    fn presigned_read_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<PresignedUrl> {
        let path = self.object_path(bucket, key)?;
        let expires_at = unix_now().saturating_add(ttl.as_secs());
        let signature = self.sign(bucket, key, expires_at);

        let mut url = Url::from_file_path(&path)
            .map_err(|_| Error::Config(format!("Cannot build URL for {}", path.display())))?;
        url.query_pairs_mut()
            .append_pair("bucket", bucket)
            .append_pair("key", key)
            .append_pair("expires", &expires_at.to_string())
            .append_pair("signature", &signature.to_hex());

        Ok(PresignedUrl { url, expires_at })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn validate_bucket(bucket: &str) -> Result<()> {
    if bucket.is_empty()
        || bucket == "."
        || bucket == ".."
        || bucket.contains(['/', '\\'])
        || bucket.chars().any(char::is_control)
    {
        return Err(Error::InvalidKey(format!("invalid bucket name '{}'", bucket)));
    }
    Ok(())
}

/// Keys are relative, `/`-separated and may not escape the bucket.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('\\') || key.chars().any(char::is_control) {
        return Err(Error::InvalidKey(key.to_string()));
    }
    let path = Path::new(key);
    if path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalObjectStore) {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path().join("objects")).unwrap();
        (temp, store)
    }

    fn source_file(temp: &TempDir, contents: &str) -> PathBuf {
        let path = temp.path().join("source.txt");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_upload_and_resolve() {
        let (temp, store) = store();
        let source = source_file(&temp, "a,b\n1,2\n");

        let size = store.upload(&source, "bucket", "prefix/s1/data.csv").unwrap();
        assert_eq!(size, 8);
        assert!(store.object_path("bucket", "prefix/s1/data.csv").unwrap().exists());

        let presigned = store
            .presigned_read_url("bucket", "prefix/s1/data.csv", Duration::from_secs(3600))
            .unwrap();
        assert_eq!(presigned.url.scheme(), "file");
        assert_eq!(store.resolve(&presigned.url).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_object_uri() {
        let (_temp, store) = store();
        assert_eq!(store.object_uri("b", "k/x.txt"), "file://b/k/x.txt");
    }

    #[test]
    fn test_tampered_url_is_rejected() {
        let (temp, store) = store();
        let source = source_file(&temp, "secret");
        store.upload(&source, "bucket", "a.txt").unwrap();
        store.upload(&source, "bucket", "b.txt").unwrap();

        let presigned = store
            .presigned_read_url("bucket", "a.txt", Duration::from_secs(60))
            .unwrap();
        let tampered = Url::parse(&presigned.url.as_str().replace("key=a.txt", "key=b.txt")).unwrap();
        assert!(matches!(store.resolve(&tampered), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_other_instance_signature_is_rejected() {
        let (temp, store) = store();
        let source = source_file(&temp, "x");
        store.upload(&source, "bucket", "a.txt").unwrap();
        let presigned = store
            .presigned_read_url("bucket", "a.txt", Duration::from_secs(60))
            .unwrap();

        let other = LocalObjectStore::new(store.root()).unwrap();
        assert!(matches!(other.resolve(&presigned.url), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_expired_url() {
        let (temp, store) = store();
        let source = source_file(&temp, "x");
        store.upload(&source, "bucket", "a.txt").unwrap();

        let expires = unix_now() - 10;
        let signature = store.sign("bucket", "a.txt", expires);
        let mut url = Url::from_file_path(store.object_path("bucket", "a.txt").unwrap()).unwrap();
        url.query_pairs_mut()
            .append_pair("bucket", "bucket")
            .append_pair("key", "a.txt")
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature.to_hex());

        assert!(matches!(store.resolve(&url), Err(Error::ExpiredUrl)));
    }

    #[test]
    fn test_missing_object() {
        let (_temp, store) = store();
        let presigned = store
            .presigned_read_url("bucket", "never-uploaded.txt", Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            store.resolve(&presigned.url),
            Err(Error::ObjectNotFound { key, .. }) if key == "never-uploaded.txt"
        ));
    }

    #[test]
    fn test_invalid_keys() {
        let (_temp, store) = store();
        for key in ["", "/etc/passwd", "../escape", "a/../../b", "a\\b", "./a"] {
            assert!(
                matches!(store.object_path("bucket", key), Err(Error::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
        assert!(store.object_path("../b", "a").is_err());
        assert!(store.object_path("bucket", "nested/dir/file.png").is_ok());
    }
}
